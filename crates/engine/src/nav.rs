use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;

use crate::geometry::TileCoord;

const FREE: u8 = 0;
const BLOCKED: u8 = 1;

#[derive(Debug, Clone, Copy)]
struct Direction {
    dx: i32,
    dy: i32,
    cost: f64,
}

const DIRECTIONS: [Direction; 8] = [
    Direction { dx: 0, dy: 1, cost: 1.0 },
    Direction { dx: 1, dy: 0, cost: 1.0 },
    Direction { dx: 0, dy: -1, cost: 1.0 },
    Direction { dx: -1, dy: 0, cost: 1.0 },
    Direction { dx: 1, dy: 1, cost: SQRT_2 },
    Direction { dx: 1, dy: -1, cost: SQRT_2 },
    Direction { dx: -1, dy: 1, cost: SQRT_2 },
    Direction { dx: -1, dy: -1, cost: SQRT_2 },
];

/// Blocking snapshot handed to [`find_path`]. Row `y` is logical row `y`;
/// `0` is free and anything else is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl OccupancyGrid {
    pub fn new_free(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![FREE; width as usize * height as usize],
        }
    }

    /// Builds from a row-major matrix. Short rows are padded as blocked.
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map(Vec::len).unwrap_or(0) as u32;
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for row in rows {
            for x in 0..width as usize {
                cells.push(row.get(x).copied().unwrap_or(BLOCKED));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 {
            return None;
        }
        let (x, y) = (tile.x as u32, tile.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn contains(&self, tile: TileCoord) -> bool {
        self.index_of(tile).is_some()
    }

    /// Out-of-bounds tiles count as blocked.
    pub fn is_free(&self, tile: TileCoord) -> bool {
        self.index_of(tile)
            .and_then(|index| self.cells.get(index))
            .is_some_and(|cell| *cell == FREE)
    }

    pub fn set_blocked(&mut self, tile: TileCoord, blocked: bool) {
        if let Some(index) = self.index_of(tile) {
            self.cells[index] = if blocked { BLOCKED } else { FREE };
        }
    }

    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height as usize];
        }
        self.cells
            .chunks(self.width as usize)
            .map(<[u8]>::to_vec)
            .collect()
    }

    fn tile_of(&self, index: usize) -> TileCoord {
        TileCoord {
            x: (index % self.width as usize) as i32,
            y: (index / self.width as usize) as i32,
        }
    }
}

/// Admissible, consistent estimate for unit orthogonal and `sqrt(2)`
/// diagonal steps.
pub fn octile_distance(a: TileCoord, b: TileCoord) -> f64 {
    let dx = a.x.abs_diff(b.x) as f64;
    let dy = a.y.abs_diff(b.y) as f64;
    let diagonal = dx.min(dy);
    SQRT_2 * diagonal + (dx + dy) - 2.0 * diagonal
}

/// Total cost of walking `path` from `start`, or `None` if any step is not a
/// single-tile move.
pub fn path_cost(start: TileCoord, path: &[TileCoord]) -> Option<f64> {
    let mut cursor = start;
    let mut total = 0.0;
    for step in path {
        let dx = cursor.x.abs_diff(step.x);
        let dy = cursor.y.abs_diff(step.y);
        total += match (dx, dy) {
            (1, 0) | (0, 1) => 1.0,
            (1, 1) => SQRT_2,
            _ => return None,
        };
        cursor = *step;
    }
    Some(total)
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: TileCoord,
    index: usize,
    f_cost: f64,
    h_cost: f64,
}

impl OpenNode {
    fn order_key_cmp(&self, other: &Self) -> Ordering {
        self.f_cost
            .total_cmp(&other.f_cost)
            .then_with(|| self.h_cost.total_cmp(&other.h_cost))
            .then_with(|| self.coord.y.cmp(&other.coord.y))
            .then_with(|| self.coord.x.cmp(&other.coord.x))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.order_key_cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on (f, h, y, x)
        other.order_key_cmp(self)
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 8-directional A* over `grid`.
///
/// Returns the tiles after `start` up to and including `goal`. Returns an
/// empty path when start equals goal, either end is out of bounds, the grid
/// has no cells, or the goal is unreachable. A diagonal step is taken only
/// when both orthogonal tiles it passes between are free. The start tile's
/// own occupancy is ignored.
pub fn find_path(grid: &OccupancyGrid, start: TileCoord, goal: TileCoord) -> Vec<TileCoord> {
    if grid.width == 0 || grid.height == 0 || start == goal {
        return Vec::new();
    }
    let (Some(start_index), Some(goal_index)) = (grid.index_of(start), grid.index_of(goal))
    else {
        return Vec::new();
    };

    let node_count = grid.cells.len();
    let mut closed = vec![false; node_count];
    let mut best_g = vec![f64::INFINITY; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = BinaryHeap::new();

    let start_h = octile_distance(start, goal);
    best_g[start_index] = 0.0;
    open.push(OpenNode {
        coord: start,
        index: start_index,
        f_cost: start_h,
        h_cost: start_h,
    });

    while let Some(current) = open.pop() {
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        if current.index == goal_index {
            return reconstruct_path(grid, &parent, start_index, goal_index);
        }

        let current_g = best_g[current.index];
        for direction in DIRECTIONS {
            let neighbor = current.coord.offset(direction.dx, direction.dy);
            let Some(neighbor_index) = grid.index_of(neighbor) else {
                continue;
            };
            if closed[neighbor_index] || !grid.is_free(neighbor) {
                continue;
            }
            if direction.dx != 0 && direction.dy != 0 {
                let side_a = current.coord.offset(direction.dx, 0);
                let side_b = current.coord.offset(0, direction.dy);
                if !grid.is_free(side_a) || !grid.is_free(side_b) {
                    continue;
                }
            }

            let tentative_g = current_g + direction.cost;
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }
            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current.index);
            let h_cost = octile_distance(neighbor, goal);
            open.push(OpenNode {
                coord: neighbor,
                index: neighbor_index,
                f_cost: tentative_g + h_cost,
                h_cost,
            });
        }
    }

    Vec::new()
}

fn reconstruct_path(
    grid: &OccupancyGrid,
    parent: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
) -> Vec<TileCoord> {
    let mut cursor = goal_index;
    let mut path = Vec::new();
    while cursor != start_index {
        path.push(grid.tile_of(cursor));
        match parent.get(cursor).copied().flatten() {
            Some(previous) => cursor = previous,
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod nav_tests {
    use super::*;

    fn grid_from_strings(rows_top_down: &[&str]) -> OccupancyGrid {
        let mut rows = rows_top_down
            .iter()
            .map(|row| {
                row.chars()
                    .map(|cell| if cell == '#' { BLOCKED } else { FREE })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        rows.reverse();
        OccupancyGrid::from_rows(&rows)
    }

    /// Reference Dijkstra with the same move rules, for cost comparison.
    fn dijkstra_cost(grid: &OccupancyGrid, start: TileCoord, goal: TileCoord) -> Option<f64> {
        let mut best = vec![f64::INFINITY; grid.cells.len()];
        let mut done = vec![false; grid.cells.len()];
        best[grid.index_of(start)?] = 0.0;
        loop {
            let mut pick = None;
            for index in 0..best.len() {
                if done[index] || !best[index].is_finite() {
                    continue;
                }
                if pick.map_or(true, |current: usize| best[index] < best[current]) {
                    pick = Some(index);
                }
            }
            let current = pick?;
            done[current] = true;
            let coord = grid.tile_of(current);
            if coord == goal {
                return Some(best[current]);
            }
            for direction in DIRECTIONS {
                let next = coord.offset(direction.dx, direction.dy);
                if !grid.is_free(next) {
                    continue;
                }
                if direction.dx != 0
                    && direction.dy != 0
                    && (!grid.is_free(coord.offset(direction.dx, 0))
                        || !grid.is_free(coord.offset(0, direction.dy)))
                {
                    continue;
                }
                let next_index = grid.index_of(next)?;
                let candidate = best[current] + direction.cost;
                if candidate < best[next_index] {
                    best[next_index] = candidate;
                }
            }
        }
    }

    fn assert_legal_path(grid: &OccupancyGrid, start: TileCoord, path: &[TileCoord]) {
        let mut cursor = start;
        for step in path {
            assert!(grid.is_free(*step), "stepped onto blocked tile {step:?}");
            let (dx, dy) = cursor.delta_to(*step);
            assert!(dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0));
            if dx != 0 && dy != 0 {
                assert!(grid.is_free(cursor.offset(dx, 0)), "cut corner at {cursor:?}");
                assert!(grid.is_free(cursor.offset(0, dy)), "cut corner at {cursor:?}");
            }
            cursor = *step;
        }
    }

    #[test]
    fn octile_distance_matches_formula() {
        let a = TileCoord::new(0, 0);
        assert_eq!(octile_distance(a, TileCoord::new(3, 0)), 3.0);
        assert!((octile_distance(a, TileCoord::new(2, 2)) - 2.0 * SQRT_2).abs() < 1e-12);
        assert!((octile_distance(a, TileCoord::new(3, 1)) - (SQRT_2 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn degenerate_requests_return_empty_path() {
        let grid = OccupancyGrid::new_free(4, 4);
        let origin = TileCoord::new(1, 1);
        assert!(find_path(&grid, origin, origin).is_empty());
        assert!(find_path(&grid, origin, TileCoord::new(4, 1)).is_empty());
        assert!(find_path(&grid, origin, TileCoord::new(-1, 0)).is_empty());
        assert!(find_path(&OccupancyGrid::new_free(0, 0), origin, TileCoord::new(0, 0)).is_empty());
        assert!(find_path(&OccupancyGrid::from_rows(&[]), origin, TileCoord::new(0, 0)).is_empty());
    }

    #[test]
    fn unreachable_goal_returns_empty_path() {
        let grid = grid_from_strings(&[".#.", ".#.", ".#."]);
        assert!(find_path(&grid, TileCoord::new(0, 1), TileCoord::new(2, 1)).is_empty());
    }

    #[test]
    fn blocked_goal_is_unreachable() {
        let grid = grid_from_strings(&["...", ".#.", "..."]);
        assert!(find_path(&grid, TileCoord::new(0, 0), TileCoord::new(1, 1)).is_empty());
    }

    #[test]
    fn open_grid_uses_diagonals() {
        let grid = OccupancyGrid::new_free(5, 5);
        let path = find_path(&grid, TileCoord::new(0, 0), TileCoord::new(3, 3));
        assert_eq!(
            path,
            vec![
                TileCoord::new(1, 1),
                TileCoord::new(2, 2),
                TileCoord::new(3, 3)
            ]
        );
    }

    #[test]
    fn path_excludes_start_and_ends_at_goal() {
        let grid = grid_from_strings(&["......", ".####.", "......"]);
        let start = TileCoord::new(0, 1);
        let goal = TileCoord::new(5, 1);
        let path = find_path(&grid, start, goal);
        assert!(!path.is_empty());
        assert_ne!(path[0], start);
        assert_eq!(path.last(), Some(&goal));
        assert_legal_path(&grid, start, &path);
    }

    #[test]
    fn diagonal_is_rejected_when_one_orthogonal_side_is_blocked() {
        // wall at (0,1) sits beside the (0,0) -> (1,1) diagonal
        let grid = grid_from_strings(&["#.", ".."]);
        let path = find_path(&grid, TileCoord::new(0, 0), TileCoord::new(1, 1));
        assert_eq!(path, vec![TileCoord::new(1, 0), TileCoord::new(1, 1)]);
    }

    #[test]
    fn l_shaped_corner_forces_orthogonal_detour() {
        // Two diagonally adjacent walls pinch the diagonal between
        // (1,1) and (2,2); the path must go around.
        let grid = grid_from_strings(&["....", ".#..", "..#.", "...."]);
        let start = TileCoord::new(1, 1);
        let goal = TileCoord::new(2, 2);
        let path = find_path(&grid, start, goal);
        assert!(!path.is_empty());
        assert!(path.len() > 1, "corner was cut: {path:?}");
        assert_legal_path(&grid, start, &path);
        let cost = path_cost(start, &path).expect("contiguous");
        assert!(cost > SQRT_2);
    }

    #[test]
    fn path_cost_is_minimal_against_reference_search() {
        let grid = grid_from_strings(&[
            "#################",
            "#...#.....#.....#",
            "#.#.#.###.#.###.#",
            "#.#...#.#...#...#",
            "#.#####.#####.#.#",
            "#.......#.....#.#",
            "#################",
        ]);
        let pairs = [
            (TileCoord::new(1, 1), TileCoord::new(15, 5)),
            (TileCoord::new(3, 4), TileCoord::new(13, 1)),
            (TileCoord::new(1, 5), TileCoord::new(9, 3)),
            (TileCoord::new(15, 1), TileCoord::new(5, 5)),
        ];
        for (start, goal) in pairs {
            let path = find_path(&grid, start, goal);
            let expected = dijkstra_cost(&grid, start, goal);
            match expected {
                Some(expected) => {
                    assert_legal_path(&grid, start, &path);
                    assert_eq!(path.last(), Some(&goal));
                    let actual = path_cost(start, &path).expect("contiguous");
                    assert!(
                        (actual - expected).abs() < 1e-9,
                        "{start:?}->{goal:?}: {actual} vs {expected}"
                    );
                }
                None => assert!(path.is_empty()),
            }
        }
    }

    #[test]
    fn tie_break_is_deterministic_on_symmetric_map() {
        let grid = grid_from_strings(&[".....", ".....", "..#..", ".....", "....."]);
        let start = TileCoord::new(0, 2);
        let goal = TileCoord::new(4, 2);
        let first = find_path(&grid, start, goal);
        for _ in 0..8 {
            assert_eq!(find_path(&grid, start, goal), first);
        }
    }

    #[test]
    fn blocked_start_tile_does_not_prevent_search() {
        let grid = grid_from_strings(&["#.."]);
        let path = find_path(&grid, TileCoord::new(0, 0), TileCoord::new(2, 0));
        assert_eq!(path, vec![TileCoord::new(1, 0), TileCoord::new(2, 0)]);
    }

    #[test]
    fn to_rows_round_trips_matrix() {
        let rows = vec![vec![0, 1, 0], vec![1, 0, 0]];
        assert_eq!(OccupancyGrid::from_rows(&rows).to_rows(), rows);
    }
}
