mod index;

use thiserror::Error;

use crate::geometry::TileCoord;

pub use index::{GridIndex, OccupancyOptions};

pub const WALL_MARKER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("map row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Immutable wall layout of one scene.
///
/// Rows are stored by logical `y`, so `rows[0]` is the bottom of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldGrid {
    width: u32,
    height: u32,
    rows: Vec<Vec<char>>,
}

impl WorldGrid {
    /// Builds a grid from rows listed top-to-bottom: the first row is the
    /// highest logical `y`.
    pub fn from_rows<R: AsRef<str>>(rows_top_down: &[R]) -> Result<Self, MapError> {
        let mut rows = rows_top_down
            .iter()
            .map(|row| row.as_ref().chars().collect::<Vec<_>>())
            .collect::<Vec<_>>();
        rows.reverse();
        Self::from_bottom_up(rows)
    }

    /// Parses the authoring text format: one row per line, top row first,
    /// cells separated by optional spaces. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, MapError> {
        let rows = text
            .lines()
            .map(|line| {
                line.chars()
                    .filter(|cell| !cell.is_whitespace())
                    .collect::<String>()
            })
            .filter(|row| !row.is_empty())
            .collect::<Vec<_>>();
        Self::from_rows(&rows)
    }

    fn from_bottom_up(rows: Vec<Vec<char>>) -> Result<Self, MapError> {
        let expected = rows.first().map(Vec::len).unwrap_or(0);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(MapError::RaggedRow {
                    // report in authoring order
                    row: rows.len() - 1 - index,
                    expected,
                    actual: row.len(),
                });
            }
        }
        let width = if rows.is_empty() { 0 } else { expected as u32 };
        Ok(Self {
            width,
            height: rows.len() as u32,
            rows,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_within_bounds(&self, tile: TileCoord) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height
    }

    pub fn cell(&self, tile: TileCoord) -> Option<char> {
        if !self.is_within_bounds(tile) {
            return None;
        }
        self.rows
            .get(tile.y as usize)
            .and_then(|row| row.get(tile.x as usize))
            .copied()
    }

    pub fn is_wall(&self, tile: TileCoord) -> bool {
        self.cell(tile) == Some(WALL_MARKER)
    }

    /// Every in-bounds tile with its authoring character, bottom row first.
    pub fn cells(&self) -> impl Iterator<Item = (TileCoord, char)> + '_ {
        self.rows.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(move |(x, cell)| (TileCoord::new(x as i32, y as i32), *cell))
        })
    }
}
