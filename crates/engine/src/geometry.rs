use serde::{Deserialize, Serialize};

/// Logical grid address. `(0, 0)` is the bottom-left cell and `y` grows upward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn manhattan_distance(self, other: TileCoord) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    pub fn delta_to(self, other: TileCoord) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }
}

impl From<(i32, i32)> for TileCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Converts between logical tiles and render space.
///
/// Render space has its origin at the top-left of the map, so the logical
/// row `y` lands at `(height - 1 - y)` tiles from the top. Tile centers sit at
/// half a tile from each edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    tile_size: f32,
    height: u32,
}

impl GridGeometry {
    pub fn new(tile_size: f32, height: u32) -> Self {
        Self { tile_size, height }
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_to_world(&self, tile: TileCoord) -> Vec2 {
        let half = self.tile_size / 2.0;
        let flipped_row = self.height as f32 - 1.0 - tile.y as f32;
        Vec2 {
            x: tile.x as f32 * self.tile_size + half,
            y: flipped_row * self.tile_size + half,
        }
    }

    /// Nearest tile to a render-space point. Exact left inverse of
    /// [`GridGeometry::tile_to_world`] for integer tiles.
    pub fn world_to_tile(&self, world: Vec2) -> TileCoord {
        let column = (world.x / self.tile_size - 0.5).round() as i32;
        let row_from_top = (world.y / self.tile_size - 0.5).round() as i32;
        TileCoord {
            x: column,
            y: self.height as i32 - 1 - row_from_top,
        }
    }

    /// Render position of an entity whose sprite is nudged up by `offset_y`
    /// tiles. Logic never reads this.
    pub fn render_position(&self, tile: TileCoord, offset_y: f32) -> Vec2 {
        let center = self.tile_to_world(tile);
        Vec2 {
            x: center.x,
            y: center.y - offset_y * self.tile_size,
        }
    }
}
