use std::collections::HashMap;

use tracing::debug;

use super::WorldGrid;
use crate::entity::{Entity, EntityId, EntityIdAllocator, EntityTemplate};
use crate::geometry::{GridGeometry, TileCoord};
use crate::nav::{self, OccupancyGrid};

/// Knobs for [`GridIndex::occupancy_grid`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccupancyOptions {
    /// Goal tile of the search the snapshot is built for.
    pub destination: Option<TileCoord>,
    /// Force `destination` free when an interactable stands on it, so the
    /// path can end next to it.
    pub allow_destination_on_interactable: bool,
    /// Entity whose own tile should not count as blocked.
    pub allow_occupied_by: Option<EntityId>,
}

/// Wall layout plus the live entity registry of one scene.
///
/// Entity tiles here are always logical positions. Movers are moved the
/// moment a move is accepted, never when their animation ends.
#[derive(Debug)]
pub struct GridIndex {
    grid: WorldGrid,
    allocator: EntityIdAllocator,
    entities: HashMap<EntityId, Entity>,
    by_tile: HashMap<TileCoord, Vec<EntityId>>,
}

impl GridIndex {
    pub fn new(grid: WorldGrid) -> Self {
        Self {
            grid,
            allocator: EntityIdAllocator::default(),
            entities: HashMap::new(),
            by_tile: HashMap::new(),
        }
    }

    pub fn world(&self) -> &WorldGrid {
        &self.grid
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn geometry(&self, tile_size: f32) -> GridGeometry {
        GridGeometry::new(tile_size, self.grid.height())
    }

    pub fn is_within_bounds(&self, tile: TileCoord) -> bool {
        self.grid.is_within_bounds(tile)
    }

    pub fn is_wall(&self, tile: TileCoord) -> bool {
        self.grid.is_wall(tile)
    }

    /// Adds an entity at its template tile. Placement bounds are the
    /// caller's responsibility.
    pub fn register(&mut self, template: EntityTemplate) -> EntityId {
        let id = self.allocator.allocate();
        let entity = template.into_entity(id);
        debug!(
            entity = ?id,
            entity_name = entity.name.as_str(),
            kind = entity.kind.label(),
            tile = ?entity.tile,
            "entity_registered"
        );
        self.by_tile.entry(entity.tile).or_default().push(id);
        self.entities.insert(id, entity);
        id
    }

    pub fn unregister(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.detach_from_tile(id, entity.tile);
        debug!(entity = ?id, entity_name = entity.name.as_str(), "entity_unregistered");
        Some(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable access for flag and kind updates. Tile changes go through
    /// the movement coordinator.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Registered ids in registration order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids = self.entities.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Earliest-registered enabled entity with this name.
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities
            .values()
            .filter(|entity| !entity.disabled && entity.name == name)
            .min_by_key(|entity| entity.id)
    }

    pub fn entities_at(&self, tile: TileCoord, include_disabled: bool) -> Vec<&Entity> {
        let Some(ids) = self.by_tile.get(&tile) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|entity| include_disabled || !entity.disabled)
            .collect()
    }

    pub fn is_walkable(&self, tile: TileCoord, ignore: Option<EntityId>) -> bool {
        if !self.grid.is_within_bounds(tile) || self.grid.is_wall(tile) {
            return false;
        }
        self.entities_at(tile, false).into_iter().all(|entity| {
            Some(entity.id) == ignore || !entity.flags.collider || entity.flags.walkable
        })
    }

    pub fn has_interactable(&self, tile: TileCoord) -> bool {
        self.entities_at(tile, false)
            .into_iter()
            .any(|entity| entity.flags.interactable)
    }

    /// Snapshot of blocking tiles for the pathfinder. Later registry
    /// changes do not affect the returned grid.
    pub fn occupancy_grid(&self, options: &OccupancyOptions) -> OccupancyGrid {
        let mut occupancy = OccupancyGrid::new_free(self.grid.width(), self.grid.height());
        for (tile, _) in self.grid.cells() {
            if self.is_blocked_for_search(tile, options) {
                occupancy.set_blocked(tile, true);
            }
        }
        occupancy
    }

    pub fn find_path(
        &self,
        from: TileCoord,
        to: TileCoord,
        options: &OccupancyOptions,
    ) -> Vec<TileCoord> {
        let occupancy = self.occupancy_grid(options);
        nav::find_path(&occupancy, from, to)
    }

    fn is_blocked_for_search(&self, tile: TileCoord, options: &OccupancyOptions) -> bool {
        if options.destination == Some(tile)
            && options.allow_destination_on_interactable
            && self.has_interactable(tile)
        {
            return false;
        }
        if self.grid.is_wall(tile) {
            return true;
        }
        self.entities_at(tile, false).into_iter().any(|entity| {
            Some(entity.id) != options.allow_occupied_by && entity.flags.blocks_movement()
        })
    }

    /// Moves `id` to `tile` in the registry. Returns the previous tile.
    pub(crate) fn relocate(&mut self, id: EntityId, tile: TileCoord) -> Option<TileCoord> {
        let entity = self.entities.get_mut(&id)?;
        let previous = entity.tile;
        if previous == tile {
            return Some(previous);
        }
        entity.tile = tile;
        self.detach_from_tile(id, previous);
        self.by_tile.entry(tile).or_default().push(id);
        Some(previous)
    }

    fn detach_from_tile(&mut self, id: EntityId, tile: TileCoord) {
        if let Some(ids) = self.by_tile.get_mut(&tile) {
            ids.retain(|candidate| *candidate != id);
            if ids.is_empty() {
                self.by_tile.remove(&tile);
            }
        }
    }
}
