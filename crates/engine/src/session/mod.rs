mod scene;
#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SimConfig};
use crate::entity::{EntityId, EntityKind, EntityTemplate};
use crate::events::{EventQueue, WorldEvent};
use crate::geometry::{GridGeometry, TileCoord};
use crate::grid::{GridIndex, MapError, OccupancyOptions, WorldGrid};
use crate::interaction::InteractionDispatcher;
use crate::metrics::{MetricsHandle, SimMetricsSnapshot};
use crate::movement::MovementCoordinator;
use crate::persistence::PersistenceGateway;

use scene::{PendingEntry, TickEnv};
pub use scene::SceneState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid simulation config: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown scene `{0}`")]
    UnknownScene(String),
    #[error("scene `{scene}` has a malformed map: {source}")]
    Map {
        scene: String,
        #[source]
        source: MapError,
    },
    #[error("entity `{name}` in scene `{scene}` is placed outside the map at {tile:?}")]
    PlacementOutOfBounds {
        scene: String,
        name: String,
        tile: TileCoord,
    },
    #[error("no scene is loaded")]
    NoActiveScene,
}

/// Already-parsed content of one scene. The player is spawned by the
/// session and must not be listed in `entities`.
#[derive(Debug, Clone)]
pub struct SceneBlueprint {
    pub grid: WorldGrid,
    pub player_start: TileCoord,
    pub entities: Vec<EntityTemplate>,
}

impl SceneBlueprint {
    /// Tile and enter direction of the portal named `name`.
    pub fn portal(&self, name: &str) -> Option<(TileCoord, (i32, i32))> {
        self.entities
            .iter()
            .find_map(|template| match &template.kind {
                EntityKind::Portal(link) if template.name == name => {
                    Some((template.tile, link.enter_direction))
                }
                _ => None,
            })
    }
}

/// Source of scene content. Pickups consult `persistence` while being
/// built so already collected ones start disabled.
pub trait SceneCatalog {
    fn build(
        &self,
        scene_id: &str,
        persistence: &dyn PersistenceGateway,
        config: &SimConfig,
    ) -> Result<SceneBlueprint, SessionError>;
}

/// Player data that outlives scene changes. `hp` and `max_hp` are read by
/// the HUD; nothing in the simulation changes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub hp: u32,
    pub max_hp: u32,
    pub tile: TileCoord,
}

impl PlayerStats {
    pub fn new(max_hp: u32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            tile: TileCoord::default(),
        }
    }
}

/// One play session: the loaded scene plus everything that survives scene
/// changes (persistence, player stats, metrics, pending events).
pub struct WorldSession {
    config: SimConfig,
    catalog: Box<dyn SceneCatalog>,
    persistence: Box<dyn PersistenceGateway>,
    events: EventQueue,
    stats: PlayerStats,
    scene: Option<SceneState>,
    metrics: SimMetricsSnapshot,
    metrics_handle: MetricsHandle,
}

impl WorldSession {
    pub fn new(
        config: SimConfig,
        catalog: Box<dyn SceneCatalog>,
        persistence: Box<dyn PersistenceGateway>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let stats = PlayerStats::new(config.player_max_hp);
        Ok(Self {
            config,
            catalog,
            persistence,
            events: EventQueue::default(),
            stats,
            scene: None,
            metrics: SimMetricsSnapshot::default(),
            metrics_handle: MetricsHandle::default(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut PlayerStats {
        &mut self.stats
    }

    pub fn persistence(&self) -> &dyn PersistenceGateway {
        self.persistence.as_ref()
    }

    pub fn scene(&self) -> Option<&SceneState> {
        self.scene.as_ref()
    }

    pub fn active_scene_id(&self) -> Option<&str> {
        self.scene.as_ref().map(SceneState::id)
    }

    pub fn player_is_idle(&self) -> bool {
        self.scene.as_ref().is_some_and(SceneState::player_is_idle)
    }

    pub fn geometry(&self) -> Option<GridGeometry> {
        self.scene
            .as_ref()
            .map(|scene| scene.grid.geometry(self.config.tile_size))
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }

    pub fn metrics(&self) -> SimMetricsSnapshot {
        self.metrics
    }

    /// Replaces the active scene. With `entry_portal` the player spawns on
    /// that portal and steps off it in the portal's enter direction after
    /// `portal_enter_delay_seconds`.
    pub fn load_scene(
        &mut self,
        scene_id: &str,
        entry_portal: Option<&str>,
    ) -> Result<(), SessionError> {
        let blueprint = self
            .catalog
            .build(scene_id, self.persistence.as_ref(), &self.config)?;
        for template in &blueprint.entities {
            if !blueprint.grid.is_within_bounds(template.tile) {
                return Err(SessionError::PlacementOutOfBounds {
                    scene: scene_id.to_string(),
                    name: template.name.clone(),
                    tile: template.tile,
                });
            }
        }

        let entry = entry_portal.and_then(|name| {
            let found = blueprint.portal(name);
            if found.is_none() {
                warn!(scene = scene_id, portal = name, "entry_portal_missing");
            }
            found
        });
        let spawn = entry.map_or(blueprint.player_start, |(tile, _)| tile);
        if !blueprint.grid.is_within_bounds(spawn) {
            return Err(SessionError::PlacementOutOfBounds {
                scene: scene_id.to_string(),
                name: crate::entity::PLAYER_NAME.to_string(),
                tile: spawn,
            });
        }
        let pending_entry = entry
            .map(|(_, direction)| direction)
            .filter(|direction| *direction != (0, 0))
            .map(|direction| PendingEntry {
                remaining_seconds: self.config.portal_enter_delay_seconds,
                direction,
            });

        self.end_scene();

        let mut grid = GridIndex::new(blueprint.grid);
        let player = grid.register(EntityTemplate::player(
            spawn,
            self.config.character_offset_y,
        ));
        for template in blueprint.entities {
            grid.register(template);
        }
        let entity_count = grid.entity_count();

        self.scene = Some(SceneState {
            id: scene_id.to_string(),
            grid,
            movement: MovementCoordinator::new(self.config.move_duration_seconds),
            interactions: InteractionDispatcher::default(),
            player,
            elapsed_seconds: 0.0,
            pending_entry,
        });
        self.stats.tile = spawn;
        self.metrics.scene_loads += 1;
        self.events.push(WorldEvent::SceneLoaded {
            scene_id: scene_id.to_string(),
            player_tile: spawn,
        });
        info!(
            scene = scene_id,
            entry_portal = entry_portal.unwrap_or("none"),
            player_tile = ?spawn,
            entity_count,
            "scene_loaded"
        );
        self.metrics_handle.publish(self.metrics);
        Ok(())
    }

    /// Advances the active scene by one fixed step. A portal used during
    /// the step loads its target scene before returning.
    pub fn tick(&mut self, dt_seconds: f32) -> Result<(), SessionError> {
        let first_new_event = self.events.len();
        let scene = self.scene.as_mut().ok_or(SessionError::NoActiveScene)?;
        let mut env = TickEnv {
            config: &self.config,
            persistence: self.persistence.as_mut(),
            events: &mut self.events,
            metrics: &mut self.metrics,
        };
        scene.tick(dt_seconds, &mut env);
        if let Some(tile) = scene.player_tile() {
            self.stats.tile = tile;
        }
        self.metrics.ticks += 1;

        let transition = self.events.as_slice()[first_new_event..]
            .iter()
            .find_map(|event| match event {
                WorldEvent::SceneTransitionRequested {
                    target_scene,
                    target_portal,
                } => Some((target_scene.clone(), target_portal.clone())),
                _ => None,
            });
        if let Some((target_scene, target_portal)) = transition {
            self.load_scene(&target_scene, Some(&target_portal))?;
        }

        self.metrics_handle.publish(self.metrics);
        Ok(())
    }

    /// Pointer-style order: path to `tile`, ending next to it when an
    /// interactable stands there. Returns the queued path length.
    pub fn order_player_path_to(&mut self, tile: TileCoord) -> Result<usize, SessionError> {
        let scene = self.scene.as_mut().ok_or(SessionError::NoActiveScene)?;
        let player = scene.player;
        let Some(from) = scene.player_tile() else {
            return Ok(0);
        };

        let path = if scene.grid.is_within_bounds(tile) {
            self.metrics.path_searches += 1;
            let path = scene.grid.find_path(
                from,
                tile,
                &OccupancyOptions {
                    destination: Some(tile),
                    allow_destination_on_interactable: true,
                    allow_occupied_by: Some(player),
                },
            );
            if path.is_empty() && from != tile {
                self.metrics.paths_not_found += 1;
            }
            path
        } else {
            Vec::new()
        };

        let len = path.len();
        if let Some(state) = scene.player_state_mut() {
            state.path = path.into();
            state.overlay_enabled = true;
        }
        debug!(from = ?from, to = ?tile, steps = len, "player_path_ordered");
        Ok(len)
    }

    /// Keyboard-style order: a single step, refused while the player is
    /// busy, when the target is blocked, or when a diagonal would cut a
    /// blocked corner.
    pub fn order_player_step(&mut self, dx: i32, dy: i32) -> Result<bool, SessionError> {
        let scene = self.scene.as_mut().ok_or(SessionError::NoActiveScene)?;
        let (dx, dy) = (dx.signum(), dy.signum());
        if dx == 0 && dy == 0 {
            return Ok(false);
        }
        let player = scene.player;
        let busy = scene.movement.is_moving(player)
            || scene
                .player_state()
                .is_some_and(|state| state.is_busy_interacting());
        let Some(from) = scene.player_tile() else {
            return Ok(false);
        };
        if busy {
            return Ok(false);
        }

        let grid = &scene.grid;
        let next = from.offset(dx, dy);
        let corner_clear = dx == 0
            || dy == 0
            || (grid.is_walkable(from.offset(dx, 0), Some(player))
                && grid.is_walkable(from.offset(0, dy), Some(player)));
        if !corner_clear || !grid.is_walkable(next, Some(player)) {
            return Ok(false);
        }

        if let Some(state) = scene.player_state_mut() {
            state.path = [next].into_iter().collect();
            state.overlay_enabled = false;
        }
        Ok(true)
    }

    /// Removes an entity from the active scene for good. Returns `false` if
    /// it was not registered or is the player.
    pub fn destroy_entity(&mut self, id: EntityId) -> Result<bool, SessionError> {
        let scene = self.scene.as_mut().ok_or(SessionError::NoActiveScene)?;
        Ok(scene.destroy_entity(id).is_some())
    }

    /// Takes everything queued for collaborators since the last drain.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.events.drain()
    }

    /// Drops the active scene. Returns its id if one was loaded.
    pub fn end_scene(&mut self) -> Option<String> {
        let scene = self.scene.take()?;
        info!(
            scene = scene.id.as_str(),
            elapsed_seconds = scene.elapsed_seconds,
            "scene_ended"
        );
        Some(scene.id)
    }
}
