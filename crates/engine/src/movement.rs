use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::entity::{EntityId, Facing};
use crate::events::{EventQueue, SoundCue, WorldEvent};
use crate::geometry::TileCoord;
use crate::grid::GridIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("entity {0:?} is not registered")]
    UnknownEntity(EntityId),
    #[error("entity {0:?} is already moving")]
    AlreadyMoving(EntityId),
    #[error("tile {0:?} is not walkable")]
    NotWalkable(TileCoord),
}

/// Per-mover state: `Idle -> Moving -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveState {
    Idle,
    Moving {
        from: TileCoord,
        to: TileCoord,
        remaining_seconds: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MoverRecord {
    state: MoveState,
    facing: Facing,
}

impl Default for MoverRecord {
    fn default() -> Self {
        Self {
            state: MoveState::Idle,
            facing: Facing::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedMove {
    pub entity: EntityId,
    pub from: TileCoord,
    pub to: TileCoord,
    pub facing: Facing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledMove {
    pub entity: EntityId,
    pub tile: TileCoord,
}

/// Serializes each entity's own moves and owns their in-flight timers.
///
/// The registry tile is written when a move is accepted, so every query
/// made while the transition is running already sees the mover at its
/// destination.
#[derive(Debug)]
pub struct MovementCoordinator {
    move_duration_seconds: f32,
    movers: BTreeMap<EntityId, MoverRecord>,
}

impl MovementCoordinator {
    pub fn new(move_duration_seconds: f32) -> Self {
        Self {
            move_duration_seconds,
            movers: BTreeMap::new(),
        }
    }

    pub fn move_duration_seconds(&self) -> f32 {
        self.move_duration_seconds
    }

    pub fn move_to(
        &mut self,
        grid: &mut GridIndex,
        events: &mut EventQueue,
        entity: EntityId,
        target: TileCoord,
    ) -> Result<AcceptedMove, MoveRejection> {
        if grid.entity(entity).is_none() {
            return Err(MoveRejection::UnknownEntity(entity));
        }
        if self.is_moving(entity) {
            debug!(entity = ?entity, target_tile = ?target, "move_rejected_busy");
            return Err(MoveRejection::AlreadyMoving(entity));
        }
        if !grid.is_walkable(target, Some(entity)) {
            debug!(entity = ?entity, target_tile = ?target, "move_rejected_blocked");
            return Err(MoveRejection::NotWalkable(target));
        }

        let from = grid
            .relocate(entity, target)
            .ok_or(MoveRejection::UnknownEntity(entity))?;
        let delta = from.delta_to(target);
        let record = self.movers.entry(entity).or_default();
        record.facing = record.facing.after_step(delta.0, delta.1);
        record.state = MoveState::Moving {
            from,
            to: target,
            remaining_seconds: self.move_duration_seconds,
        };

        events.push(WorldEvent::Footstep { tile: from });
        events.push(WorldEvent::Sound(SoundCue::Footstep));
        events.push(WorldEvent::MoveStarted {
            entity,
            from,
            to: target,
            facing: record.facing,
            duration_seconds: self.move_duration_seconds,
        });
        debug!(entity = ?entity, from = ?from, to = ?target, "move_accepted");

        Ok(AcceptedMove {
            entity,
            from,
            to: target,
            facing: record.facing,
        })
    }

    /// Advances every running move. Settled moves come back in entity id
    /// order so the caller can fire triggers on the arrival tiles.
    pub fn tick(&mut self, dt_seconds: f32, events: &mut EventQueue) -> Vec<SettledMove> {
        let mut settled = Vec::new();
        for (entity, record) in self.movers.iter_mut() {
            let MoveState::Moving {
                to,
                remaining_seconds,
                ..
            } = &mut record.state
            else {
                continue;
            };
            *remaining_seconds -= dt_seconds;
            if *remaining_seconds <= 0.0 {
                let tile = *to;
                record.state = MoveState::Idle;
                events.push(WorldEvent::MoveSettled {
                    entity: *entity,
                    tile,
                });
                settled.push(SettledMove {
                    entity: *entity,
                    tile,
                });
            }
        }
        settled
    }

    pub fn is_moving(&self, entity: EntityId) -> bool {
        self.state(entity) != MoveState::Idle
    }

    pub fn state(&self, entity: EntityId) -> MoveState {
        self.movers
            .get(&entity)
            .map_or(MoveState::Idle, |record| record.state)
    }

    pub fn facing(&self, entity: EntityId) -> Facing {
        self.movers
            .get(&entity)
            .map_or_else(Facing::default, |record| record.facing)
    }

    pub fn moving_count(&self) -> usize {
        self.movers
            .values()
            .filter(|record| record.state != MoveState::Idle)
            .count()
    }

    /// Forgets an entity that left the registry.
    pub fn forget(&mut self, entity: EntityId) {
        self.movers.remove(&entity);
    }
}
