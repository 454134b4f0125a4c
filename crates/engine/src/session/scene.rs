use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::entity::{
    BehaviourContext, Entity, EntityId, EntityKind, PlayerState, TickAction, TickView,
};
use crate::events::EventQueue;
use crate::geometry::TileCoord;
use crate::grid::GridIndex;
use crate::interaction::InteractionDispatcher;
use crate::metrics::SimMetricsSnapshot;
use crate::movement::MovementCoordinator;
use crate::persistence::PersistenceGateway;

/// Delayed step off the portal a player arrived through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingEntry {
    pub(crate) remaining_seconds: f32,
    pub(crate) direction: (i32, i32),
}

/// Session-owned collaborators one scene tick writes to.
pub(crate) struct TickEnv<'a> {
    pub(crate) config: &'a SimConfig,
    pub(crate) persistence: &'a mut dyn PersistenceGateway,
    pub(crate) events: &'a mut EventQueue,
    pub(crate) metrics: &'a mut SimMetricsSnapshot,
}

/// Live state of the loaded scene. Dropped as a whole when the scene ends.
#[derive(Debug)]
pub struct SceneState {
    pub(crate) id: String,
    pub(crate) grid: GridIndex,
    pub(crate) movement: MovementCoordinator,
    pub(crate) interactions: InteractionDispatcher,
    pub(crate) player: EntityId,
    pub(crate) elapsed_seconds: f32,
    pub(crate) pending_entry: Option<PendingEntry>,
}

impl SceneState {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn movement(&self) -> &MovementCoordinator {
        &self.movement
    }

    pub fn interactions(&self) -> &InteractionDispatcher {
        &self.interactions
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }

    pub fn player_tile(&self) -> Option<TileCoord> {
        self.grid.entity(self.player).map(Entity::tile)
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        player_state(&self.grid, self.player)
    }

    /// True when the player has nothing queued, is not moving, is not
    /// waiting on an interaction and has no portal entry step pending.
    pub fn player_is_idle(&self) -> bool {
        self.pending_entry.is_none()
            && !self.movement.is_moving(self.player)
            && self
                .player_state()
                .is_some_and(|state| state.path.is_empty() && !state.is_busy_interacting())
    }

    pub(crate) fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        player_state_mut(&mut self.grid, self.player)
    }

    /// Removes a non-player entity along with its movement and lock
    /// records. A player waiting on it stops waiting and drops the
    /// interacted step.
    pub(crate) fn destroy_entity(&mut self, id: EntityId) -> Option<Entity> {
        if id == self.player {
            warn!(entity = ?id, "player_destroy_refused");
            return None;
        }
        let entity = self.grid.unregister(id)?;
        self.movement.forget(id);
        self.interactions.forget(id);

        if let Some(state) = self.player_state_mut() {
            let waiting_on_it = state
                .pending_interaction
                .as_ref()
                .is_some_and(|handle| handle.targets().contains(&id));
            if waiting_on_it {
                state.pending_interaction = None;
                if state.path.front() == Some(&entity.tile()) {
                    state.path.pop_front();
                }
            }
        }
        info!(
            scene = self.id.as_str(),
            entity = ?id,
            kind = entity.kind.label(),
            "entity_destroyed"
        );
        Some(entity)
    }

    /// One fixed step: settle moves and fire their triggers, release
    /// finished interactions, then let every enabled entity act in
    /// registration order.
    pub(crate) fn tick(&mut self, dt_seconds: f32, env: &mut TickEnv<'_>) {
        self.elapsed_seconds += dt_seconds;

        for settled in self.movement.tick(dt_seconds, env.events) {
            let Some(actor) = self.grid.entity(settled.entity).map(Entity::actor_ref) else {
                continue;
            };
            let mut context = BehaviourContext {
                scene_id: &self.id,
                persistence: &mut *env.persistence,
                events: &mut *env.events,
                interaction_delay_seconds: env.config.interaction_delay_seconds,
            };
            let fired = self.interactions.handle_triggers_at(
                &mut self.grid,
                settled.tile,
                &actor,
                &mut context,
            );
            env.metrics.triggers_fired += fired as u64;
        }

        self.interactions.tick(dt_seconds, env.events);
        self.release_finished_interaction();
        self.advance_pending_entry(dt_seconds, env);

        for id in self.grid.entity_ids() {
            let action = match self.grid.entity(id) {
                Some(entity) if !entity.is_disabled() => entity.on_tick(&TickView {
                    grid: &self.grid,
                    elapsed_seconds: self.elapsed_seconds,
                    is_moving: self.movement.is_moving(id),
                    think_interval_seconds: env.config.zombie_think_interval_seconds,
                }),
                _ => continue,
            };
            self.apply_tick_action(id, action, env);
        }
    }

    fn apply_tick_action(&mut self, id: EntityId, action: TickAction, env: &mut TickEnv<'_>) {
        match action {
            TickAction::None => {}
            TickAction::Think {
                next_think_at,
                step,
            } => {
                if let Some(entity) = self.grid.entity_mut(id) {
                    if let EntityKind::Zombie(state) = &mut entity.kind {
                        state.next_think_at = next_think_at;
                    }
                }
                if let Some(step) = step {
                    env.metrics.path_searches += 1;
                    self.try_move(id, step, env);
                }
            }
            TickAction::FollowPath { step, final_step } => {
                self.follow_player_path(id, step, final_step, env);
            }
        }
    }

    fn follow_player_path(
        &mut self,
        id: EntityId,
        step: TileCoord,
        final_step: bool,
        env: &mut TickEnv<'_>,
    ) {
        if self.try_move(id, step, env) {
            if let Some(state) = player_state_mut(&mut self.grid, id) {
                state.path.pop_front();
            }
            return;
        }
        if !final_step {
            return;
        }

        let Some(actor) = self.grid.entity(id).map(Entity::actor_ref) else {
            return;
        };
        let mut context = BehaviourContext {
            scene_id: &self.id,
            persistence: &mut *env.persistence,
            events: &mut *env.events,
            interaction_delay_seconds: env.config.interaction_delay_seconds,
        };
        let handle = self
            .interactions
            .interact_at(&mut self.grid, step, &actor, &mut context);
        if !handle.did_act() {
            env.metrics.interactions_skipped += 1;
            return;
        }
        env.metrics.interactions_started += 1;

        let finished = self.interactions.is_complete(&handle);
        if let Some(state) = player_state_mut(&mut self.grid, id) {
            if finished {
                state.path.pop_front();
            } else {
                state.pending_interaction = Some(handle);
            }
        }
    }

    fn try_move(&mut self, id: EntityId, target: TileCoord, env: &mut TickEnv<'_>) -> bool {
        match self
            .movement
            .move_to(&mut self.grid, env.events, id, target)
        {
            Ok(_) => {
                env.metrics.moves_accepted += 1;
                true
            }
            Err(rejection) => {
                env.metrics.moves_rejected += 1;
                debug!(entity = ?id, reason = %rejection, "move_rejected");
                false
            }
        }
    }

    /// Clears the player's wait once every entity it interacted with is
    /// idle again. The interacted step is only dropped if it is still the
    /// head of the queued path.
    fn release_finished_interaction(&mut self) {
        let Some(state) = player_state(&self.grid, self.player) else {
            return;
        };
        let Some(handle) = state.pending_interaction.as_ref() else {
            return;
        };
        if !self.interactions.is_complete(handle) {
            return;
        }
        let interacted_tile = handle
            .targets()
            .first()
            .and_then(|target| self.grid.entity(*target))
            .map(Entity::tile);

        let Some(state) = self.player_state_mut() else {
            return;
        };
        state.pending_interaction = None;
        if interacted_tile.is_some() && state.path.front().copied() == interacted_tile {
            state.path.pop_front();
        }
    }

    fn advance_pending_entry(&mut self, dt_seconds: f32, env: &mut TickEnv<'_>) {
        let Some(entry) = self.pending_entry.as_mut() else {
            return;
        };
        entry.remaining_seconds -= dt_seconds;
        if entry.remaining_seconds > 0.0 {
            return;
        }
        let (dx, dy) = entry.direction;
        self.pending_entry = None;

        let Some(from) = self.player_tile() else {
            return;
        };
        let target = from.offset(dx, dy);
        if self.try_move(self.player, target, env) {
            debug!(from = ?from, to = ?target, "portal_entry_step");
        }
    }
}

fn player_state(grid: &GridIndex, id: EntityId) -> Option<&PlayerState> {
    match &grid.entity(id)?.kind {
        EntityKind::Player(state) => Some(state),
        _ => None,
    }
}

fn player_state_mut(grid: &mut GridIndex, id: EntityId) -> Option<&mut PlayerState> {
    match &mut grid.entity_mut(id)?.kind {
        EntityKind::Player(state) => Some(state),
        _ => None,
    }
}
