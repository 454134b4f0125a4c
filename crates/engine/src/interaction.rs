use std::collections::BTreeMap;

use tracing::debug;

use crate::entity::{ActorRef, BehaviourContext, EntityId};
use crate::events::{EventQueue, WorldEvent};
use crate::geometry::TileCoord;
use crate::grid::GridIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(u64);

/// Result of one `interact_at` call. The batch is done once every target it
/// started has released its lock; poll it with
/// [`InteractionDispatcher::is_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionHandle {
    batch: Option<BatchId>,
    targets: Vec<EntityId>,
}

impl InteractionHandle {
    fn none() -> Self {
        Self {
            batch: None,
            targets: Vec::new(),
        }
    }

    pub fn did_act(&self) -> bool {
        !self.targets.is_empty()
    }

    pub fn targets(&self) -> &[EntityId] {
        &self.targets
    }
}

/// Per-interactable state: `Idle -> Locked -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionLock {
    Idle,
    Locked {
        actor: EntityId,
        remaining_seconds: f32,
    },
}

#[derive(Debug, Clone, Copy)]
struct ActiveInteraction {
    batch: BatchId,
    actor: EntityId,
    remaining_seconds: f32,
}

#[derive(Debug, Default)]
pub struct InteractionDispatcher {
    next_batch: u64,
    active: BTreeMap<EntityId, ActiveInteraction>,
}

impl InteractionDispatcher {
    /// Starts every idle, enabled interactable on `tile` together. Locked
    /// ones are skipped; if nothing could start the handle reports
    /// `did_act() == false`.
    pub fn interact_at(
        &mut self,
        grid: &mut GridIndex,
        tile: TileCoord,
        actor: &ActorRef,
        context: &mut BehaviourContext<'_>,
    ) -> InteractionHandle {
        let eligible = grid
            .entities_at(tile, false)
            .into_iter()
            .filter(|entity| entity.flags.interactable)
            .map(|entity| entity.id)
            .filter(|id| !self.active.contains_key(id))
            .collect::<Vec<_>>();
        if eligible.is_empty() {
            debug!(tile = ?tile, actor = ?actor.id, "interaction_skipped");
            return InteractionHandle::none();
        }

        let batch = BatchId(self.next_batch);
        self.next_batch = self.next_batch.saturating_add(1);
        for target in &eligible {
            let Some(entity) = grid.entity_mut(*target) else {
                continue;
            };
            context.events.push(WorldEvent::InteractionStarted {
                target: *target,
                actor: actor.id,
            });
            let hold_seconds = entity.interact(actor, context);
            debug!(
                target_entity = ?target,
                kind = entity.kind.label(),
                actor = ?actor.id,
                hold_seconds,
                "interaction_started"
            );
            if hold_seconds > 0.0 {
                self.active.insert(
                    *target,
                    ActiveInteraction {
                        batch,
                        actor: actor.id,
                        remaining_seconds: hold_seconds,
                    },
                );
            } else {
                context
                    .events
                    .push(WorldEvent::InteractionFinished { target: *target });
            }
        }

        InteractionHandle {
            batch: Some(batch),
            targets: eligible,
        }
    }

    /// Fires every enabled trigger on `tile` immediately. Returns how many
    /// reacted.
    pub fn handle_triggers_at(
        &self,
        grid: &mut GridIndex,
        tile: TileCoord,
        actor: &ActorRef,
        context: &mut BehaviourContext<'_>,
    ) -> usize {
        let triggers = grid
            .entities_at(tile, false)
            .into_iter()
            .filter(|entity| entity.flags.is_trigger && entity.id != actor.id)
            .map(|entity| entity.id)
            .collect::<Vec<_>>();
        let mut fired = 0usize;
        for id in triggers {
            if let Some(entity) = grid.entity_mut(id) {
                if entity.on_trigger(actor, context) {
                    debug!(trigger = ?id, actor = ?actor.id, "trigger_fired");
                    fired += 1;
                }
            }
        }
        fired
    }

    /// Counts down running interactions and unlocks the finished ones.
    pub fn tick(&mut self, dt_seconds: f32, events: &mut EventQueue) {
        let mut finished = Vec::new();
        for (id, interaction) in self.active.iter_mut() {
            interaction.remaining_seconds -= dt_seconds;
            if interaction.remaining_seconds <= 0.0 {
                finished.push(*id);
            }
        }
        for id in finished {
            if let Some(interaction) = self.active.remove(&id) {
                debug!(target_entity = ?id, actor = ?interaction.actor, "interaction_finished");
                events.push(WorldEvent::InteractionFinished { target: id });
            }
        }
    }

    pub fn is_complete(&self, handle: &InteractionHandle) -> bool {
        let Some(batch) = handle.batch else {
            return true;
        };
        handle.targets.iter().all(|target| {
            self.active
                .get(target)
                .map_or(true, |interaction| interaction.batch != batch)
        })
    }

    pub fn lock_state(&self, target: EntityId) -> InteractionLock {
        match self.active.get(&target) {
            Some(interaction) => InteractionLock::Locked {
                actor: interaction.actor,
                remaining_seconds: interaction.remaining_seconds,
            },
            None => InteractionLock::Idle,
        }
    }

    /// Drops the lock of an entity that left the registry.
    pub fn forget(&mut self, target: EntityId) {
        self.active.remove(&target);
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
