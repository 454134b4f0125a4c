use std::collections::VecDeque;

use tracing::debug;

use super::{Entity, EntityId, PLAYER_NAME};
use crate::events::{EventQueue, SoundCue, WorldEvent};
use crate::geometry::TileCoord;
use crate::grid::{GridIndex, OccupancyOptions};
use crate::interaction::InteractionHandle;
use crate::persistence::{PersistedState, PersistenceGateway};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerState {
    pub(crate) path: VecDeque<TileCoord>,
    pub(crate) overlay_enabled: bool,
    pub(crate) pending_interaction: Option<InteractionHandle>,
}

impl PlayerState {
    pub fn queued_path(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.path.iter().copied()
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    pub fn is_busy_interacting(&self) -> bool {
        self.pending_interaction.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZombieState {
    pub chase_distance: u32,
    pub(crate) next_think_at: f32,
}

impl ZombieState {
    pub fn new(chase_distance: u32) -> Self {
        Self {
            chase_distance,
            next_think_at: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalLink {
    pub target_scene: String,
    pub target_portal: String,
    pub enter_direction: (i32, i32),
}

/// Per-kind behaviour. Capability flags live on [`Entity`]; this only
/// decides what `interact`, `on_trigger` and `on_tick` do.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player(PlayerState),
    Zombie(ZombieState),
    CoffeeMachine { filled: bool },
    Workstation { working: bool },
    ZombiePlant { interacted: bool },
    PizzaPickup,
    Portal(PortalLink),
    Plant,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Player(_) => "player",
            Self::Zombie(_) => "zombie",
            Self::CoffeeMachine { .. } => "coffee_machine",
            Self::Workstation { .. } => "workstation",
            Self::ZombiePlant { .. } => "zombie_plant",
            Self::PizzaPickup => "pizza_pickup",
            Self::Portal(_) => "portal",
            Self::Plant => "plant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRef {
    pub id: EntityId,
    pub name: String,
}

impl ActorRef {
    pub fn is_player(&self) -> bool {
        self.name == PLAYER_NAME
    }
}

pub struct BehaviourContext<'a> {
    pub scene_id: &'a str,
    pub persistence: &'a mut dyn PersistenceGateway,
    pub events: &'a mut EventQueue,
    pub interaction_delay_seconds: f32,
}

pub struct TickView<'a> {
    pub grid: &'a GridIndex,
    pub elapsed_seconds: f32,
    pub is_moving: bool,
    pub think_interval_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickAction {
    None,
    /// Chase decision. `step` is the first tile of a fresh path, if any.
    Think {
        next_think_at: f32,
        step: Option<TileCoord>,
    },
    FollowPath {
        step: TileCoord,
        final_step: bool,
    },
}

impl Entity {
    /// Runs the interaction body and returns how long the entity stays
    /// locked afterwards, in seconds.
    pub fn interact(&mut self, actor: &ActorRef, context: &mut BehaviourContext<'_>) -> f32 {
        let id = self.id;
        match &mut self.kind {
            EntityKind::CoffeeMachine { filled } => {
                if !*filled {
                    return 0.0;
                }
                *filled = false;
                context.events.push(WorldEvent::VisualStateChanged {
                    entity: id,
                    state: "empty",
                });
                context.events.push(WorldEvent::Sound(SoundCue::Drinking));
                0.0
            }
            EntityKind::Workstation { working } => {
                *working = !*working;
                context.events.push(WorldEvent::VisualStateChanged {
                    entity: id,
                    state: if *working { "working" } else { "idle" },
                });
                context.interaction_delay_seconds
            }
            EntityKind::ZombiePlant { interacted } => {
                *interacted = !*interacted;
                context.events.push(WorldEvent::VisualStateChanged {
                    entity: id,
                    state: if *interacted { "interacted" } else { "idle" },
                });
                context.interaction_delay_seconds
            }
            EntityKind::Portal(link) => {
                if actor.is_player() {
                    debug!(
                        portal = self.name.as_str(),
                        target_scene = link.target_scene.as_str(),
                        target_portal = link.target_portal.as_str(),
                        "portal_entered"
                    );
                    context.events.push(WorldEvent::SceneTransitionRequested {
                        target_scene: link.target_scene.clone(),
                        target_portal: link.target_portal.clone(),
                    });
                }
                0.0
            }
            EntityKind::Player(_)
            | EntityKind::Zombie(_)
            | EntityKind::PizzaPickup
            | EntityKind::Plant => 0.0,
        }
    }

    /// Fires when a mover settles on this tile. Returns whether anything
    /// happened.
    pub fn on_trigger(&mut self, actor: &ActorRef, context: &mut BehaviourContext<'_>) -> bool {
        match self.kind {
            EntityKind::PizzaPickup => {
                if !actor.is_player() || self.disabled {
                    return false;
                }
                self.disabled = true;
                context
                    .persistence
                    .set(context.scene_id, &self.name, PersistedState::disabled());
                context
                    .events
                    .push(WorldEvent::EntityDisabled { entity: self.id });
                context.events.push(WorldEvent::Sound(SoundCue::Eating));
                true
            }
            _ => false,
        }
    }

    pub fn on_tick(&self, view: &TickView<'_>) -> TickAction {
        match &self.kind {
            EntityKind::Zombie(state) => {
                if view.elapsed_seconds < state.next_think_at {
                    return TickAction::None;
                }
                let step = if view.is_moving {
                    None
                } else {
                    self.chase_step(state, view.grid)
                };
                TickAction::Think {
                    next_think_at: view.elapsed_seconds + view.think_interval_seconds,
                    step,
                }
            }
            EntityKind::Player(state) => {
                if view.is_moving || state.pending_interaction.is_some() {
                    return TickAction::None;
                }
                match state.path.front() {
                    Some(step) => TickAction::FollowPath {
                        step: *step,
                        final_step: state.path.len() == 1,
                    },
                    None => TickAction::None,
                }
            }
            _ => TickAction::None,
        }
    }

    fn chase_step(&self, state: &ZombieState, grid: &GridIndex) -> Option<TileCoord> {
        let target = grid.find_by_name(PLAYER_NAME)?;
        let distance = self.tile.manhattan_distance(target.tile());
        if distance == 0 || distance > state.chase_distance {
            return None;
        }
        let path = grid.find_path(
            self.tile,
            target.tile(),
            &OccupancyOptions {
                destination: Some(target.tile()),
                allow_destination_on_interactable: false,
                allow_occupied_by: Some(target.id),
            },
        );
        path.first().copied()
    }
}
