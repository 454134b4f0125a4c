use crate::entity::{EntityId, Facing};
use crate::geometry::TileCoord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Footstep,
    Drinking,
    Eating,
}

/// Side effects the core hands to rendering and audio collaborators.
///
/// Nothing in the simulation reads these back; logical state is already
/// final by the time an event is queued.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    MoveStarted {
        entity: EntityId,
        from: TileCoord,
        to: TileCoord,
        facing: Facing,
        duration_seconds: f32,
    },
    Footstep {
        tile: TileCoord,
    },
    MoveSettled {
        entity: EntityId,
        tile: TileCoord,
    },
    InteractionStarted {
        target: EntityId,
        actor: EntityId,
    },
    InteractionFinished {
        target: EntityId,
    },
    VisualStateChanged {
        entity: EntityId,
        state: &'static str,
    },
    EntityDisabled {
        entity: EntityId,
    },
    Sound(SoundCue),
    SceneTransitionRequested {
        target_scene: String,
        target_portal: String,
    },
    SceneLoaded {
        scene_id: String,
        player_tile: TileCoord,
    },
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<WorldEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn as_slice(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
