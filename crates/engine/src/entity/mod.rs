mod kind;

use serde::{Deserialize, Serialize};

use crate::geometry::TileCoord;
use crate::persistence::PersistenceGateway;

pub use kind::{
    ActorRef, BehaviourContext, EntityKind, PlayerState, PortalLink, TickAction, TickView,
    ZombieState,
};

/// Name the chase AI and the player-only behaviours look for.
pub const PLAYER_NAME: &str = "player";
pub const ZOMBIE_NAME: &str = "zombie";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Draw-order bucket. Only passed through to renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Ground,
    #[default]
    Obstacle,
    Item,
    Character,
    Fx,
}

impl Layer {
    pub fn depth_offset(self) -> f32 {
        match self {
            Self::Ground => 0.0,
            Self::Obstacle => 0.2,
            Self::Item => 0.3,
            Self::Character => 0.5,
            Self::Fx => 1.0,
        }
    }

    pub fn depth(self, world_y: f32) -> f32 {
        world_y + self.depth_offset()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFlags {
    pub collider: bool,
    pub walkable: bool,
    pub interactable: bool,
    pub is_trigger: bool,
}

impl EntityFlags {
    pub const BLOCKING: Self = Self {
        collider: true,
        walkable: false,
        interactable: false,
        is_trigger: false,
    };

    pub fn blocks_movement(self) -> bool {
        self.collider && !self.walkable
    }
}

/// Which way a mover last looked. `x` keeps its previous sign on purely
/// vertical steps so sprites do not flip when walking up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facing {
    pub x: i32,
    pub y: i32,
}

impl Default for Facing {
    fn default() -> Self {
        Self { x: 1, y: 0 }
    }
}

impl Facing {
    pub fn after_step(self, dx: i32, dy: i32) -> Self {
        Self {
            x: if dx != 0 { dx.signum() } else { self.x },
            y: dy.signum(),
        }
    }

    pub fn is_flipped(self) -> bool {
        self.x < 0
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub layer: Layer,
    pub flags: EntityFlags,
    pub offset_y: f32,
    pub kind: EntityKind,
    pub(crate) tile: TileCoord,
    pub(crate) disabled: bool,
}

impl Entity {
    pub fn tile(&self) -> TileCoord {
        self.tile
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn blocks_movement(&self) -> bool {
        self.flags.blocks_movement()
    }

    pub fn is_player(&self) -> bool {
        self.name == PLAYER_NAME
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Everything needed to register an entity except its id.
#[derive(Debug, Clone)]
pub struct EntityTemplate {
    pub name: String,
    pub tile: TileCoord,
    pub layer: Layer,
    pub flags: EntityFlags,
    pub offset_y: f32,
    pub disabled: bool,
    pub kind: EntityKind,
}

impl EntityTemplate {
    pub fn player(tile: TileCoord, offset_y: f32) -> Self {
        Self {
            name: PLAYER_NAME.to_string(),
            tile,
            layer: Layer::Character,
            flags: EntityFlags::BLOCKING,
            offset_y,
            disabled: false,
            kind: EntityKind::Player(PlayerState::default()),
        }
    }

    pub fn zombie(tile: TileCoord, offset_y: f32, chase_distance: u32) -> Self {
        Self {
            name: ZOMBIE_NAME.to_string(),
            tile,
            layer: Layer::Character,
            flags: EntityFlags::BLOCKING,
            offset_y,
            disabled: false,
            kind: EntityKind::Zombie(ZombieState::new(chase_distance)),
        }
    }

    pub fn coffee_machine(tile: TileCoord) -> Self {
        Self::interactable(
            format!("coffee-{}-{}", tile.x, tile.y),
            tile,
            0.0,
            EntityKind::CoffeeMachine { filled: true },
        )
    }

    pub fn workstation(tile: TileCoord) -> Self {
        Self::interactable(
            format!("workstation-{}-{}", tile.x, tile.y),
            tile,
            0.0,
            EntityKind::Workstation { working: false },
        )
    }

    pub fn zombie_plant(tile: TileCoord) -> Self {
        Self::interactable(
            format!("zombie-plant-{}-{}", tile.x, tile.y),
            tile,
            0.25,
            EntityKind::ZombiePlant { interacted: false },
        )
    }

    pub fn portal(name: impl Into<String>, tile: TileCoord, link: PortalLink) -> Self {
        Self::interactable(name.into(), tile, 0.0, EntityKind::Portal(link))
    }

    pub fn plant(tile: TileCoord) -> Self {
        Self {
            name: format!("plant-{}-{}", tile.x, tile.y),
            tile,
            layer: Layer::Obstacle,
            flags: EntityFlags::BLOCKING,
            offset_y: 0.25,
            disabled: false,
            kind: EntityKind::Plant,
        }
    }

    /// A one-shot pickup. Starts disabled when the gateway remembers it as
    /// collected in this scene.
    pub fn pizza_pickup(
        tile: TileCoord,
        scene_id: &str,
        persistence: &dyn PersistenceGateway,
    ) -> Self {
        let name = format!("pizza-{}-{}", tile.x, tile.y);
        let disabled = persistence
            .get(scene_id, &name)
            .is_some_and(|state| state.disabled);
        Self {
            name,
            tile,
            layer: Layer::Item,
            flags: EntityFlags {
                collider: true,
                walkable: true,
                interactable: false,
                is_trigger: true,
            },
            offset_y: 0.0,
            disabled,
            kind: EntityKind::PizzaPickup,
        }
    }

    fn interactable(name: String, tile: TileCoord, offset_y: f32, kind: EntityKind) -> Self {
        Self {
            name,
            tile,
            layer: Layer::Obstacle,
            flags: EntityFlags {
                interactable: true,
                ..EntityFlags::BLOCKING
            },
            offset_y,
            disabled: false,
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_flags(mut self, flags: EntityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn into_entity(self, id: EntityId) -> Entity {
        Entity {
            id,
            name: self.name,
            layer: self.layer,
            flags: self.flags,
            offset_y: self.offset_y,
            kind: self.kind,
            tile: self.tile,
            disabled: self.disabled,
        }
    }
}
