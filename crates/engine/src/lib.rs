pub mod clock;
pub mod config;
pub mod entity;
pub mod events;
pub mod geometry;
pub mod grid;
pub mod interaction;
pub mod metrics;
pub mod movement;
pub mod nav;
pub mod persistence;
pub mod session;

pub use clock::{plan_sim_steps, FixedStepClock, StepPlan};
pub use config::{ConfigError, SimConfig, MAX_FRAME_DELTA_SECONDS};
pub use entity::{
    ActorRef, Entity, EntityFlags, EntityId, EntityKind, EntityTemplate, Facing, Layer,
    PlayerState, PortalLink, ZombieState, PLAYER_NAME, ZOMBIE_NAME,
};
pub use events::{EventQueue, SoundCue, WorldEvent};
pub use geometry::{GridGeometry, TileCoord, Vec2};
pub use grid::{GridIndex, MapError, OccupancyOptions, WorldGrid, WALL_MARKER};
pub use interaction::{InteractionDispatcher, InteractionHandle, InteractionLock};
pub use metrics::{MetricsHandle, SimMetricsSnapshot};
pub use movement::{AcceptedMove, MoveRejection, MoveState, MovementCoordinator, SettledMove};
pub use nav::{find_path, octile_distance, path_cost, OccupancyGrid};
pub use persistence::{InMemoryPersistence, PersistedState, PersistenceError, PersistenceGateway};
pub use session::{
    PlayerStats, SceneBlueprint, SceneCatalog, SceneState, SessionError, WorldSession,
};
