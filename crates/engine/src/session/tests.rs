use super::*;
use crate::entity::{PortalLink, ZOMBIE_NAME};
use crate::persistence::InMemoryPersistence;

const DT: f32 = 1.0 / 60.0;

struct TestCatalog;

impl TestCatalog {
    fn grid(scene_id: &str, rows: &[&str]) -> Result<WorldGrid, SessionError> {
        WorldGrid::from_rows(rows).map_err(|source| SessionError::Map {
            scene: scene_id.to_string(),
            source,
        })
    }

    fn spawn_from_cells(
        grid: &WorldGrid,
        scene_id: &str,
        persistence: &dyn PersistenceGateway,
    ) -> Vec<EntityTemplate> {
        grid.cells()
            .filter_map(|(tile, cell)| match cell {
                'W' => Some(EntityTemplate::workstation(tile)),
                'C' => Some(EntityTemplate::coffee_machine(tile)),
                'o' => Some(EntityTemplate::pizza_pickup(tile, scene_id, persistence)),
                _ => None,
            })
            .collect()
    }
}

impl SceneCatalog for TestCatalog {
    fn build(
        &self,
        scene_id: &str,
        persistence: &dyn PersistenceGateway,
        config: &SimConfig,
    ) -> Result<SceneBlueprint, SessionError> {
        match scene_id {
            "hall" => {
                let grid = Self::grid(scene_id, &["#######", "#..W.C#", "#.o....", "#######"])?;
                let mut entities = Self::spawn_from_cells(&grid, scene_id, persistence);
                entities.push(EntityTemplate::portal(
                    "door",
                    TileCoord::new(6, 1),
                    PortalLink {
                        target_scene: "yard".to_string(),
                        target_portal: "gate".to_string(),
                        enter_direction: (-1, 0),
                    },
                ));
                Ok(SceneBlueprint {
                    grid,
                    player_start: TileCoord::new(1, 1),
                    entities,
                })
            }
            "yard" => {
                let grid = Self::grid(scene_id, &["#####", "....#", "#####"])?;
                Ok(SceneBlueprint {
                    grid,
                    player_start: TileCoord::new(2, 1),
                    entities: vec![EntityTemplate::portal(
                        "gate",
                        TileCoord::new(0, 1),
                        PortalLink {
                            target_scene: "hall".to_string(),
                            target_portal: "door".to_string(),
                            enter_direction: (1, 0),
                        },
                    )],
                })
            }
            "den" => {
                let grid = Self::grid(scene_id, &["#######", "#.....#", "#######"])?;
                Ok(SceneBlueprint {
                    grid,
                    player_start: TileCoord::new(1, 1),
                    entities: vec![EntityTemplate::zombie(
                        TileCoord::new(4, 1),
                        config.character_offset_y,
                        config.zombie_chase_distance,
                    )],
                })
            }
            "corner" => {
                let grid = Self::grid(scene_id, &["####", "#..#", "#.##", "####"])?;
                Ok(SceneBlueprint {
                    grid,
                    player_start: TileCoord::new(1, 1),
                    entities: Vec::new(),
                })
            }
            "broken" => {
                let grid = Self::grid(scene_id, &["...", "..."])?;
                Ok(SceneBlueprint {
                    grid,
                    player_start: TileCoord::new(0, 0),
                    entities: vec![EntityTemplate::plant(TileCoord::new(10, 10))],
                })
            }
            "ragged" => {
                let grid = Self::grid(scene_id, &["...", ".."])?;
                Ok(SceneBlueprint {
                    grid,
                    player_start: TileCoord::new(0, 0),
                    entities: Vec::new(),
                })
            }
            other => Err(SessionError::UnknownScene(other.to_string())),
        }
    }
}

fn session() -> WorldSession {
    WorldSession::new(
        SimConfig::default(),
        Box::new(TestCatalog),
        Box::new(InMemoryPersistence::default()),
    )
    .expect("session")
}

fn loaded(scene_id: &str) -> WorldSession {
    let mut session = session();
    session.load_scene(scene_id, None).expect("scene loads");
    session
}

fn run_ticks(session: &mut WorldSession, ticks: usize) {
    for _ in 0..ticks {
        session.tick(DT).expect("tick");
    }
}

fn player_tile(session: &WorldSession) -> TileCoord {
    session
        .scene()
        .and_then(SceneState::player_tile)
        .expect("player tile")
}

fn run_until_idle(session: &mut WorldSession, max_ticks: usize) -> Vec<WorldEvent> {
    let mut events = Vec::new();
    for _ in 0..max_ticks {
        session.tick(DT).expect("tick");
        events.extend(session.drain_events());
        if session.player_is_idle() {
            return events;
        }
    }
    panic!("player never became idle");
}

fn entity_kind(session: &WorldSession, name: &str) -> EntityKind {
    session
        .scene()
        .and_then(|scene| scene.grid().find_by_name(name))
        .map(|entity| entity.kind.clone())
        .expect("entity present")
}

#[test]
fn load_scene_spawns_player_at_start_and_reports_it() {
    let mut session = loaded("hall");
    assert_eq!(session.active_scene_id(), Some("hall"));
    assert_eq!(player_tile(&session), TileCoord::new(1, 1));
    assert_eq!(session.stats().tile, TileCoord::new(1, 1));
    assert_eq!(
        session.drain_events(),
        vec![WorldEvent::SceneLoaded {
            scene_id: "hall".to_string(),
            player_tile: TileCoord::new(1, 1),
        }]
    );
}

#[test]
fn unknown_scene_is_an_error_and_keeps_current_scene() {
    let mut session = loaded("hall");
    assert!(matches!(
        session.load_scene("attic", None),
        Err(SessionError::UnknownScene(name)) if name == "attic"
    ));
    assert_eq!(session.active_scene_id(), Some("hall"));
}

#[test]
fn malformed_map_and_out_of_bounds_placement_are_rejected() {
    let mut session = session();
    assert!(matches!(
        session.load_scene("ragged", None),
        Err(SessionError::Map { .. })
    ));
    assert!(matches!(
        session.load_scene("broken", None),
        Err(SessionError::PlacementOutOfBounds { .. })
    ));
    assert!(session.scene().is_none());
}

#[test]
fn tick_without_scene_fails() {
    let mut session = session();
    assert!(matches!(session.tick(DT), Err(SessionError::NoActiveScene)));
    assert!(matches!(
        session.order_player_path_to(TileCoord::new(1, 1)),
        Err(SessionError::NoActiveScene)
    ));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = SimConfig {
        move_duration_seconds: 0.0,
        ..SimConfig::default()
    };
    let result = WorldSession::new(
        config,
        Box::new(TestCatalog),
        Box::new(InMemoryPersistence::default()),
    );
    assert!(matches!(result, Err(SessionError::Config(_))));
}

#[test]
fn path_order_walks_player_to_tile() {
    let mut session = loaded("corner");
    let steps = session
        .order_player_path_to(TileCoord::new(2, 2))
        .expect("order");
    assert_eq!(steps, 2);

    run_until_idle(&mut session, 120);
    assert_eq!(player_tile(&session), TileCoord::new(2, 2));
    assert_eq!(session.stats().tile, TileCoord::new(2, 2));
}

#[test]
fn out_of_bounds_order_clears_queued_path() {
    let mut session = loaded("corner");
    session
        .order_player_path_to(TileCoord::new(2, 2))
        .expect("order");
    assert_eq!(
        session
            .order_player_path_to(TileCoord::new(9, 9))
            .expect("order"),
        0
    );
    assert!(session.player_is_idle());
}

#[test]
fn path_onto_coffee_machine_stops_adjacent_and_drinks() {
    let mut session = loaded("hall");
    session
        .order_player_path_to(TileCoord::new(5, 2))
        .expect("order");

    let events = run_until_idle(&mut session, 240);
    assert_eq!(player_tile(&session), TileCoord::new(4, 1));
    assert_eq!(
        entity_kind(&session, "coffee-5-2"),
        EntityKind::CoffeeMachine { filled: false }
    );
    assert!(events.contains(&WorldEvent::Sound(crate::events::SoundCue::Drinking)));
}

#[test]
fn workstation_interaction_holds_player_until_unlocked() {
    let mut session = loaded("hall");
    session
        .order_player_path_to(TileCoord::new(3, 2))
        .expect("order");

    let mut started = false;
    for _ in 0..240 {
        session.tick(DT).expect("tick");
        let events = session.drain_events();
        if events
            .iter()
            .any(|event| matches!(event, WorldEvent::InteractionStarted { .. }))
        {
            started = true;
            break;
        }
    }
    assert!(started);
    let scene = session.scene().expect("scene");
    assert!(scene
        .player_state()
        .expect("player")
        .is_busy_interacting());
    assert!(!session
        .order_player_step(0, -1)
        .expect("step order"));

    let events = run_until_idle(&mut session, 120);
    assert!(events
        .iter()
        .any(|event| matches!(event, WorldEvent::InteractionFinished { .. })));
    assert_eq!(
        entity_kind(&session, "workstation-3-2"),
        EntityKind::Workstation { working: true }
    );
}

#[test]
fn pickup_is_collected_on_settle_and_stays_collected_after_reload() {
    let mut session = loaded("hall");
    let pickup_tile = TileCoord::new(2, 1);
    session.order_player_path_to(pickup_tile).expect("order");

    let events = run_until_idle(&mut session, 120);
    assert!(events.contains(&WorldEvent::Sound(crate::events::SoundCue::Eating)));
    assert!(session
        .persistence()
        .get("hall", "pizza-2-1")
        .is_some_and(|state| state.disabled));
    assert_eq!(session.metrics().triggers_fired, 1);

    session.load_scene("hall", None).expect("reload");
    let grid = session.scene().expect("scene").grid();
    assert!(grid.entities_at(pickup_tile, false).is_empty());
    assert_eq!(grid.entities_at(pickup_tile, true).len(), 1);
}

#[test]
fn portal_loads_target_scene_and_steps_off_entry_portal() {
    let mut session = loaded("hall");
    session
        .order_player_path_to(TileCoord::new(6, 1))
        .expect("order");

    let mut transitioned = false;
    for _ in 0..400 {
        session.tick(DT).expect("tick");
        if session.active_scene_id() == Some("yard") {
            transitioned = true;
            break;
        }
    }
    assert!(transitioned);
    assert_eq!(player_tile(&session), TileCoord::new(0, 1));
    let events = session.drain_events();
    assert!(events.contains(&WorldEvent::SceneTransitionRequested {
        target_scene: "yard".to_string(),
        target_portal: "gate".to_string(),
    }));

    run_ticks(&mut session, 40);
    assert_eq!(player_tile(&session), TileCoord::new(1, 1));
    assert_eq!(session.stats().tile, TileCoord::new(1, 1));
    assert_eq!(session.metrics().scene_loads, 2);
}

#[test]
fn missing_entry_portal_falls_back_to_player_start() {
    let mut session = session();
    session
        .load_scene("yard", Some("nowhere"))
        .expect("scene loads");
    assert_eq!(player_tile(&session), TileCoord::new(2, 1));
}

#[test]
fn zombie_chases_and_stops_next_to_player() {
    let mut session = loaded("den");
    run_ticks(&mut session, 180);

    let grid = session.scene().expect("scene").grid();
    let zombie = grid.find_by_name(ZOMBIE_NAME).expect("zombie");
    assert_eq!(zombie.tile(), TileCoord::new(2, 1));
    assert_eq!(player_tile(&session), TileCoord::new(1, 1));
    assert!(session.metrics().moves_rejected > 0);
}

#[test]
fn keyboard_step_refuses_to_cut_blocked_corner() {
    let mut session = loaded("corner");
    assert!(!session.order_player_step(1, 1).expect("diagonal"));
    assert!(!session.order_player_step(1, 0).expect("into wall"));
    assert!(!session.order_player_step(0, 0).expect("no direction"));
    assert!(session.order_player_step(0, 1).expect("up"));

    run_until_idle(&mut session, 60);
    assert_eq!(player_tile(&session), TileCoord::new(1, 2));
    assert!(session.order_player_step(1, 0).expect("right"));
}

#[test]
fn metrics_handle_tracks_ticks() {
    let mut session = loaded("corner");
    let handle = session.metrics_handle();
    run_ticks(&mut session, 5);
    assert_eq!(handle.snapshot().ticks, 5);
    assert_eq!(handle.snapshot().scene_loads, 1);
}

#[test]
fn end_scene_drops_active_scene() {
    let mut session = loaded("corner");
    assert_eq!(session.end_scene().as_deref(), Some("corner"));
    assert!(session.scene().is_none());
    assert_eq!(session.end_scene(), None);
}

#[test]
fn player_stats_start_full_and_follow_player_tile() {
    let mut session = loaded("corner");
    assert_eq!(session.stats().hp, session.stats().max_hp);
    assert_eq!(session.stats().max_hp, SimConfig::default().player_max_hp);

    assert!(session.order_player_step(0, 1).expect("up"));
    run_until_idle(&mut session, 60);
    assert_eq!(session.stats().tile, TileCoord::new(1, 2));
}

#[test]
fn destroying_a_moving_entity_drops_its_move() {
    let mut session = loaded("den");
    let zombie = session
        .scene()
        .and_then(|scene| scene.grid().find_by_name(ZOMBIE_NAME))
        .map(|zombie| zombie.id)
        .expect("zombie");
    run_ticks(&mut session, 1);
    assert!(session
        .scene()
        .expect("scene")
        .movement()
        .is_moving(zombie));

    assert!(session.destroy_entity(zombie).expect("destroy"));
    let scene = session.scene().expect("scene");
    assert!(scene.grid().entity(zombie).is_none());
    assert!(!scene.movement().is_moving(zombie));
    assert_eq!(scene.movement().moving_count(), 0);
    assert!(scene.grid().is_walkable(TileCoord::new(3, 1), None));

    session.drain_events();
    run_ticks(&mut session, 30);
    assert!(!session.drain_events().iter().any(|event| matches!(
        event,
        WorldEvent::MoveSettled { entity, .. } if *entity == zombie
    )));
    assert!(!session.destroy_entity(zombie).expect("already gone"));
}

#[test]
fn destroying_a_locked_interactable_releases_waiting_player() {
    let mut session = loaded("hall");
    session
        .order_player_path_to(TileCoord::new(3, 2))
        .expect("order");
    let mut started = false;
    for _ in 0..240 {
        session.tick(DT).expect("tick");
        if session
            .drain_events()
            .iter()
            .any(|event| matches!(event, WorldEvent::InteractionStarted { .. }))
        {
            started = true;
            break;
        }
    }
    assert!(started);

    let scene = session.scene().expect("scene");
    let station = scene
        .grid()
        .find_by_name("workstation-3-2")
        .map(|station| station.id)
        .expect("workstation");
    assert!(matches!(
        scene.interactions().lock_state(station),
        crate::interaction::InteractionLock::Locked { .. }
    ));
    assert!(!session.player_is_idle());

    assert!(session.destroy_entity(station).expect("destroy"));
    let scene = session.scene().expect("scene");
    assert_eq!(scene.interactions().active_count(), 0);
    assert!(!scene
        .player_state()
        .expect("player")
        .is_busy_interacting());
    assert!(session.player_is_idle());
}

#[test]
fn player_cannot_be_destroyed() {
    let mut session = loaded("corner");
    let player = session.scene().expect("scene").player();
    assert!(!session.destroy_entity(player).expect("refused"));
    assert!(session.scene().expect("scene").grid().entity(player).is_some());

    session.end_scene();
    assert!(matches!(
        session.destroy_entity(player),
        Err(SessionError::NoActiveScene)
    ));
}
