use grid_engine::{
    EntityTemplate, PersistenceGateway, PortalLink, SceneBlueprint, SceneCatalog, SessionError,
    SimConfig, TileCoord, WorldGrid,
};
use tracing::debug;

pub(crate) const START_SCENE: &str = "office";

struct PortalDef {
    name: &'static str,
    tile: (i32, i32),
    target_scene: &'static str,
    target_portal: &'static str,
    enter_direction: (i32, i32),
}

struct ZombieDef {
    tile: (i32, i32),
    /// Falls back to `SimConfig::zombie_chase_distance`.
    chase_distance: Option<u32>,
}

struct SceneDef {
    id: &'static str,
    map: &'static str,
    player_start: (i32, i32),
    portals: &'static [PortalDef],
    zombies: &'static [ZombieDef],
    zombie_plants: &'static [(i32, i32)],
}

const OFFICE_MAP: &str = "
# # # # # # # # # # # # # # # # #
# . W T # T . . W T . W . . . T #
# . . . . . . . . . . . . . . o .
# o . . # . . . # # # # . . # # #
# # # # # . . . # W o W . . T W #
# C C C # . . . T . . . . . . . #
# o . . . . . . . . . . . . . o #
# # # # # # # # # # # # # # # # #
";

const OTHER_MAP: &str = "
# # # # # #
# . . . . #
. . . . . #
# . . . . #
# # # # # #
";

const SCENES: &[SceneDef] = &[
    SceneDef {
        id: "office",
        map: OFFICE_MAP,
        player_start: (6, 3),
        portals: &[PortalDef {
            name: "exit",
            tile: (16, 5),
            target_scene: "other",
            target_portal: "start",
            enter_direction: (-1, 0),
        }],
        zombies: &[ZombieDef {
            tile: (4, 1),
            chase_distance: None,
        }],
        zombie_plants: &[],
    },
    SceneDef {
        id: "other",
        map: OTHER_MAP,
        player_start: (0, 2),
        portals: &[PortalDef {
            name: "start",
            tile: (0, 2),
            target_scene: "office",
            target_portal: "exit",
            enter_direction: (1, 0),
        }],
        zombies: &[],
        zombie_plants: &[(3, 3)],
    },
];

/// Built-in scenes of the game.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SceneLibrary;

impl SceneLibrary {
    pub(crate) fn scene_ids(&self) -> impl Iterator<Item = &'static str> {
        SCENES.iter().map(|scene| scene.id)
    }
}

impl SceneCatalog for SceneLibrary {
    fn build(
        &self,
        scene_id: &str,
        persistence: &dyn PersistenceGateway,
        config: &SimConfig,
    ) -> Result<SceneBlueprint, SessionError> {
        let def = SCENES
            .iter()
            .find(|scene| scene.id == scene_id)
            .ok_or_else(|| SessionError::UnknownScene(scene_id.to_string()))?;
        let grid = WorldGrid::parse(def.map).map_err(|source| SessionError::Map {
            scene: scene_id.to_string(),
            source,
        })?;

        let mut entities = spawn_from_cells(&grid, scene_id, persistence);
        entities.extend(def.portals.iter().map(|portal| {
            EntityTemplate::portal(
                portal.name,
                TileCoord::from(portal.tile),
                PortalLink {
                    target_scene: portal.target_scene.to_string(),
                    target_portal: portal.target_portal.to_string(),
                    enter_direction: portal.enter_direction,
                },
            )
        }));
        entities.extend(
            def.zombie_plants
                .iter()
                .map(|tile| EntityTemplate::zombie_plant(TileCoord::from(*tile))),
        );
        entities.extend(def.zombies.iter().map(|zombie| {
            EntityTemplate::zombie(
                TileCoord::from(zombie.tile),
                config.character_offset_y,
                zombie.chase_distance.unwrap_or(config.zombie_chase_distance),
            )
        }));

        debug!(
            scene = scene_id,
            width = grid.width(),
            height = grid.height(),
            entities = entities.len(),
            "scene_blueprint_built"
        );
        Ok(SceneBlueprint {
            grid,
            player_start: TileCoord::from(def.player_start),
            entities,
        })
    }
}

fn spawn_from_cells(
    grid: &WorldGrid,
    scene_id: &str,
    persistence: &dyn PersistenceGateway,
) -> Vec<EntityTemplate> {
    grid.cells()
        .filter_map(|(tile, cell)| match cell {
            'o' => Some(EntityTemplate::pizza_pickup(tile, scene_id, persistence)),
            'W' => Some(EntityTemplate::workstation(tile)),
            'C' => Some(EntityTemplate::coffee_machine(tile)),
            'T' => Some(EntityTemplate::plant(tile)),
            _ => None,
        })
        .collect()
}
