use std::fs;
use std::path::Path;

use grid_engine::SimConfig;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::scenes::START_SCENE;
use super::script::{default_script, ScriptedOrder};

const CONFIG_ENV_VAR: &str = "GRID_GAME_CONFIG";
const MAX_TICKS_ENV_VAR: &str = "GRID_GAME_MAX_TICKS";
const DEFAULT_MAX_TICKS: u64 = 3600;

/// Optional JSON run configuration. Every field falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RunConfig {
    pub(crate) sim: SimConfig,
    pub(crate) start_scene: String,
    pub(crate) max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            start_scene: START_SCENE.to_string(),
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: SimConfig,
    pub(crate) start_scene: String,
    pub(crate) max_ticks: u64,
    pub(crate) script: Vec<ScriptedOrder>,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Grid Game Startup ===");

    let mut run_config = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => load_config(Path::new(&path))?,
        None => RunConfig::default(),
    };
    run_config.max_ticks = parse_max_ticks(
        std::env::var(MAX_TICKS_ENV_VAR).ok().as_deref(),
        run_config.max_ticks,
    );
    run_config
        .sim
        .validate()
        .map_err(|error| format!("validate config: {error}"))?;

    info!(
        start_scene = run_config.start_scene.as_str(),
        max_ticks = run_config.max_ticks,
        target_tps = run_config.sim.target_tps,
        "run_configured"
    );
    Ok(AppWiring {
        config: run_config.sim,
        start_scene: run_config.start_scene,
        max_ticks: run_config.max_ticks,
        script: default_script(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_config(path: &Path) -> Result<RunConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read config '{}': {error}", path.display()))?;
    parse_config_json(&raw)
}

fn parse_config_json(raw: &str) -> Result<RunConfig, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, RunConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse config json: {source}"))
            } else {
                Err(format!("parse config json at {path}: {source}"))
            }
        }
    }
}

fn parse_max_ticks(raw: Option<&str>, fallback: u64) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return fallback;
    };
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(value = raw, fallback, "invalid_max_ticks");
            fallback
        }
    }
}
