use std::process::ExitCode;
use std::time::Duration;

use grid_engine::{
    FixedStepClock, InMemoryPersistence, SessionError, SimMetricsSnapshot, WorldEvent,
    WorldSession,
};
use tracing::{debug, error, info};

use super::bootstrap::AppWiring;
use super::scenes::SceneLibrary;
use super::script::{ScriptProgress, ScriptRunner};

/// Frame pacing of the headless driver; not tied to wall-clock time.
const SIMULATED_FRAME_DELTA: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) frames: u64,
    pub(crate) final_scene: Option<String>,
    pub(crate) script: ScriptProgress,
    pub(crate) script_finished: bool,
    pub(crate) metrics: SimMetricsSnapshot,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match start_and_run(app) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                frames = summary.frames,
                final_scene = summary.final_scene.as_deref().unwrap_or("none"),
                orders_completed = summary.script.completed,
                orders_timed_out = summary.script.timed_out,
                script_finished = summary.script_finished,
                scene_loads = summary.metrics.scene_loads,
                "session_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}

fn start_and_run(app: AppWiring) -> Result<RunSummary, SessionError> {
    let clock = FixedStepClock::from_config(&app.config);
    let mut session = WorldSession::new(
        app.config,
        Box::new(SceneLibrary),
        Box::new(InMemoryPersistence::default()),
    )?;
    debug!(
        scenes = ?SceneLibrary.scene_ids().collect::<Vec<_>>(),
        "scene_library_ready"
    );
    session.load_scene(&app.start_scene, None)?;
    run_scripted(
        &mut session,
        clock,
        ScriptRunner::new(app.script),
        SIMULATED_FRAME_DELTA,
        app.max_ticks,
    )
}

/// Feeds simulated frames through the fixed-step clock until the script is
/// done or `max_ticks` ticks have run.
pub(crate) fn run_scripted(
    session: &mut WorldSession,
    mut clock: FixedStepClock,
    mut script: ScriptRunner,
    frame_delta: Duration,
    max_ticks: u64,
) -> Result<RunSummary, SessionError> {
    let dt_seconds = clock.fixed_dt_seconds();
    let mut ticks = 0u64;
    let mut frames = 0u64;

    'frames: while ticks < max_ticks {
        frames += 1;
        for _ in 0..clock.advance(frame_delta) {
            script.drive(session, dt_seconds)?;
            if script.is_finished() {
                break 'frames;
            }
            session.tick(dt_seconds)?;
            ticks += 1;
            log_events(session.drain_events());
            if ticks >= max_ticks {
                break 'frames;
            }
        }
    }

    Ok(RunSummary {
        ticks,
        frames,
        final_scene: session.active_scene_id().map(ToString::to_string),
        script: script.progress(),
        script_finished: script.is_finished(),
        metrics: session.metrics(),
    })
}

fn log_events(events: Vec<WorldEvent>) {
    for event in events {
        match event {
            WorldEvent::SceneTransitionRequested {
                target_scene,
                target_portal,
            } => info!(
                target_scene = target_scene.as_str(),
                target_portal = target_portal.as_str(),
                "scene_transition"
            ),
            WorldEvent::InteractionStarted { target, actor } => {
                info!(target_entity = target.0, actor = actor.0, "interaction_started")
            }
            WorldEvent::EntityDisabled { entity } => info!(entity = entity.0, "entity_disabled"),
            other => debug!(event = ?other, "world_event"),
        }
    }
}
