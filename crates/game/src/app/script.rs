use std::collections::VecDeque;

use grid_engine::{SessionError, TileCoord, WorldSession};
use tracing::{debug, info, warn};

const ORDER_TIMEOUT_SECONDS: f32 = 20.0;

/// One player order of a headless run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ScriptedOrder {
    /// Pointer-style: path to the tile, interacting if something stands there.
    PathTo(TileCoord),
    /// Keyboard-style single step.
    Step { dx: i32, dy: i32 },
    Wait { seconds: f32 },
}

/// Tour of both scenes: workstation, pizza, exit portal, zombie plant and
/// back through the portal.
pub(crate) fn default_script() -> Vec<ScriptedOrder> {
    vec![
        ScriptedOrder::PathTo(TileCoord::new(9, 3)),
        ScriptedOrder::PathTo(TileCoord::new(10, 3)),
        ScriptedOrder::PathTo(TileCoord::new(16, 5)),
        ScriptedOrder::Wait { seconds: 0.5 },
        ScriptedOrder::PathTo(TileCoord::new(3, 3)),
        ScriptedOrder::PathTo(TileCoord::new(0, 2)),
        ScriptedOrder::Wait { seconds: 0.5 },
        ScriptedOrder::Step { dx: -1, dy: 0 },
    ]
}

#[derive(Debug, Clone, Copy)]
struct ActiveOrder {
    order: ScriptedOrder,
    elapsed_seconds: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScriptProgress {
    pub(crate) completed: usize,
    pub(crate) timed_out: usize,
}

/// Issues the next order once the player is idle again.
#[derive(Debug)]
pub(crate) struct ScriptRunner {
    pending: VecDeque<ScriptedOrder>,
    active: Option<ActiveOrder>,
    timeout_seconds: f32,
    progress: ScriptProgress,
}

impl ScriptRunner {
    pub(crate) fn new(orders: Vec<ScriptedOrder>) -> Self {
        Self {
            pending: orders.into(),
            active: None,
            timeout_seconds: ORDER_TIMEOUT_SECONDS,
            progress: ScriptProgress::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_timeout(mut self, seconds: f32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    pub(crate) fn progress(&self) -> ScriptProgress {
        self.progress
    }

    /// Called once per fixed tick before the session advances.
    pub(crate) fn drive(
        &mut self,
        session: &mut WorldSession,
        dt_seconds: f32,
    ) -> Result<(), SessionError> {
        if let Some(active) = self.active.as_mut() {
            active.elapsed_seconds += dt_seconds;
            let done = match active.order {
                ScriptedOrder::Wait { seconds } => active.elapsed_seconds >= seconds,
                ScriptedOrder::PathTo(_) | ScriptedOrder::Step { .. } => session.player_is_idle(),
            };
            if done {
                info!(
                    order = ?active.order,
                    scene = session.active_scene_id().unwrap_or("none"),
                    "order_completed"
                );
                self.progress.completed += 1;
                self.active = None;
            } else if active.elapsed_seconds >= self.timeout_seconds {
                warn!(order = ?active.order, "order_timed_out");
                self.progress.timed_out += 1;
                self.active = None;
            } else {
                return Ok(());
            }
        }

        let Some(order) = self.pending.pop_front() else {
            return Ok(());
        };
        match order {
            ScriptedOrder::PathTo(tile) => {
                let steps = session.order_player_path_to(tile)?;
                if steps == 0 {
                    debug!(tile = ?tile, "order_has_no_path");
                }
            }
            ScriptedOrder::Step { dx, dy } => {
                if !session.order_player_step(dx, dy)? {
                    debug!(dx, dy, "order_step_refused");
                }
            }
            ScriptedOrder::Wait { .. } => {}
        }
        self.active = Some(ActiveOrder {
            order,
            elapsed_seconds: 0.0,
        });
        Ok(())
    }
}
