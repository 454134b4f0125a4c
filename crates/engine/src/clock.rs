use std::time::Duration;

use tracing::warn;

use crate::config::SimConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

/// Turns variable frame deltas into a bounded number of fixed simulation
/// ticks. Backlog beyond `max_ticks_per_frame` is dropped, not replayed.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
}

impl FixedStepClock {
    pub fn new(fixed_dt: Duration, max_frame_delta: Duration, max_ticks_per_frame: u32) -> Self {
        Self {
            fixed_dt: normalize_non_zero_duration(fixed_dt, Duration::from_millis(16)),
            max_frame_delta,
            max_ticks_per_frame: max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.fixed_dt(),
            config.max_frame_delta(),
            config.max_ticks_per_frame,
        )
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt.as_secs_f32()
    }

    /// Feeds one frame and returns how many fixed ticks to run now.
    pub fn advance(&mut self, raw_frame_dt: Duration) -> u32 {
        let clamped = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        let accumulator = self.accumulator.saturating_add(clamped);
        let plan = plan_sim_steps(accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = plan.remaining_accumulator;
        if plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        plan.ticks_to_run
    }
}

pub fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
