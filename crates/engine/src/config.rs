use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite number greater than zero, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f32 },
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: f32,
        max: f32,
    },
}

/// Frame deltas above this are stalls, not frames.
pub const MAX_FRAME_DELTA_SECONDS: f32 = 10.0;

/// Tunables shared by every scene of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub tile_size: f32,
    pub move_duration_seconds: f32,
    pub target_tps: u32,
    pub max_frame_delta_seconds: f32,
    pub max_ticks_per_frame: u32,
    pub zombie_think_interval_seconds: f32,
    pub zombie_chase_distance: u32,
    pub interaction_delay_seconds: f32,
    pub portal_enter_delay_seconds: f32,
    pub player_max_hp: u32,
    pub character_offset_y: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tile_size: 20.0,
            move_duration_seconds: 0.25,
            target_tps: 60,
            max_frame_delta_seconds: 0.25,
            max_ticks_per_frame: 5,
            zombie_think_interval_seconds: 0.15,
            zombie_chase_distance: 3,
            interaction_delay_seconds: 0.4,
            portal_enter_delay_seconds: 0.1,
            player_max_hp: 100,
            character_offset_y: 0.25,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("tile_size", self.tile_size)?;
        require_positive("move_duration_seconds", self.move_duration_seconds)?;
        require_positive("max_frame_delta_seconds", self.max_frame_delta_seconds)?;
        require_at_most(
            "max_frame_delta_seconds",
            self.max_frame_delta_seconds,
            MAX_FRAME_DELTA_SECONDS,
        )?;
        require_positive(
            "zombie_think_interval_seconds",
            self.zombie_think_interval_seconds,
        )?;
        require_non_negative("interaction_delay_seconds", self.interaction_delay_seconds)?;
        require_non_negative("portal_enter_delay_seconds", self.portal_enter_delay_seconds)?;
        require_finite("character_offset_y", self.character_offset_y)?;
        if self.target_tps == 0 {
            return Err(ConfigError::ZeroCount {
                field: "target_tps",
            });
        }
        if self.max_ticks_per_frame == 0 {
            return Err(ConfigError::ZeroCount {
                field: "max_ticks_per_frame",
            });
        }
        if self.player_max_hp == 0 {
            return Err(ConfigError::ZeroCount {
                field: "player_max_hp",
            });
        }
        Ok(())
    }

    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }

    /// Clamped into `0..=MAX_FRAME_DELTA_SECONDS` so unvalidated configs
    /// cannot overflow `Duration`.
    pub fn max_frame_delta(&self) -> Duration {
        let seconds = self
            .max_frame_delta_seconds
            .clamp(0.0, MAX_FRAME_DELTA_SECONDS);
        Duration::try_from_secs_f32(seconds).unwrap_or(Duration::from_millis(250))
    }
}

fn require_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn require_at_most(field: &'static str, value: f32, max: f32) -> Result<(), ConfigError> {
    if value <= max {
        Ok(())
    } else {
        Err(ConfigError::TooLarge { field, value, max })
    }
}

fn require_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::NonPositive { field, value });
    }
    Ok(())
}
