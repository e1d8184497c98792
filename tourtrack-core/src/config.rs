//! Tracking configuration: proximity threshold and scheduling intervals.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    ELAPSED_TICK_MS, KEY_POINT_COMPLETION_THRESHOLD_M, POLL_INTERVAL_MS, ROUTE_STEP_M,
    SIMULATION_TICK_MS,
};

/// Errors raised when tracking configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value:.2})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be at least 1 ms")]
    ZeroInterval { field: &'static str },
    #[error("invalid config JSON: {0}")]
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Maximum distance in metres at which a key point counts as reached.
    #[serde(default = "TrackingConfig::default_proximity_threshold_m")]
    pub proximity_threshold_m: f64,
    #[serde(default = "TrackingConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "TrackingConfig::default_simulation_tick_ms")]
    pub simulation_tick_ms: u64,
    #[serde(default = "TrackingConfig::default_elapsed_tick_ms")]
    pub elapsed_tick_ms: u64,
    /// Vertex spacing used by the straight-line route provider.
    #[serde(default = "TrackingConfig::default_route_step_m")]
    pub route_step_m: f64,
}

impl TrackingConfig {
    const fn default_proximity_threshold_m() -> f64 {
        KEY_POINT_COMPLETION_THRESHOLD_M
    }

    const fn default_poll_interval_ms() -> u64 {
        POLL_INTERVAL_MS
    }

    const fn default_simulation_tick_ms() -> u64 {
        SIMULATION_TICK_MS
    }

    const fn default_elapsed_tick_ms() -> u64 {
        ELAPSED_TICK_MS
    }

    const fn default_route_step_m() -> f64 {
        ROUTE_STEP_M
    }

    /// Parse and validate a JSON config document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that the threshold is positive and no interval is zero.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("proximity_threshold_m", self.proximity_threshold_m),
            ("route_step_m", self.route_step_m),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("simulation_tick_ms", self.simulation_tick_ms),
            ("elapsed_tick_ms", self.elapsed_tick_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn simulation_tick(&self) -> Duration {
        Duration::from_millis(self.simulation_tick_ms)
    }

    #[must_use]
    pub const fn elapsed_tick(&self) -> Duration {
        Duration::from_millis(self.elapsed_tick_ms)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_m: Self::default_proximity_threshold_m(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            simulation_tick_ms: Self::default_simulation_tick_ms(),
            elapsed_tick_ms: Self::default_elapsed_tick_ms(),
            route_step_m: Self::default_route_step_m(),
        }
    }
}
