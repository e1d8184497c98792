//! Centralized tuning constants for tour execution tracking.
//!
//! These values are the defaults behind [`crate::config::TrackingConfig`].
//! Keeping them together means the observed behaviour can only drift through
//! reviewed code changes, while deployments still override them via config.

// Geometry -----------------------------------------------------------------
pub(crate) const EARTH_RADIUS_M: f64 = 6_371_000.0;

// Proximity ----------------------------------------------------------------
pub(crate) const KEY_POINT_COMPLETION_THRESHOLD_M: f64 = 50.0;

// Scheduling ---------------------------------------------------------------
pub(crate) const POLL_INTERVAL_MS: u64 = 5_000;
pub(crate) const SIMULATION_TICK_MS: u64 = 1_000;
pub(crate) const ELAPSED_TICK_MS: u64 = 1_000;

// Routing ------------------------------------------------------------------
pub(crate) const ROUTE_STEP_M: f64 = 25.0;
pub(crate) const ROUTE_MAX_VERTICES_PER_LEG: usize = 10_000;

// Identity -----------------------------------------------------------------
pub(crate) const EXECUTION_ID_BYTES: usize = 12;

// Elapsed display ----------------------------------------------------------
pub(crate) const ELAPSED_ZERO: &str = "00:00:00";
