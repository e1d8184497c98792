//! Tourtrack Engine
//!
//! Platform-agnostic tour execution tracking: starting a guided tour,
//! consuming a tourist's position, detecting arrival at key points and
//! driving the execution through Active → Completed/Abandoned.
//! The scheduled pieces (polling, movement simulation, elapsed-time display)
//! live behind the `runtime` feature.

pub mod clock;
pub mod config;
pub mod constants;
pub mod elapsed;
pub mod engine;
pub mod error;
pub mod execution;
pub mod geo;
pub mod memory;
pub mod proximity;
pub mod simulator;
pub mod tour;

#[cfg(feature = "runtime")]
pub mod runtime;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, TrackingConfig};
pub use elapsed::{ElapsedTimeTracker, elapsed_since, format_elapsed};
pub use engine::TourExecutionEngine;
pub use error::{RouteError, TrackingError, Unavailable};
pub use execution::{CompletedKeyPoint, ExecutionId, ExecutionStatus, Progress, TourExecution};
pub use geo::{Coordinate, CoordinateParseError, Polyline, haversine_m};
pub use memory::{GatewayError, InMemoryCatalog, InMemoryGateway};
pub use proximity::{ProximityEvaluator, reached};
pub use simulator::{MovementEvent, MovementPhase, MovementSimulator};
pub use tour::{KeyPointId, Tour, TourId, TourKeyPoint, UserId};

/// Durable storage for executions.
/// The engine mirrors every mutation through this trait.
pub trait PersistenceGateway {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store a freshly started execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution cannot be stored.
    fn create_execution(&self, execution: &TourExecution) -> Result<(), Self::Error>;

    /// Overwrite a stored execution with a newer snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution cannot be stored.
    fn update_execution(&self, execution: &TourExecution) -> Result<(), Self::Error>;

    /// Load an execution by id.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be reached.
    fn fetch_execution(&self, id: &ExecutionId) -> Result<Option<TourExecution>, Self::Error>;

    /// Load the user's Active execution, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be reached.
    fn fetch_active_execution(&self, user: &UserId) -> Result<Option<TourExecution>, Self::Error>;
}

/// Read-only source of tours and their key points.
pub trait TourCatalog {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a tour by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be reached.
    fn fetch_tour(&self, id: &TourId) -> Result<Option<Tour>, Self::Error>;
}
