//! Error taxonomy for execution tracking.
//!
//! Every variant except [`TrackingError::NotFound`] is recoverable at the
//! call site: polling simply retries on the next tick and the route-driven
//! features degrade to static waypoints. An unknown execution id is a caller
//! bug and is always surfaced.
use thiserror::Error;

use crate::config::ConfigError;
use crate::execution::{ExecutionId, ExecutionStatus};
use crate::tour::{TourId, UserId};

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the tour execution engine.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("user {user} already has an active execution {active} on tour {tour}")]
    Conflict {
        user: UserId,
        active: ExecutionId,
        tour: TourId,
    },
    #[error("execution {execution} has {completed} of {required} key points completed")]
    Precondition {
        execution: ExecutionId,
        completed: usize,
        required: usize,
    },
    #[error("execution {0} not found")]
    NotFound(ExecutionId),
    #[error("user {0} has no active execution")]
    NoActiveExecution(UserId),
    #[error("tour {0} not found")]
    TourNotFound(TourId),
    #[error("execution {execution} is already {status}")]
    Terminal {
        execution: ExecutionId,
        status: ExecutionStatus,
    },
    #[error("execution {execution} does not belong to user {user}")]
    NotOwner {
        execution: ExecutionId,
        user: UserId,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
    #[error("persistence gateway failed: {0}")]
    Persistence(#[source] BoxedSource),
    #[error("tour catalog failed: {0}")]
    Catalog(#[source] BoxedSource),
}

impl TrackingError {
    pub(crate) fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Box::new(err))
    }

    pub(crate) fn catalog(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Catalog(Box::new(err))
    }

    /// Whether the caller can carry on (retry, degrade) after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// The route provider could not produce a polyline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route needs at least two waypoints (got {0})")]
    TooFewWaypoints(usize),
    #[error("route provider returned an empty polyline")]
    Empty,
    #[error("route provider failed: {0}")]
    Provider(String),
}

/// The position source has no position to offer right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("position unavailable: {reason}")]
pub struct Unavailable {
    pub reason: String,
}

impl Unavailable {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_execution_is_unrecoverable() {
        let missing = TrackingError::NotFound(ExecutionId::from("nope"));
        assert!(!missing.is_recoverable());
        assert_eq!(missing.to_string(), "execution nope not found");

        let conflict = TrackingError::Conflict {
            user: UserId::from("ana"),
            active: ExecutionId::from("e1"),
            tour: TourId::from("t1"),
        };
        assert!(conflict.is_recoverable());
        assert!(TrackingError::from(Unavailable::new("sensor off")).is_recoverable());
        assert!(TrackingError::from(RouteError::Empty).is_recoverable());
    }

    #[test]
    fn persistence_keeps_source() {
        let io = std::io::Error::other("disk gone");
        let err = TrackingError::persistence(io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("disk gone"));
    }
}
