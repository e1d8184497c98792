//! Tour execution record: one user's attempt at a specific tour.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tour::{KeyPointId, Tour, TourId, TourKeyPoint, UserId, string_id};

string_id!(
    /// Opaque identifier assigned to an execution at creation.
    ExecutionId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExecutionStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Abandoned => "Abandoned",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "Abandoned" => Ok(Self::Abandoned),
            _ => Err(()),
        }
    }
}

/// When a key point was reached during an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletedKeyPoint {
    pub key_point_id: KeyPointId,
    pub completion_time: DateTime<Utc>,
}

/// Snapshot of a single execution.
///
/// Field names serialize in the shape the tour service exposed to clients,
/// so snapshots can be mirrored to storage or a UI unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TourExecution {
    #[serde(rename = "ID")]
    pub id: ExecutionId,
    pub tour_id: TourId,
    pub user_id: UserId,
    pub status: ExecutionStatus,
    /// Ordered by completion time; a key point appears at most once.
    #[serde(default)]
    pub completed_key_points: Vec<CompletedKeyPoint>,
    pub last_activity: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl TourExecution {
    /// Fresh Active execution started at `now`.
    #[must_use]
    pub fn start(
        id: ExecutionId,
        tour_id: TourId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tour_id,
            user_id,
            status: ExecutionStatus::Active,
            completed_key_points: Vec::new(),
            last_activity: now,
            start_time: now,
            end_time: None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, ExecutionStatus::Active)
    }

    #[must_use]
    pub fn has_completed(&self, key_point: &KeyPointId) -> bool {
        self.completed_key_points
            .iter()
            .any(|done| &done.key_point_id == key_point)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_key_points.len()
    }

    /// Key points of `tour` not yet reached, in visiting order.
    pub fn pending_key_points<'t>(
        &'t self,
        tour: &'t Tour,
    ) -> impl Iterator<Item = &'t TourKeyPoint> + 't {
        tour.key_points()
            .iter()
            .filter(move |kp| !self.has_completed(&kp.id))
    }

    /// Record a key point as reached. Returns `false` if it was already recorded.
    pub(crate) fn record_completion(&mut self, key_point: KeyPointId, at: DateTime<Utc>) -> bool {
        if self.has_completed(&key_point) {
            return false;
        }
        self.completed_key_points.push(CompletedKeyPoint {
            key_point_id: key_point,
            completion_time: at,
        });
        true
    }

    pub(crate) fn finish(&mut self, status: ExecutionStatus, at: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.end_time = Some(at);
    }

    /// Progress against `tour` for passive display.
    #[must_use]
    pub fn progress(&self, tour: &Tour) -> Progress {
        Progress {
            completed: self.completed_count(),
            total: tour.key_points().len(),
            next_key_point: self.pending_key_points(tour).next().map(|kp| kp.id.clone()),
        }
    }
}

/// Completed vs total key points, plus the next one to visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub next_key_point: Option<KeyPointId>,
}

impl Progress {
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}
