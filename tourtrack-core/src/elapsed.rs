//! Human-readable elapsed time since an execution started.
use chrono::{DateTime, TimeDelta, Utc};

use crate::constants::ELAPSED_ZERO;
use crate::execution::TourExecution;

/// Format a duration as `HH:MM:SS`.
///
/// Hours are not wrapped into days, so 25 hours renders as `25:00:00`.
/// Negative durations (clock skew) render as zero.
#[must_use]
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds();
    if total <= 0 {
        return ELAPSED_ZERO.to_string();
    }
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Formatted time between `start` and `now`.
#[must_use]
pub fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_elapsed(now.signed_duration_since(start))
}

/// Tracks the displayed duration of one execution.
///
/// The tracker runs only while the observed execution is Active; a terminal
/// snapshot freezes the display at the execution's end time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElapsedTimeTracker {
    start: Option<DateTime<Utc>>,
    frozen_at: Option<DateTime<Utc>>,
}

impl ElapsedTimeTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: None,
            frozen_at: None,
        }
    }

    /// Feed the latest snapshot. Returns whether the tracker should keep ticking.
    pub fn observe(&mut self, execution: &TourExecution) -> bool {
        self.start = Some(execution.start_time);
        if execution.is_active() {
            self.frozen_at = None;
            true
        } else {
            self.frozen_at = execution.end_time.or(Some(execution.last_activity));
            false
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.start.is_some() && self.frozen_at.is_none()
    }

    /// Display string at `now`, or `00:00:00` before any execution was seen.
    #[must_use]
    pub fn display(&self, now: DateTime<Utc>) -> String {
        match (self.start, self.frozen_at) {
            (Some(start), Some(end)) => elapsed_since(start, end),
            (Some(start), None) => elapsed_since(start, now),
            (None, _) => ELAPSED_ZERO.to_string(),
        }
    }
}
