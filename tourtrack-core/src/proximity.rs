//! Waypoint arrival detection.
//!
//! Arrival is evaluated lazily on each position sample rather than through
//! continuous geofencing; tourists move slowly relative to the sampling
//! interval, so a sample-by-sample check is precise enough.
use smallvec::SmallVec;

use crate::geo::{Coordinate, haversine_m};
use crate::tour::TourKeyPoint;

/// Key points reached by one position sample. Usually zero or one.
pub type Reached<'a> = SmallVec<[&'a TourKeyPoint; 4]>;

/// Whether `position` is within `threshold_m` metres of `key_point`.
#[must_use]
pub fn reached(position: Coordinate, key_point: &TourKeyPoint, threshold_m: f64) -> bool {
    haversine_m(position, key_point.coordinate()) <= threshold_m
}

/// Stateless evaluator holding the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityEvaluator {
    threshold_m: f64,
}

impl ProximityEvaluator {
    #[must_use]
    pub const fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    #[must_use]
    pub const fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    #[must_use]
    pub fn is_reached(&self, position: Coordinate, key_point: &TourKeyPoint) -> bool {
        reached(position, key_point, self.threshold_m)
    }

    /// Every candidate within threshold, preserving candidate order.
    ///
    /// Callers pass candidates in tour ordinal order so simultaneous arrivals
    /// resolve by visiting order.
    pub fn reached_among<'a, I>(&self, position: Coordinate, candidates: I) -> Reached<'a>
    where
        I: IntoIterator<Item = &'a TourKeyPoint>,
    {
        candidates
            .into_iter()
            .filter(|kp| self.is_reached(position, kp))
            .collect()
    }
}
