//! Geographic primitives shared by the proximity evaluator, the movement
//! simulator and the route providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::EARTH_RADIUS_M;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in metres (haversine).
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        haversine_m(self, other)
    }

    /// Point at `fraction` of the way along the great circle towards `other`.
    ///
    /// `fraction` is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn interpolate(self, other: Self, fraction: f64) -> Self {
        let f = fraction.clamp(0.0, 1.0);
        if f <= 0.0 {
            return self;
        }
        if f >= 1.0 {
            return other;
        }
        let delta = haversine_m(self, other) / EARTH_RADIUS_M;
        if delta <= f64::EPSILON {
            return self;
        }

        let (lat1, lon1) = (self.latitude.to_radians(), self.longitude.to_radians());
        let (lat2, lon2) = (other.latitude.to_radians(), other.longitude.to_radians());
        let a = ((1.0 - f) * delta).sin() / delta.sin();
        let b = (f * delta).sin() / delta.sin();

        let x = a * lat1.cos() * lon1.cos() + b * lat2.cos() * lon2.cos();
        let y = a * lat1.cos() * lon1.sin() + b * lat2.cos() * lon2.sin();
        let z = a * lat1.sin() + b * lat2.sin();

        Self {
            latitude: z.atan2(x.hypot(y)).to_degrees(),
            longitude: y.atan2(x).to_degrees(),
        }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Errors raised when parsing a `lat,lon` pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinateParseError {
    #[error("expected `lat,lon`, got `{0}`")]
    Shape(String),
    #[error("invalid number `{0}`")]
    Number(String),
    #[error("coordinate out of range: `{0}`")]
    Range(String),
}

impl FromStr for Coordinate {
    type Err = CoordinateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((lat, lon)) = s.split_once(',') else {
            return Err(CoordinateParseError::Shape(s.to_string()));
        };
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| CoordinateParseError::Number(part.trim().to_string()))
        };
        let coordinate = Self::new(parse(lat)?, parse(lon)?);
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(CoordinateParseError::Range(s.to_string()))
        }
    }
}

/// Haversine great-circle distance in metres.
#[must_use]
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Ordered sequence of coordinates approximating a travel path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline(Vec<Coordinate>);

impl Polyline {
    #[must_use]
    pub const fn new(points: Vec<Coordinate>) -> Self {
        Self(points)
    }

    #[must_use]
    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<Coordinate> {
        self.0.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<Coordinate> {
        self.0.last().copied()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Coordinate> {
        self.0.get(index).copied()
    }

    /// Total path length in metres.
    #[must_use]
    pub fn length_m(&self) -> f64 {
        self.0.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
    }
}

impl From<Vec<Coordinate>> for Polyline {
    fn from(points: Vec<Coordinate>) -> Self {
        Self(points)
    }
}

impl FromIterator<Coordinate> for Polyline {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
