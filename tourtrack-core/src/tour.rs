//! Read-only tour and key point model supplied by the tour catalog.
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, Polyline};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

pub(crate) use string_id;

string_id!(
    /// Identifier of a tour in the catalog.
    TourId
);
string_id!(
    /// Identifier of a tourist.
    UserId
);
string_id!(
    /// Identifier of a key point, unique within its tour.
    KeyPointId
);

/// A fixed geographic checkpoint belonging to a tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourKeyPoint {
    pub id: KeyPointId,
    /// Position of the key point in the tour's visiting order.
    pub ordinal: u32,
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl TourKeyPoint {
    #[must_use]
    pub fn new(id: impl Into<KeyPointId>, ordinal: u32, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            ordinal,
            name: String::new(),
            latitude,
            longitude,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Name for log output, falling back to the id.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

/// A tour as seen by the tracking engine: an id and its ordered key points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: TourId,
    #[serde(default)]
    pub name: String,
    #[serde(
        rename = "keyPoints",
        alias = "key_points",
        default,
        deserialize_with = "ordered_key_points"
    )]
    key_points: Vec<TourKeyPoint>,
}

fn ordered_key_points<'de, D>(deserializer: D) -> Result<Vec<TourKeyPoint>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut key_points = Vec::<TourKeyPoint>::deserialize(deserializer)?;
    key_points.sort_by_key(|kp| kp.ordinal);
    Ok(key_points)
}

impl Tour {
    /// Build a tour, ordering key points by ordinal.
    #[must_use]
    pub fn new(id: impl Into<TourId>, key_points: Vec<TourKeyPoint>) -> Self {
        let mut key_points = key_points;
        key_points.sort_by_key(|kp| kp.ordinal);
        Self {
            id: id.into(),
            name: String::new(),
            key_points,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parse a tour from JSON, ordering key points by ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a tour.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Key points in visiting order.
    #[must_use]
    pub fn key_points(&self) -> &[TourKeyPoint] {
        &self.key_points
    }

    #[must_use]
    pub fn key_point(&self, id: &KeyPointId) -> Option<&TourKeyPoint> {
        self.key_points.iter().find(|kp| &kp.id == id)
    }

    #[must_use]
    pub fn first_key_point(&self) -> Option<&TourKeyPoint> {
        self.key_points.first()
    }

    #[must_use]
    pub fn waypoints(&self) -> Vec<Coordinate> {
        self.key_points.iter().map(TourKeyPoint::coordinate).collect()
    }

    /// Key points joined by straight segments, for static display when no
    /// routed polyline is available.
    #[must_use]
    pub fn waypoint_polyline(&self) -> Polyline {
        self.waypoints().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tour_orders_key_points_by_ordinal() {
        let tour = Tour::new(
            "t-1",
            vec![
                TourKeyPoint::new("b", 2, 44.81, 20.46),
                TourKeyPoint::new("a", 1, 44.80, 20.40),
            ],
        );
        let ids: Vec<&str> = tour.key_points().iter().map(|kp| kp.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(tour.first_key_point().map(|kp| kp.id.as_str()), Some("a"));
        assert_eq!(tour.waypoint_polyline().len(), 2);
    }

    #[test]
    fn tour_parses_catalog_json() {
        let json = r#"{
            "id": "kalemegdan",
            "name": "Fortress walk",
            "keyPoints": [
                {"id": "gate", "ordinal": 2, "name": "Stambol gate", "latitude": 44.8215, "longitude": 20.4532},
                {"id": "square", "ordinal": 1, "latitude": 44.8163, "longitude": 20.4602}
            ]
        }"#;
        let tour = Tour::from_json(json).unwrap();
        assert_eq!(tour.id, TourId::from("kalemegdan"));
        assert_eq!(tour.key_points()[0].label(), "square");
        assert_eq!(tour.key_points()[1].label(), "Stambol gate");
        assert!(tour.key_point(&KeyPointId::from("gate")).is_some());
    }
}
