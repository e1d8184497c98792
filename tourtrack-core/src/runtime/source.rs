//! Where positions come from.
//!
//! A [`PositionSource`] is chosen by the caller when a session starts:
//! a [`SensorSource`] wrapping a device sensor, or a [`SimulatedSource`]
//! fed by the movement simulation driver. The engine never branches on which.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Unavailable;
use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Sensor,
    Simulated,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sensor => "sensor",
            Self::Simulated => "simulated",
        })
    }
}

/// Device-level position sensor (real GPS, a test double, a manual pin).
#[async_trait]
pub trait PositionSensor: Send + Sync {
    /// Latest fix from the device.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when permission is missing or no fix exists yet.
    async fn current_position(&self) -> Result<Coordinate, Unavailable>;
}

/// Capability the polling scheduler samples on every tick.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Most recent position, most-recent-wins.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when the source has nothing to offer this tick.
    async fn current_position(&self) -> Result<Coordinate, Unavailable>;

    fn kind(&self) -> SourceKind;
}

pub struct SensorSource {
    sensor: Arc<dyn PositionSensor>,
}

impl SensorSource {
    #[must_use]
    pub fn new(sensor: Arc<dyn PositionSensor>) -> Self {
        Self { sensor }
    }
}

#[async_trait]
impl PositionSource for SensorSource {
    async fn current_position(&self) -> Result<Coordinate, Unavailable> {
        let position = self.sensor.current_position().await?;
        if position.is_valid() {
            Ok(position)
        } else {
            Err(Unavailable::new(format!("sensor reported invalid fix {position}")))
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Sensor
    }
}

/// Reads the latest position published by the simulation driver.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    latest: watch::Receiver<Option<Coordinate>>,
}

impl SimulatedSource {
    #[must_use]
    pub const fn new(latest: watch::Receiver<Option<Coordinate>>) -> Self {
        Self { latest }
    }

    /// A source pinned to one coordinate, used when no route could be resolved.
    #[must_use]
    pub fn fixed(position: Coordinate) -> Self {
        let (_tx, rx) = watch::channel(Some(position));
        Self { latest: rx }
    }
}

#[async_trait]
impl PositionSource for SimulatedSource {
    async fn current_position(&self) -> Result<Coordinate, Unavailable> {
        (*self.latest.borrow()).ok_or_else(|| Unavailable::new("simulation has not started"))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }
}

/// Position pinned by hand, e.g. by clicking a map.
/// Unavailable until the first pin is set.
#[derive(Debug, Clone)]
pub struct ManualSensor {
    position: Arc<watch::Sender<Option<Coordinate>>>,
}

impl Default for ManualSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSensor {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            position: Arc::new(tx),
        }
    }

    pub fn set_position(&self, position: Coordinate) {
        self.position.send_replace(Some(position));
    }

    pub fn clear(&self) {
        self.position.send_replace(None);
    }

    #[must_use]
    pub fn position(&self) -> Option<Coordinate> {
        *self.position.borrow()
    }
}

#[async_trait]
impl PositionSensor for ManualSensor {
    async fn current_position(&self) -> Result<Coordinate, Unavailable> {
        self.position()
            .ok_or_else(|| Unavailable::new("no position has been set"))
    }
}
