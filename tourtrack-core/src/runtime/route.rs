use async_trait::async_trait;

use crate::constants::ROUTE_MAX_VERTICES_PER_LEG;
use crate::error::RouteError;
use crate::geo::{Coordinate, Polyline};

/// External routing service: ordered waypoints in, ordered polyline out.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Resolve a travel path visiting `waypoints` in order.
    ///
    /// # Errors
    ///
    /// Returns a `RouteError` when no path can be produced.
    async fn resolve_route(&self, waypoints: &[Coordinate]) -> Result<Polyline, RouteError>;
}

/// Offline provider that walks great-circle segments between waypoints,
/// placing a vertex roughly every `step_m` metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightLineRouteProvider {
    step_m: f64,
}

impl StraightLineRouteProvider {
    #[must_use]
    pub const fn new(step_m: f64) -> Self {
        Self { step_m }
    }

    #[must_use]
    pub fn interpolate(&self, waypoints: &[Coordinate]) -> Polyline {
        let mut points = Vec::new();
        for leg in waypoints.windows(2) {
            let (from, to) = (leg[0], leg[1]);
            let steps = leg_steps(from.distance_to(to), self.step_m);
            #[allow(clippy::cast_precision_loss)]
            points.extend((0..steps).map(|i| from.interpolate(to, i as f64 / steps as f64)));
        }
        if let Some(&last) = waypoints.last() {
            points.push(last);
        }
        points.into()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn leg_steps(distance_m: f64, step_m: f64) -> usize {
    let steps = (distance_m / step_m).ceil();
    if steps.is_finite() && steps >= 1.0 {
        (steps as usize).min(ROUTE_MAX_VERTICES_PER_LEG)
    } else {
        1
    }
}

#[async_trait]
impl RouteProvider for StraightLineRouteProvider {
    async fn resolve_route(&self, waypoints: &[Coordinate]) -> Result<Polyline, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::TooFewWaypoints(waypoints.len()));
        }
        if let Some(bad) = waypoints.iter().find(|wp| !wp.is_valid()) {
            return Err(RouteError::Provider(format!("invalid waypoint {bad}")));
        }
        Ok(self.interpolate(waypoints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn polyline_spacing_respects_step() {
        let provider = StraightLineRouteProvider::new(25.0);
        let a = Coordinate::new(44.80, 20.40);
        let b = Coordinate::new(44.801, 20.40);
        let line = provider.resolve_route(&[a, b]).await.unwrap();

        // ~111 m leg at 25 m steps: 5 segments, 6 vertices.
        assert_eq!(line.len(), 6);
        assert_eq!(line.first(), Some(a));
        assert_eq!(line.last(), Some(b));
        for pair in line.points().windows(2) {
            assert!(pair[0].distance_to(pair[1]) <= 25.0 + 1e-6);
        }
    }

    #[tokio::test]
    async fn multi_leg_route_visits_every_waypoint() {
        let provider = StraightLineRouteProvider::new(50.0);
        let stops = [
            Coordinate::new(44.80, 20.40),
            Coordinate::new(44.80, 20.401),
            Coordinate::new(44.801, 20.401),
        ];
        let line = provider.resolve_route(&stops).await.unwrap();
        for stop in stops {
            assert!(line.points().iter().any(|p| p.distance_to(stop) < 0.01));
        }
    }

    #[tokio::test]
    async fn degenerate_inputs_are_rejected() {
        let provider = StraightLineRouteProvider::new(25.0);
        assert_eq!(
            provider.resolve_route(&[Coordinate::new(1.0, 1.0)]).await,
            Err(RouteError::TooFewWaypoints(1))
        );
        assert!(matches!(
            provider
                .resolve_route(&[Coordinate::new(1.0, 1.0), Coordinate::new(200.0, 1.0)])
                .await,
            Err(RouteError::Provider(_))
        ));
    }

    #[test]
    fn coincident_waypoints_yield_single_step() {
        assert_eq!(leg_steps(0.0, 25.0), 1);
        assert_eq!(leg_steps(f64::NAN, 25.0), 1);
        assert_eq!(leg_steps(1e12, 1.0), ROUTE_MAX_VERTICES_PER_LEG);
    }
}
