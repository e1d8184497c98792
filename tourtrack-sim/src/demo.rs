use anyhow::{Context, Result, bail};
use tourtrack_core::{Coordinate, Tour};

const DEMO_TOUR: &str = include_str!("../data/demo_tour.json");

/// Degrees of latitude between the default origin and the first key point,
/// roughly 450 m.
const ORIGIN_OFFSET_DEG: f64 = 0.004;

pub fn demo_tour() -> Result<Tour> {
    Tour::from_json(DEMO_TOUR).context("embedded demo tour is malformed")
}

/// A starting point a short walk south of the tour's first key point.
pub fn default_origin(tour: &Tour) -> Coordinate {
    tour.first_key_point().map_or(Coordinate::new(0.0, 0.0), |kp| {
        Coordinate::new(kp.latitude - ORIGIN_OFFSET_DEG, kp.longitude)
    })
}

/// Parse `lat,lon;lat,lon;...`.
pub fn parse_positions(list: &str) -> Result<Vec<Coordinate>> {
    let positions = list
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<Coordinate>()
                .with_context(|| format!("invalid position `{part}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    if positions.is_empty() {
        bail!("--positions needs at least one `lat,lon` pair");
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_tour_is_ordered() {
        let tour = demo_tour().unwrap();
        let ids: Vec<&str> = tour.key_points().iter().map(|kp| kp.id.as_str()).collect();
        assert_eq!(ids, ["republic-square", "knez-mihailova", "kalemegdan"]);
    }

    #[test]
    fn default_origin_is_a_short_walk_away() {
        let tour = demo_tour().unwrap();
        let first = tour.first_key_point().unwrap().coordinate();
        let d = default_origin(&tour).distance_to(first);
        assert!((400.0..500.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn positions_parse_and_reject_garbage() {
        let parsed = parse_positions("44.8163,20.4602; -33.9,18.4;").unwrap();
        assert_eq!(
            parsed,
            [Coordinate::new(44.8163, 20.4602), Coordinate::new(-33.9, 18.4)]
        );
        assert!(parse_positions(";;").is_err());
        assert!(parse_positions("44.8;20.4").is_err());
    }
}
