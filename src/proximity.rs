//! Distance ranking of geotagged entities around a reference point.
//!
//! Uses the Haversine formula (mean Earth radius) from the `geo` crate.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::error::CompanionError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in metres.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        Point::from(*self).haversine_distance(&Point::from(*other))
    }
}

impl From<GeoPoint> for Point {
    fn from(p: GeoPoint) -> Self {
        // geo points are (x = longitude, y = latitude)
        Point::new(p.longitude, p.latitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// A geotagged record subject to proximity ranking (a bus stop, a forecast
/// area, a taxi).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<P> {
    pub id: String,
    pub location: GeoPoint,
    pub payload: P,
}

impl<P> Entity<P> {
    pub fn new(id: impl Into<String>, location: GeoPoint, payload: P) -> Self {
        Self {
            id: id.into(),
            location,
            payload,
        }
    }
}

/// An entity annotated with its distance from the reference point of the
/// resolve call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<P> {
    pub entity: Entity<P>,
    pub distance_m: f64,
}

/// Orders `entities` by ascending distance from `reference`.
///
/// The sort is stable, so entities at equal distance keep their input order.
pub fn resolve<P>(reference: GeoPoint, entities: Vec<Entity<P>>) -> Vec<Ranked<P>> {
    let mut ranked: Vec<Ranked<P>> = entities
        .into_iter()
        .map(|entity| Ranked {
            distance_m: reference.distance_to(&entity.location),
            entity,
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    ranked
}

/// Returns the single entity closest to `reference`.
///
/// # Errors
///
/// [`CompanionError::NoCandidates`] if `entities` is empty.
pub fn nearest<P>(
    reference: GeoPoint,
    entities: Vec<Entity<P>>,
) -> Result<Ranked<P>, CompanionError> {
    let mut best: Option<Ranked<P>> = None;

    for entity in entities {
        let distance_m = reference.distance_to(&entity.location);
        let closer = best.as_ref().is_none_or(|b| distance_m < b.distance_m);
        if closer {
            best = Some(Ranked { entity, distance_m });
        }
    }

    best.ok_or(CompanionError::NoCandidates)
}

/// Like [`resolve`], keeping only entities within `radius_m` metres.
pub fn within<P>(reference: GeoPoint, entities: Vec<Entity<P>>, radius_m: f64) -> Vec<Ranked<P>> {
    resolve(reference, entities)
        .into_iter()
        .take_while(|r| r.distance_m <= radius_m)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, lat: f64, lon: f64) -> Entity<()> {
        Entity::new(id, GeoPoint::new(lat, lon), ())
    }

    #[test]
    fn test_resolve_orders_by_distance() {
        let reference = GeoPoint::new(1.3000, 103.8000);
        let ranked = resolve(
            reference,
            vec![entity("B", 1.3500, 103.9000), entity("A", 1.3001, 103.8001)],
        );

        let ids: Vec<_> = ranked.iter().map(|r| r.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);

        // A is a few metres away, B several kilometres
        assert!(ranked[0].distance_m > 5.0 && ranked[0].distance_m < 25.0);
        assert!(ranked[1].distance_m > 5_000.0 && ranked[1].distance_m < 15_000.0);
    }

    #[test]
    fn test_resolve_sorted_and_non_negative() {
        let reference = GeoPoint::new(1.35, 103.82);
        let entities = vec![
            entity("1", 1.29, 103.85),
            entity("2", 1.44, 103.78),
            entity("3", 1.35, 103.82),
            entity("4", 1.37, 103.95),
            entity("5", 1.31, 103.70),
        ];

        let ranked = resolve(reference, entities);
        assert_eq!(ranked.len(), 5);
        assert!(ranked.iter().all(|r| r.distance_m >= 0.0));
        assert!(ranked.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
        assert_eq!(ranked[0].entity.id, "3");
    }

    #[test]
    fn test_resolve_ties_keep_input_order() {
        let reference = GeoPoint::new(1.3, 103.8);
        let ranked = resolve(
            reference,
            vec![
                entity("first", 1.31, 103.8),
                entity("second", 1.31, 103.8),
                entity("third", 1.31, 103.8),
            ],
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_resolve_empty() {
        let ranked = resolve::<()>(GeoPoint::new(1.3, 103.8), vec![]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_nearest_empty_is_no_candidates() {
        let result = nearest::<()>(GeoPoint::new(1.3, 103.8), vec![]);
        assert!(matches!(result, Err(CompanionError::NoCandidates)));
    }

    #[test]
    fn test_nearest_picks_closest() {
        let reference = GeoPoint::new(1.3521, 103.8198);
        let best = nearest(
            reference,
            vec![
                entity("Changi", 1.3644, 103.9915),
                entity("Bishan", 1.3508, 103.8390),
                entity("Jurong West", 1.3404, 103.7090),
            ],
        )
        .unwrap();
        assert_eq!(best.entity.id, "Bishan");
    }

    #[test]
    fn test_within_radius() {
        let reference = GeoPoint::new(1.3000, 103.8000);
        let nearby = within(
            reference,
            vec![entity("far", 1.3500, 103.9000), entity("near", 1.3001, 103.8001)],
            500.0,
        );
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].entity.id, "near");
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = GeoPoint::new(1.29, 103.85);
        assert_eq!(p.distance_to(&p), 0.0);
    }
}
