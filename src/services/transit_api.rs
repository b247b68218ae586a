//! Trait and types for a public-transport open-data provider.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use crate::proximity::{Entity, GeoPoint};

/// A bus stop as listed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct BusStop {
    pub code: String,
    pub road_name: String,
    pub description: String,
    pub location: GeoPoint,
}

/// Up to three upcoming arrivals for one bus service at one stop.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceArrivals {
    pub service_no: String,
    pub operator: String,
    /// Next, second and third bus. `None` where the provider has no estimate.
    pub estimates: [Option<DateTime<FixedOffset>>; 3],
}

/// Live arrival data for a single stop, replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalRecord {
    pub stop_code: String,
    pub services: Vec<ServiceArrivals>,
    pub fetched_at: DateTime<Utc>,
}

impl ArrivalRecord {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Abstraction over the transit data provider (e.g. LTA DataMall).
#[async_trait::async_trait]
pub trait TransitApi: Send + Sync {
    /// Every bus stop, across all result pages.
    async fn list_stops(&self) -> Result<Vec<BusStop>>;

    /// Current arrival estimates at `stop_code`.
    async fn get_arrivals(&self, stop_code: &str) -> Result<ArrivalRecord>;

    /// Positions of every currently available taxi.
    async fn taxi_availability(&self) -> Result<Vec<GeoPoint>>;
}

/// Turns provider stops into rankable entities keyed by stop code.
///
/// Stop codes must be unique within a collection; later duplicates are
/// dropped.
pub fn stop_entities(stops: Vec<BusStop>) -> Vec<Entity<BusStop>> {
    let mut seen = HashSet::new();
    stops
        .into_iter()
        .filter_map(|stop| {
            if !seen.insert(stop.code.clone()) {
                warn!(stop_code = %stop.code, "Duplicate bus stop code, dropping");
                return None;
            }
            Some(Entity::new(stop.code.clone(), stop.location, stop))
        })
        .collect()
}
