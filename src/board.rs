//! Bus arrival board: nearby stops ranked by distance and the text rows
//! shown for a stop's live arrivals.

use anyhow::Result;
use chrono::{DateTime, TimeZone};
use tracing::{info, instrument};

use crate::format::format_arrival;
use crate::proximity::{GeoPoint, Ranked, resolve};
use crate::services::transit_api::{ArrivalRecord, BusStop, TransitApi, stop_entities};

/// All stops ranked by distance from `at`.
#[instrument(skip(api))]
pub async fn ranked_stops<T>(api: &T, at: GeoPoint) -> Result<Vec<Ranked<BusStop>>>
where
    T: TransitApi + ?Sized,
{
    let stops = api.list_stops().await?;
    let ranked = resolve(at, stop_entities(stops));
    if let Some(closest) = ranked.first() {
        info!(
            stop_code = %closest.entity.id,
            distance_m = closest.distance_m.round(),
            "Closest stop"
        );
    }
    Ok(ranked)
}

/// `Hotel Grand Pacific (01012) 140 m`
pub fn stop_heading(stop: &Ranked<BusStop>) -> String {
    format!(
        "{} ({}) {}",
        stop.entity.payload.description,
        stop.entity.id,
        format_distance(stop.distance_m)
    )
}

pub fn format_distance(distance_m: f64) -> String {
    if distance_m < 1000.0 {
        format!("{} m", distance_m.round())
    } else {
        format!("{:.1} km", distance_m / 1000.0)
    }
}

/// One row per service: the service number followed by its three estimates.
pub fn arrival_rows<Tz: TimeZone>(record: &ArrivalRecord, now: &DateTime<Tz>) -> Vec<String> {
    if record.is_empty() {
        return vec!["No buses available at this time.".to_string()];
    }

    record
        .services
        .iter()
        .map(|service| {
            let times: Vec<String> = service
                .estimates
                .iter()
                .map(|e| format_arrival(now.clone(), *e))
                .collect();
            format!(
                "{:<5} {:>9} {:>9} {:>9}",
                service.service_no, times[0], times[1], times[2]
            )
        })
        .collect()
}
