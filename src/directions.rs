//! Journey planning on top of a [`DirectionsApi`].

use std::collections::HashMap;

use anyhow::Result;
use tracing::{instrument, warn};

use crate::error::CompanionError;
use crate::proximity::GeoPoint;
use crate::services::directions_api::{DirectionsApi, Place, Route, Step, StepKind, TravelMode};

/// Inputs this short are not worth a request.
const MIN_AUTOCOMPLETE_CHARS: usize = 3;

/// Place suggestions for a partially typed location.
pub async fn suggest<D>(api: &D, input: &str) -> Result<Vec<Place>>
where
    D: DirectionsApi + ?Sized,
{
    if input.trim().chars().count() < MIN_AUTOCOMPLETE_CHARS {
        return Ok(Vec::new());
    }
    api.autocomplete(input.trim()).await
}

/// The provider's preferred route.
///
/// # Errors
///
/// [`CompanionError::NoCandidates`] when no route exists.
#[instrument(skip(api))]
pub async fn plan<D>(api: &D, origin: &str, destination: &str, mode: TravelMode) -> Result<Route>
where
    D: DirectionsApi + ?Sized,
{
    let routes = api.get_directions(origin, destination, mode).await?;
    routes
        .into_iter()
        .next()
        .ok_or_else(|| CompanionError::NoCandidates.into())
}

/// Address for `point`, or its coordinates when it cannot be resolved.
pub async fn address_or_coordinates<D>(api: &D, point: GeoPoint) -> String
where
    D: DirectionsApi + ?Sized,
{
    match api.reverse_geocode(point).await {
        Ok(Some(address)) => address,
        Ok(None) => point.to_string(),
        Err(e) => {
            warn!(error = %e, %point, "Reverse geocode failed");
            point.to_string()
        }
    }
}

/// Renders the first leg of `route` as instruction lines, one block per step.
///
/// Walking steps name the address they end at; each distinct end point is
/// reverse geocoded once.
pub async fn describe_route<D>(api: &D, route: &Route) -> Vec<Vec<String>>
where
    D: DirectionsApi + ?Sized,
{
    let Some(leg) = route.legs.first() else {
        return Vec::new();
    };

    let mut addresses: HashMap<String, String> = HashMap::new();
    let mut blocks = Vec::with_capacity(leg.steps.len());

    for step in &leg.steps {
        if step.kind == StepKind::Walking {
            let key = step.end_location.to_string();
            if !addresses.contains_key(&key) {
                let address = address_or_coordinates(api, step.end_location).await;
                addresses.insert(key.clone(), address);
            }
            blocks.push(vec![format!(
                "Walk {} towards {}",
                step.distance_text, addresses[&key]
            )]);
        } else {
            blocks.push(describe_step(step));
        }
    }

    blocks
}

fn describe_step(step: &Step) -> Vec<String> {
    match &step.kind {
        StepKind::Transit(t) => vec![
            format!("Take {} {} ({})", t.vehicle_name, t.line_short_name, t.line_name),
            format!("Board at: {} at {}", t.departure_stop, t.departure_time),
            format!("Alight at: {} at {}", t.arrival_stop, t.arrival_time),
            format!("Number of Stops: {}", t.num_stops),
            format!("Estimated Duration: {}", step.duration_text),
        ],
        StepKind::Walking => vec![format!("Walk {}", step.distance_text)],
        StepKind::Other(mode) => vec![format!(
            "{} {} ({})",
            mode.to_lowercase(),
            step.distance_text,
            step.duration_text
        )],
    }
}
