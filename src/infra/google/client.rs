use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::GoogleConfig;
use crate::fetch::auth::UrlParam;
use crate::fetch::{HttpClient, endpoint, fetch_json};
use crate::proximity::GeoPoint;
use crate::services::directions_api::{
    DirectionsApi, Leg, Place, Route, Step, StepKind, TransitDetails, TravelMode,
};

/// Every Maps web service reports its outcome in a `status` field, even on
/// HTTP 200.
fn check_status(status: &str, error_message: Option<&str>) -> Result<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(anyhow!(
            "Maps API status {}: {}",
            other,
            error_message.unwrap_or("no details")
        )),
    }
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for GeoPoint {
    fn from(p: LatLng) -> Self {
        GeoPoint::new(p.lat, p.lng)
    }
}

#[derive(Debug, Default, Deserialize)]
struct TextValue {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    description: String,
    #[serde(default)]
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Default, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LineRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    vehicle: Named,
}

#[derive(Debug, Deserialize)]
struct TransitDetailsRow {
    line: LineRow,
    #[serde(default)]
    departure_stop: Named,
    #[serde(default)]
    arrival_stop: Named,
    #[serde(default)]
    departure_time: TextValue,
    #[serde(default)]
    arrival_time: TextValue,
    #[serde(default)]
    num_stops: u32,
}

#[derive(Debug, Deserialize)]
struct StepRow {
    travel_mode: String,
    #[serde(default)]
    distance: TextValue,
    #[serde(default)]
    duration: TextValue,
    start_location: LatLng,
    end_location: LatLng,
    #[serde(default)]
    html_instructions: String,
    transit_details: Option<TransitDetailsRow>,
}

impl From<StepRow> for Step {
    fn from(row: StepRow) -> Self {
        let kind = match (row.travel_mode.as_str(), row.transit_details) {
            ("WALKING", _) => StepKind::Walking,
            ("TRANSIT", Some(t)) => StepKind::Transit(TransitDetails {
                vehicle_name: t.line.vehicle.name,
                line_short_name: t.line.short_name,
                line_name: t.line.name,
                departure_stop: t.departure_stop.name,
                departure_time: t.departure_time.text,
                arrival_stop: t.arrival_stop.name,
                arrival_time: t.arrival_time.text,
                num_stops: t.num_stops,
            }),
            (other, _) => StepKind::Other(other.to_string()),
        };

        Step {
            kind,
            distance_text: row.distance.text,
            duration_text: row.duration.text,
            start_location: row.start_location.into(),
            end_location: row.end_location.into(),
            instructions: row.html_instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LegRow {
    #[serde(default)]
    start_address: String,
    #[serde(default)]
    end_address: String,
    #[serde(default)]
    distance: TextValue,
    #[serde(default)]
    duration: TextValue,
    #[serde(default)]
    steps: Vec<StepRow>,
}

#[derive(Debug, Deserialize)]
struct RouteRow {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    legs: Vec<LegRow>,
}

/// Body of `directions/json`.
#[derive(Debug, Deserialize)]
pub struct DirectionsResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteRow>,
}

impl DirectionsResponse {
    pub fn into_routes(self) -> Result<Vec<Route>> {
        check_status(&self.status, self.error_message.as_deref())?;

        Ok(self
            .routes
            .into_iter()
            .map(|r| Route {
                summary: r.summary,
                legs: r
                    .legs
                    .into_iter()
                    .map(|l| Leg {
                        start_address: l.start_address,
                        end_address: l.end_address,
                        distance_text: l.distance.text,
                        duration_text: l.duration.text,
                        steps: l.steps.into_iter().map(Step::from).collect(),
                    })
                    .collect(),
            })
            .collect())
    }
}

pub struct GoogleMapsClient<C> {
    http: UrlParam<C>,
    base_url: String,
    country: String,
    language: String,
}

impl<C: HttpClient> GoogleMapsClient<C> {
    /// Wraps `inner` so every request carries `key=<api_key>`.
    pub fn new(inner: C, config: &GoogleConfig, api_key: &str) -> Self {
        Self {
            http: UrlParam {
                inner,
                param_name: "key".to_string(),
                key: api_key.to_string(),
            },
            base_url: config.base_url.clone(),
            country: config.country.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> DirectionsApi for GoogleMapsClient<C> {
    async fn autocomplete(&self, input: &str) -> Result<Vec<Place>> {
        let components = format!("country:{}", self.country);
        let url = endpoint(
            &self.base_url,
            "place/autocomplete/json",
            &[
                ("input", input),
                ("language", self.language.as_str()),
                ("components", components.as_str()),
            ],
        )?;
        let response: AutocompleteResponse = fetch_json(&self.http, url).await?;
        check_status(&response.status, response.error_message.as_deref())?;

        debug!(count = response.predictions.len(), "Autocomplete predictions");
        Ok(response
            .predictions
            .into_iter()
            .map(|p| Place {
                place_id: p.place_id,
                description: p.description,
            })
            .collect())
    }

    async fn get_directions(
        &self,
        origin: &str,
        destination: &str,
        mode: TravelMode,
    ) -> Result<Vec<Route>> {
        let url = endpoint(
            &self.base_url,
            "directions/json",
            &[
                ("origin", origin),
                ("destination", destination),
                ("mode", mode.as_param()),
            ],
        )?;
        let response: DirectionsResponse = fetch_json(&self.http, url).await?;
        response.into_routes()
    }

    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>> {
        let latlng = format!("{},{}", point.latitude, point.longitude);
        let url = endpoint(&self.base_url, "geocode/json", &[("latlng", latlng.as_str())])?;
        let response: GeocodeResponse = fetch_json(&self.http, url).await?;
        check_status(&response.status, response.error_message.as_deref())?;

        Ok(response
            .results
            .into_iter()
            .next()
            .map(|r| r.formatted_address))
    }
}
