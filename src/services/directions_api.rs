//! Trait and types for a geocoding and directions provider.

use anyhow::Result;

use crate::proximity::GeoPoint;

/// An autocomplete candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub place_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TravelMode {
    #[default]
    Transit,
    Walking,
    Driving,
    Bicycling,
}

impl TravelMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            TravelMode::Transit => "transit",
            TravelMode::Walking => "walking",
            TravelMode::Driving => "driving",
            TravelMode::Bicycling => "bicycling",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitDetails {
    pub vehicle_name: String,
    pub line_short_name: String,
    pub line_name: String,
    pub departure_stop: String,
    pub departure_time: String,
    pub arrival_stop: String,
    pub arrival_time: String,
    pub num_stops: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Walking,
    Transit(TransitDetails),
    /// Any other travel mode the provider reports, by its raw name.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub distance_text: String,
    pub duration_text: String,
    pub start_location: GeoPoint,
    pub end_location: GeoPoint,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub start_address: String,
    pub end_address: String,
    pub distance_text: String,
    pub duration_text: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub summary: String,
    pub legs: Vec<Leg>,
}

#[async_trait::async_trait]
pub trait DirectionsApi: Send + Sync {
    async fn autocomplete(&self, input: &str) -> Result<Vec<Place>>;

    /// Routes from `origin` to `destination`, best first. May be empty.
    async fn get_directions(
        &self,
        origin: &str,
        destination: &str,
        mode: TravelMode,
    ) -> Result<Vec<Route>>;

    /// The best formatted address for `point`, if the provider knows one.
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>>;
}
