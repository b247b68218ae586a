//! Google Maps Platform: place autocomplete, directions, reverse geocoding.

mod client;

pub use client::{DirectionsResponse, GoogleMapsClient};
