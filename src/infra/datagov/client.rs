use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::WeatherConfig;
use crate::fetch::{HttpClient, endpoint, fetch_json};
use crate::proximity::GeoPoint;
use crate::services::weather_api::{ForecastArea, TemperatureReading, WeatherApi};

#[derive(Debug, Deserialize)]
struct LabelLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct Reading {
    station_id: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct TemperatureItem {
    #[serde(default)]
    readings: Vec<Reading>,
}

/// Body of `environment/air-temperature`.
#[derive(Debug, Deserialize)]
pub struct TemperatureResponse {
    #[serde(default)]
    items: Vec<TemperatureItem>,
}

impl TemperatureResponse {
    /// Readings of the latest item; the endpoint returns the newest first.
    pub fn into_readings(self) -> Result<Vec<TemperatureReading>> {
        let item = self
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("temperature response has no items"))?;

        Ok(item
            .readings
            .into_iter()
            .map(|r| TemperatureReading {
                station_id: r.station_id,
                value: r.value,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct AreaMetadata {
    name: String,
    label_location: LabelLocation,
}

#[derive(Debug, Deserialize)]
struct AreaForecast {
    area: String,
    forecast: String,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    #[serde(default)]
    forecasts: Vec<AreaForecast>,
}

/// Body of `environment/2-hour-weather-forecast`.
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    area_metadata: Vec<AreaMetadata>,
    #[serde(default)]
    items: Vec<ForecastItem>,
}

impl ForecastResponse {
    /// Joins each forecast to its area's label location by area name.
    /// Forecasts for areas without metadata are skipped.
    pub fn into_areas(self) -> Result<Vec<ForecastArea>> {
        let locations: HashMap<String, GeoPoint> = self
            .area_metadata
            .into_iter()
            .map(|m| {
                let point = GeoPoint::new(m.label_location.latitude, m.label_location.longitude);
                (m.name, point)
            })
            .collect();

        let item = self
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("forecast response has no items"))?;

        Ok(item
            .forecasts
            .into_iter()
            .filter_map(|f| match locations.get(&f.area) {
                Some(location) => Some(ForecastArea {
                    location: *location,
                    area: f.area,
                    forecast: f.forecast,
                }),
                None => {
                    warn!(area = %f.area, "No metadata found for forecast area");
                    None
                }
            })
            .collect())
    }
}

pub struct DataGovClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> DataGovClient<C> {
    pub fn new(http: C, config: &WeatherConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> WeatherApi for DataGovClient<C> {
    async fn temperature_readings(&self) -> Result<Vec<TemperatureReading>> {
        let url = endpoint(&self.base_url, "environment/air-temperature", &[])?;
        let response: TemperatureResponse = fetch_json(&self.http, url).await?;
        let readings = response.into_readings()?;
        debug!(count = readings.len(), "Temperature readings fetched");
        Ok(readings)
    }

    async fn forecast_areas(&self) -> Result<Vec<ForecastArea>> {
        let url = endpoint(&self.base_url, "environment/2-hour-weather-forecast", &[])?;
        let response: ForecastResponse = fetch_json(&self.http, url).await?;
        let areas = response.into_areas()?;
        debug!(count = areas.len(), "Forecast areas fetched");
        Ok(areas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_join_skips_unknown_areas() {
        let body = r#"{
            "area_metadata": [
                { "name": "Bishan", "label_location": { "latitude": 1.350772, "longitude": 103.839 } }
            ],
            "items": [{
                "forecasts": [
                    { "area": "Bishan", "forecast": "Partly Cloudy (Day)" },
                    { "area": "Atlantis", "forecast": "Fair" }
                ]
            }]
        }"#;
        let areas = serde_json::from_str::<ForecastResponse>(body)
            .unwrap()
            .into_areas()
            .unwrap();

        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].area, "Bishan");
        assert_eq!(areas[0].forecast, "Partly Cloudy (Day)");
        assert_eq!(areas[0].location, GeoPoint::new(1.350772, 103.839));
    }

    #[test]
    fn test_temperature_without_items_is_error() {
        let response: TemperatureResponse = serde_json::from_str(r#"{ "items": [] }"#).unwrap();
        assert!(response.into_readings().is_err());
    }

    #[test]
    fn test_temperature_uses_first_item() {
        let body = r#"{ "items": [
            { "readings": [ { "station_id": "S109", "value": 30.2 } ] },
            { "readings": [ { "station_id": "S109", "value": 10.0 } ] }
        ] }"#;
        let readings = serde_json::from_str::<TemperatureResponse>(body)
            .unwrap()
            .into_readings()
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 30.2);
    }
}
