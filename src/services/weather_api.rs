//! Trait and types for a weather open-data provider.

use anyhow::Result;

use crate::proximity::GeoPoint;

/// One station's latest air temperature in °C.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureReading {
    pub station_id: String,
    pub value: f64,
}

/// A named forecast area with its label location and short-range forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastArea {
    pub area: String,
    pub location: GeoPoint,
    pub forecast: String,
}

#[async_trait::async_trait]
pub trait WeatherApi: Send + Sync {
    /// Latest temperature reading from every reporting station.
    async fn temperature_readings(&self) -> Result<Vec<TemperatureReading>>;

    /// Current forecast for every area that has location metadata.
    async fn forecast_areas(&self) -> Result<Vec<ForecastArea>>;
}
