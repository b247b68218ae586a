//! Home-screen weather summary: island-wide average temperature plus the
//! forecast of the area nearest to the user.

use chrono::{DateTime, TimeZone};
use tracing::{error, instrument, warn};

use crate::error::CompanionError;
use crate::proximity::{Entity, GeoPoint, nearest};
use crate::services::weather_api::{ForecastArea, TemperatureReading, WeatherApi};

/// Icon shown for forecasts not in the table.
pub const DEFAULT_ICON: &str = "cloud-outline";

/// Icon name for a 2-hour forecast description.
pub fn forecast_icon(forecast: &str) -> &'static str {
    match forecast {
        "Fair" | "Fair (Day)" | "Fair and Warm" => "sunny-outline",
        "Fair (Night)" => "moon-outline",
        "Partly Cloudy" | "Partly Cloudy (Day)" => "partly-sunny-outline",
        "Partly Cloudy (Night)" => "cloudy-night-outline",
        "Cloudy" | "Hazy" | "Slightly Hazy" => "cloud-outline",
        "Windy" => "wind-outline",
        "Mist" | "Fog" => "water-outline",
        "Light Rain" | "Moderate Rain" | "Passing Showers" | "Light Showers" | "Showers" => {
            "rainy-outline"
        }
        "Heavy Rain"
        | "Heavy Showers"
        | "Thundery Showers"
        | "Heavy Thundery Showers"
        | "Heavy Thundery Showers with Gusty Winds" => "thunderstorm-outline",
        _ => DEFAULT_ICON,
    }
}

/// Mean of all readings, rounded to one decimal place.
pub fn average_temperature(readings: &[TemperatureReading]) -> Result<f64, CompanionError> {
    if readings.is_empty() {
        return Err(CompanionError::NoCandidates);
    }
    let mean = readings.iter().map(|r| r.value).sum::<f64>() / readings.len() as f64;
    Ok((mean * 10.0).round() / 10.0)
}

/// e.g. `Monday, July 1`
pub fn format_date<Tz>(date: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    date.format("%A, %B %-d").to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearestForecast {
    pub area: String,
    pub forecast: String,
    pub icon: &'static str,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastState {
    Available(NearestForecast),
    /// The provider returned no usable forecast areas.
    NoData,
    /// The forecast could not be fetched.
    Unavailable,
}

impl ForecastState {
    pub fn describe(&self) -> String {
        match self {
            ForecastState::Available(f) => f.forecast.clone(),
            ForecastState::NoData => "No forecast data available".to_string(),
            ForecastState::Unavailable => "Error fetching forecast".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSummary {
    /// `None` when readings could not be fetched or there were none.
    pub temperature_c: Option<f64>,
    pub forecast: ForecastState,
}

/// Picks the forecast area closest to `at`.
pub fn nearest_forecast(
    at: GeoPoint,
    areas: Vec<ForecastArea>,
) -> Result<NearestForecast, CompanionError> {
    let entities = areas
        .into_iter()
        .map(|a| Entity::new(a.area.clone(), a.location, a))
        .collect();
    let best = nearest(at, entities)?;
    let area = best.entity.payload;

    Ok(NearestForecast {
        icon: forecast_icon(&area.forecast),
        area: area.area,
        forecast: area.forecast,
        distance_m: best.distance_m,
    })
}

/// Builds the summary. Failures degrade the affected part instead of
/// failing the whole summary.
#[instrument(skip(api))]
pub async fn summarize<W>(api: &W, at: GeoPoint) -> WeatherSummary
where
    W: WeatherApi + ?Sized,
{
    let temperature_c = match api.temperature_readings().await {
        Ok(readings) => match average_temperature(&readings) {
            Ok(t) => Some(t),
            Err(_) => {
                warn!("No temperature readings available");
                None
            }
        },
        Err(e) => {
            error!(error = %e, "Error fetching temperature");
            None
        }
    };

    let forecast = match api.forecast_areas().await {
        Ok(areas) => match nearest_forecast(at, areas) {
            Ok(f) => ForecastState::Available(f),
            Err(_) => {
                warn!("No locations found in forecast data");
                ForecastState::NoData
            }
        },
        Err(e) => {
            error!(error = %e, "Error fetching forecast");
            ForecastState::Unavailable
        }
    };

    WeatherSummary {
        temperature_c,
        forecast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Utc;

    fn reading(value: f64) -> TemperatureReading {
        TemperatureReading {
            station_id: "S109".to_string(),
            value,
        }
    }

    fn area(name: &str, lat: f64, lon: f64, forecast: &str) -> ForecastArea {
        ForecastArea {
            area: name.to_string(),
            location: GeoPoint::new(lat, lon),
            forecast: forecast.to_string(),
        }
    }

    #[test]
    fn test_average_temperature_rounds() {
        let avg = average_temperature(&[reading(30.1), reading(29.0), reading(28.0)]).unwrap();
        assert_eq!(avg, 29.0);
        let avg = average_temperature(&[reading(30.0), reading(30.3), reading(30.4)]).unwrap();
        assert_eq!(avg, 30.2);
    }

    #[test]
    fn test_average_temperature_empty() {
        assert!(matches!(
            average_temperature(&[]),
            Err(CompanionError::NoCandidates)
        ));
    }

    #[test]
    fn test_forecast_icon() {
        assert_eq!(forecast_icon("Fair (Night)"), "moon-outline");
        assert_eq!(forecast_icon("Thundery Showers"), "thunderstorm-outline");
        assert_eq!(forecast_icon("Sandstorm"), DEFAULT_ICON);
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        assert_eq!(format_date(&date), "Monday, July 1");
    }

    #[test]
    fn test_nearest_forecast() {
        let best = nearest_forecast(
            GeoPoint::new(1.35, 103.84),
            vec![
                area("Changi", 1.357, 103.987, "Fair"),
                area("Bishan", 1.350772, 103.839, "Light Rain"),
            ],
        )
        .unwrap();
        assert_eq!(best.area, "Bishan");
        assert_eq!(best.icon, "rainy-outline");
    }

    struct FakeWeather {
        readings: Option<Vec<TemperatureReading>>,
        areas: Option<Vec<ForecastArea>>,
    }

    #[async_trait::async_trait]
    impl WeatherApi for FakeWeather {
        async fn temperature_readings(&self) -> Result<Vec<TemperatureReading>> {
            self.readings
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection reset"))
        }

        async fn forecast_areas(&self) -> Result<Vec<ForecastArea>> {
            self.areas
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn test_summarize_degrades_per_part() {
        let api = FakeWeather {
            readings: None,
            areas: Some(vec![]),
        };
        let summary = summarize(&api, GeoPoint::new(1.35, 103.84)).await;
        assert_eq!(summary.temperature_c, None);
        assert_eq!(summary.forecast, ForecastState::NoData);
        assert_eq!(summary.forecast.describe(), "No forecast data available");
    }

    #[tokio::test]
    async fn test_summarize_available() {
        let api = FakeWeather {
            readings: Some(vec![reading(31.0), reading(30.0)]),
            areas: Some(vec![area("Bishan", 1.350772, 103.839, "Cloudy")]),
        };
        let summary = summarize(&api, GeoPoint::new(1.35, 103.84)).await;
        assert_eq!(summary.temperature_c, Some(30.5));
        assert_eq!(summary.forecast.describe(), "Cloudy");
    }
}
