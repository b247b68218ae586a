//! Runtime configuration.
//!
//! Defaults cover every field. An optional JSON file overrides them, and
//! environment variables (after `.env` is loaded) override the file:
//!
//! | Variable                 | Field                          |
//! |--------------------------|--------------------------------|
//! | `DATAMALL_ACCOUNT_KEY`   | `datamall.account_key`         |
//! | `GOOGLE_MAPS_API_KEY`    | `google.api_key`               |
//! | `REFRESH_INTERVAL_SECS`  | `refresh.interval_secs`        |
//! | `CURRENT_LAT`            | `location.latitude`            |
//! | `CURRENT_LON`            | `location.longitude`           |
//! | `LOCATION_PERMISSION`    | `location.permission_granted`  |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::CompanionError;
use crate::proximity::GeoPoint;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub datamall: DataMallConfig,
    pub weather: WeatherConfig,
    pub google: GoogleConfig,
    pub refresh: RefreshConfig,
    pub location: LocationConfig,
    pub http: HttpConfig,
}

/// LTA DataMall (bus stops, bus arrivals, taxi availability).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataMallConfig {
    pub base_url: String,
    pub account_key: Option<String>,
    pub arrivals_path: String,
    /// Fixed by the provider; a page shorter than this is the last one.
    pub page_size: usize,
}

impl Default for DataMallConfig {
    fn default() -> Self {
        Self {
            base_url: "https://datamall2.mytransport.sg/ltaodataservice".to_string(),
            account_key: None,
            arrivals_path: "BusArrivalv2".to_string(),
            page_size: 500,
        }
    }
}

/// data.gov.sg environment endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.data.gov.sg/v1".to_string(),
        }
    }
}

/// Google Maps Platform (places, directions, geocoding).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// ISO 3166 country code autocomplete results are restricted to.
    pub country: String,
    pub language: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api".to_string(),
            api_key: None,
            country: "SG".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Stand-in for the device location service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub permission_granted: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            permission_granted: true,
        }
    }
}

impl LocationConfig {
    pub fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Probed once at startup to decide whether the network is usable.
    pub connectivity_probe_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connectivity_probe_url: "https://api.data.gov.sg".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Defaults, or the file at `path` if given, with process environment
    /// overrides applied.
    pub fn from_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DATAMALL_ACCOUNT_KEY") {
            self.datamall.account_key = Some(key);
        }
        if let Some(key) = lookup("GOOGLE_MAPS_API_KEY") {
            self.google.api_key = Some(key);
        }
        if let Some(secs) = lookup("REFRESH_INTERVAL_SECS") {
            self.refresh.interval_secs = parse_var("REFRESH_INTERVAL_SECS", &secs)?;
        }
        if let Some(lat) = lookup("CURRENT_LAT") {
            self.location.latitude = Some(parse_var("CURRENT_LAT", &lat)?);
        }
        if let Some(lon) = lookup("CURRENT_LON") {
            self.location.longitude = Some(parse_var("CURRENT_LON", &lon)?);
        }
        if let Some(granted) = lookup("LOCATION_PERMISSION") {
            self.location.permission_granted = !matches!(
                granted.to_ascii_lowercase().as_str(),
                "denied" | "false" | "0" | "no"
            );
        }
        Ok(())
    }

    pub fn datamall_key(&self) -> Result<&str, CompanionError> {
        self.datamall
            .account_key
            .as_deref()
            .ok_or_else(|| CompanionError::Config("DATAMALL_ACCOUNT_KEY must be set".into()))
    }

    pub fn google_key(&self) -> Result<&str, CompanionError> {
        self.google
            .api_key
            .as_deref()
            .ok_or_else(|| CompanionError::Config("GOOGLE_MAPS_API_KEY must be set".into()))
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, CompanionError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CompanionError::Config(format!("{name}={value:?}: {e}")))
}
