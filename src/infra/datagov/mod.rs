//! data.gov.sg environment APIs: air temperature and 2-hour forecasts.

mod client;

pub use client::{DataGovClient, ForecastResponse, TemperatureResponse};
