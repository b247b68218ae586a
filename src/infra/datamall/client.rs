use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::DataMallConfig;
use crate::fetch::auth::ApiKey;
use crate::fetch::{HttpClient, endpoint, fetch_json};
use crate::proximity::GeoPoint;
use crate::services::transit_api::{ArrivalRecord, BusStop, ServiceArrivals, TransitApi};

/// OData envelope used by every DataMall listing.
#[derive(Deserialize)]
struct Page<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BusStopRow {
    bus_stop_code: String,
    #[serde(default)]
    road_name: String,
    #[serde(default)]
    description: String,
    latitude: f64,
    longitude: f64,
}

impl From<BusStopRow> for BusStop {
    fn from(row: BusStopRow) -> Self {
        BusStop {
            code: row.bus_stop_code,
            road_name: row.road_name,
            description: row.description,
            location: GeoPoint::new(row.latitude, row.longitude),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaxiRow {
    latitude: f64,
    longitude: f64,
}

/// Body of the bus arrival endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusArrivalResponse {
    pub bus_stop_code: String,
    #[serde(default)]
    services: Vec<ServiceRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRow {
    service_no: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    next_bus: NextBusRow,
    #[serde(default)]
    next_bus2: NextBusRow,
    #[serde(default)]
    next_bus3: NextBusRow,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NextBusRow {
    /// RFC 3339 with a +08:00 offset, or empty when there is no estimate.
    #[serde(default)]
    estimated_arrival: String,
}

impl NextBusRow {
    fn estimate(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.estimated_arrival.trim();
        if raw.is_empty() {
            return None;
        }
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(value = raw, error = %e, "Unparseable arrival estimate");
                None
            }
        }
    }
}

impl BusArrivalResponse {
    pub fn into_record(self, fetched_at: DateTime<Utc>) -> ArrivalRecord {
        let services = self
            .services
            .into_iter()
            .map(|s| ServiceArrivals {
                estimates: [s.next_bus.estimate(), s.next_bus2.estimate(), s.next_bus3.estimate()],
                service_no: s.service_no,
                operator: s.operator,
            })
            .collect();

        ArrivalRecord {
            stop_code: self.bus_stop_code,
            services,
            fetched_at,
        }
    }
}

pub struct DataMallClient<C> {
    http: ApiKey<C>,
    base_url: String,
    arrivals_path: String,
    page_size: usize,
}

impl<C: HttpClient> DataMallClient<C> {
    /// Wraps `inner` so every request carries the `AccountKey` header.
    pub fn new(inner: C, config: &DataMallConfig, account_key: &str) -> Result<Self> {
        Ok(Self {
            http: ApiKey::new(inner, "AccountKey", account_key)?,
            base_url: config.base_url.clone(),
            arrivals_path: config.arrivals_path.clone(),
            page_size: config.page_size,
        })
    }

    /// Follows `$skip` paging until the provider returns a short page.
    async fn fetch_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut skip = 0usize;

        loop {
            let skip_param = skip.to_string();
            let url = endpoint(&self.base_url, path, &[("$skip", skip_param.as_str())])?;
            let page: Page<T> = fetch_json(&self.http, url)
                .await
                .with_context(|| format!("{path} page at offset {skip}"))?;

            let count = page.value.len();
            debug!(path, skip, count, "Page received");
            rows.extend(page.value);

            if self.page_size == 0 || count < self.page_size {
                break;
            }
            skip += self.page_size;
        }

        Ok(rows)
    }
}

#[async_trait]
impl<C: HttpClient> TransitApi for DataMallClient<C> {
    async fn list_stops(&self) -> Result<Vec<BusStop>> {
        let rows: Vec<BusStopRow> = self.fetch_all_pages("BusStops").await?;
        info!(count = rows.len(), "Bus stops fetched");
        Ok(rows.into_iter().map(BusStop::from).collect())
    }

    async fn get_arrivals(&self, stop_code: &str) -> Result<ArrivalRecord> {
        let url = endpoint(
            &self.base_url,
            &self.arrivals_path,
            &[("BusStopCode", stop_code)],
        )?;
        let response: BusArrivalResponse = fetch_json(&self.http, url).await?;
        Ok(response.into_record(Utc::now()))
    }

    async fn taxi_availability(&self) -> Result<Vec<GeoPoint>> {
        let rows: Vec<TaxiRow> = self.fetch_all_pages("Taxi-Availability").await?;
        info!(count = rows.len(), "Taxi positions fetched");
        Ok(rows
            .into_iter()
            .map(|t| GeoPoint::new(t.latitude, t.longitude))
            .collect())
    }
}
