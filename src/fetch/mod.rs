mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::CompanionError;

/// GETs `url` through `client` and deserializes the JSON body.
///
/// Non-2xx responses are errors carrying the status and body text.
pub async fn fetch_json<C, T>(client: &C, url: Url) -> Result<T>
where
    C: HttpClient + ?Sized,
    T: DeserializeOwned,
{
    debug!(url = %url.path(), "Requesting");
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    // Transport errors print their URL, which may carry an API key
    let resp = client.execute(req).await.map_err(|e| e.without_url())?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| e.without_url())?;

    if !status.is_success() {
        return Err(anyhow!("API returned status {}: {}", status, body));
    }

    trace!(bytes = body.len(), "Response received");
    serde_json::from_str(&body).context("Failed to parse response")
}

/// Joins `path` onto `base` and appends `params` as query pairs.
pub fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let base = if base.ends_with('/') {
        Url::parse(base)
    } else {
        Url::parse(&format!("{base}/"))
    }
    .with_context(|| format!("invalid base URL '{base}'"))?;

    let mut url = base.join(path)?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// One-shot reachability probe run before any command touches the network.
///
/// Any HTTP response counts as connected; only transport failures map to
/// [`CompanionError::NetworkUnavailable`].
pub async fn check_connectivity<C: HttpClient + ?Sized>(client: &C, probe_url: &str) -> Result<()> {
    let url: Url = probe_url
        .parse()
        .with_context(|| format!("invalid probe URL '{probe_url}'"))?;
    let req = reqwest::Request::new(reqwest::Method::HEAD, url);

    match client.execute(req).await {
        Ok(resp) => {
            debug!(status = %resp.status(), "Connectivity probe answered");
            Ok(())
        }
        Err(e) => {
            debug!(error = %e, "Connectivity probe failed");
            Err(CompanionError::NetworkUnavailable.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path_and_params() {
        let url = endpoint(
            "https://datamall2.mytransport.sg/ltaodataservice",
            "BusStops",
            &[("$skip", "500")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://datamall2.mytransport.sg/ltaodataservice/BusStops?%24skip=500"
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_base() {
        let url = endpoint("https://api.data.gov.sg/v1/", "environment/air-temperature", &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.data.gov.sg/v1/environment/air-temperature"
        );
    }

    #[tokio::test]
    async fn test_transport_error_hides_url_key() {
        let client = auth::UrlParam {
            inner: BasicClient::new(std::time::Duration::from_secs(1)).unwrap(),
            param_name: "key".to_string(),
            key: "maps-secret".to_string(),
        };
        // reqwest refuses the scheme before touching the network
        let url: Url = "ftp://maps.example.com/geocode/json?latlng=1.3,103.8"
            .parse()
            .unwrap();

        let err = fetch_json::<_, serde_json::Value>(&client, url)
            .await
            .unwrap_err();
        let rendered = format!("{err:#} {err:?}");
        assert!(!rendered.contains("maps-secret"), "{rendered}");
    }

    #[test]
    fn test_endpoint_rejects_bad_base() {
        assert!(endpoint("not a url", "x", &[]).is_err());
    }
}
