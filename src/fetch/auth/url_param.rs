use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends an API key as a URL query parameter
/// (Google Maps Platform takes it as `key=`).
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    fn apply(&self, req: &mut reqwest::Request) {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.apply(&mut req);
        // The URL now carries the key
        self.inner.execute(req).await.map_err(|e| e.without_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_key_after_existing_params() {
        let auth = UrlParam {
            inner: (),
            param_name: "key".to_string(),
            key: "secret".to_string(),
        };
        let mut req = reqwest::Request::new(
            reqwest::Method::GET,
            "https://maps.example.com/geocode/json?latlng=1.3,103.8"
                .parse()
                .unwrap(),
        );
        auth.apply(&mut req);
        assert_eq!(req.url().query(), Some("latlng=1.3,103.8&key=secret"));
    }
}
