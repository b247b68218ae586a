use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes prepared requests. Wrappers in [`super::auth`] layer credentials
/// on top of an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
