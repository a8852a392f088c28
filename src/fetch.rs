//! HTTP retrieval of pages and flyer bytes.
//!
//! Several of the followed sites serve broken certificate chains, so the
//! client accepts invalid certificates. No state is kept between requests.

use crate::error::{Error, Result};
use tracing::{debug, instrument};

/// Retrieval seam used by site adapters and the runner.
pub trait Fetch {
    /// Fetch a resource and return its full body.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch a page and decode it as text.
    async fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// reqwest-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("status {status}")));
        }
        let body = resp.bytes().await.map_err(|e| Error::fetch(url, e))?;
        debug!(bytes = body.len(), "Fetched resource");
        Ok(body.to_vec())
    }
}
