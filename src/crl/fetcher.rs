use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use super::errors::FetchError;

/// HTTP client for CRL distribution points.
///
/// A single instance is built at startup and shared; the underlying
/// `reqwest::Client` keeps a connection pool so that sources hosted on the
/// same server reuse their connections. The request timeout covers the
/// whole exchange, body included.
#[derive(Debug, Clone)]
pub struct CrlFetcher {
    client: Client,
}

impl CrlFetcher {
    /// Create a new fetcher with a per-request timeout and client identifier
    pub fn new(request_timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client })
    }

    /// Download the raw CRL bytes from `url`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        debug!(url, "Fetching CRL");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| request_error(url, e))?;

        debug!(url, bytes = body.len(), "Fetched CRL");
        Ok(body.to_vec())
    }
}

fn request_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Http(error)
    }
}
