//! HTTP session shared by every request-issuing worker.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Response};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::rate::RateLimiter;

/// A reqwest client with the static header set applied to every request and
/// the shared rate limiter consulted before each one.
pub struct HttpSession {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl HttpSession {
    pub fn new(config: &SessionConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(referer) = &config.referer {
            let value = referer
                .parse()
                .map_err(|_| Error::Config(format!("Invalid referer header: {}", referer)))?;
            headers.insert(header::REFERER, value);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, limiter })
    }

    /// Issue a GET request after sleeping the current inter-request delay.
    ///
    /// Non-2xx statuses are returned, not mapped to errors; callers inspect
    /// the status themselves.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.limiter.wait_before_request().await;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        tracing::debug!("{} -> {}", url, response.status());
        Ok(response)
    }

    /// The rate limiter this session throttles on.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}
