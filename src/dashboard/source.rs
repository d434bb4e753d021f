// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Where a dashboard gets its pages from.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::query::LOGS_PATH;
use crate::types::{LevelFilter, LogPage};

/// Default request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A remote (or fake) log endpoint.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch the entries newer than `since`.
    async fn fetch(&self, since: f64, limit: usize, level: LevelFilter) -> Result<LogPage, FetchError>;

    /// Human-readable location, used in warnings.
    fn describe(&self) -> String;
}

/// Shared, type-erased source.
pub type SharedLogSource = Arc<dyn LogSource>;

/// `GET {base_url}/ops/logs` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpLogSource {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpLogSource {
    /// Create a source for a service's base URL, e.g. `http://localhost:10021`.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a source with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), LOGS_PATH);
        url::Url::parse(&endpoint)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Full endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl LogSource for HttpLogSource {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self, since: f64, limit: usize, level: LevelFilter) -> Result<LogPage, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("since", since.to_string()),
                ("limit", limit.to_string()),
                ("level", level.as_str().to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let page: LogPage = response.json().await.map_err(|e| self.classify(e))?;
        debug!(items = page.items.len(), next_since = page.next_since, "Fetched log page");
        Ok(page)
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joined() {
        let source = HttpLogSource::new("http://localhost:10021/").unwrap();
        assert_eq!(source.endpoint(), "http://localhost:10021/ops/logs");
        assert_eq!(source.describe(), source.endpoint());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = HttpLogSource::new("not a url");
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is almost never listening on loopback.
        let source =
            HttpLogSource::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = source.fetch(0.0, 10, LevelFilter::All).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
