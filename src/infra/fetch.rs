//! Remote document transport.
//!
//! Fetch failures are data, not errors: every fetch resolves to a
//! [`FetchOutcome`] carrying a status code and an optional body, so callers
//! can branch on the status without unwinding.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use tracing::{debug, warn};

use super::error::InfraError;

const SOURCE: &str = "infra::fetch";

/// Result of one remote document fetch.
///
/// `body` is present exactly when `status` is 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub status: u16,
    pub body: Option<String>,
}

impl FetchOutcome {
    pub fn success(body: String) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            body: Some(body),
        }
    }

    pub fn failure(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }
}

/// Reads the raw bytes of a remote document.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Production fetcher backed by a shared `reqwest` client with a bounded
/// per-request timeout.
///
/// The failure status is taken from the transport's typed status field:
/// a response outside 2xx yields its own code, a timeout yields 504, and
/// any other failure without a response yields 502.
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        debug!(target: SOURCE, url, "requesting remote document");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!(target: SOURCE, url, error = %err, "remote document fetch timed out");
                return FetchOutcome::failure(StatusCode::GATEWAY_TIMEOUT.as_u16());
            }
            Err(err) => {
                let status = err
                    .status()
                    .map(|status| status.as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY.as_u16());
                warn!(target: SOURCE, url, error = %err, status, "remote document fetch failed");
                return FetchOutcome::failure(status);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: SOURCE,
                url,
                status = status.as_u16(),
                "remote responded with a non-success status"
            );
            return FetchOutcome::failure(status.as_u16());
        }

        match response.text().await {
            Ok(body) => FetchOutcome::success(body),
            Err(err) => {
                warn!(target: SOURCE, url, error = %err, "failed to read remote document body");
                FetchOutcome::failure(StatusCode::BAD_GATEWAY.as_u16())
            }
        }
    }
}
