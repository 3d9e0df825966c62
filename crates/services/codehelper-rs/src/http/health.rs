//! Liveness probe.

use crate::http::HttpClient;
use reqwest::{Method, StatusCode};

/// Health API client.
#[derive(Clone)]
pub struct HealthApi {
    http: HttpClient,
}

impl HealthApi {
    /// Create a new Health API client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Probe `GET /health`.
    ///
    /// Returns `true` only for an HTTP 200 answer within the configured
    /// health timeout (5 seconds by default). Every failure, including
    /// timeouts and refused connections, yields `false`; the cause is logged
    /// at `warn` and never returned.
    pub async fn check(&self) -> bool {
        let timeout = self.http.config().health_timeout;
        let result = self
            .http
            .request(Method::GET, "/health")
            .timeout(timeout)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "health check failed");
                false
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(?timeout, "health check timed out");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "health check failed");
                false
            }
        }
    }
}
