//! HTTP client for the code helper REST endpoints.
//!
//! This module provides the shared HTTP client and the request/response
//! resource APIs. The event stream lives in [`crate::sse`].

use crate::error::{CodehelperError, Result};
use reqwest::{Client as ReqClient, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod chat;
pub mod code;
pub mod health;

/// Configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Base URL, without a trailing slash (e.g. `http://localhost:8081/api`).
    pub base_url: String,
    /// TCP/TLS connect timeout applied to every request, streams included.
    pub connect_timeout: Duration,
    /// Whole-request timeout for JSON endpoints.
    pub timeout: Duration,
    /// Whole-request timeout for the health probe.
    pub health_timeout: Duration,
}

/// HTTP client shared by all resource APIs and chat streams.
///
/// The underlying client carries no overall timeout so that event streams
/// can stay open indefinitely; bounded requests set their own.
#[derive(Clone)]
pub struct HttpClient {
    inner: ReqClient,
    cfg: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(cfg: HttpConfig) -> Result<Self> {
        let inner = ReqClient::builder()
            .connect_timeout(cfg.connect_timeout)
            .build()?;
        Ok(Self {
            inner,
            cfg: HttpConfig {
                base_url: cfg.base_url.trim_end_matches('/').to_string(),
                ..cfg
            },
        })
    }

    /// Get the base URL.
    pub fn base(&self) -> &str {
        &self.cfg.base_url
    }

    /// Get the configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.cfg
    }

    /// Start a request against `{base_url}{path}` with no timeout attached.
    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.cfg.base_url, path);
        self.inner.request(method, &url)
    }

    /// POST a JSON body and deserialize the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the response cannot be deserialized.
    pub async fn post<TReq: serde::Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes> {
        let resp = self
            .request(Method::POST, path)
            .timeout(self.cfg.timeout)
            .json(body)
            .send()
            .await?;
        Self::map_json_response(resp).await
    }

    /// Map response to JSON, turning non-success statuses into errors.
    async fn map_json_response<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(CodehelperError::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(CodehelperError::from)
    }
}
