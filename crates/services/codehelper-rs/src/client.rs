//! High-level client API for the code helper backend.
//!
//! This module provides the ergonomic `Client` and `ClientBuilder` types.

use crate::error::{CodehelperError, Result};
use crate::http::chat::ChatApi;
use crate::http::code::CodeApi;
use crate::http::health::HealthApi;
use crate::http::{HttpClient, HttpConfig};
use crate::sse::{self, ChatHandler, ChatSubscription, StreamSession};
use crate::types::{ChatRequest, CodeDiffResult, ModifyCodeRequest, SessionId};
use std::time::Duration;

/// Base URL used when neither the builder nor the environment sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081/api";
/// Environment variable that overrides the default base URL.
pub const BASE_URL_ENV: &str = "CODEHELPER_BASE_URL";
/// Default name of the session query parameter on `/ai/chat`.
pub const DEFAULT_SESSION_PARAM: &str = "sessionId";
/// Default bound on the health probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the code helper backend.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    session_param: String,
}

/// Builder for creating a [`Client`].
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    base_url: String,
    session_param: String,
    connect_timeout: Duration,
    timeout: Duration,
    health_timeout: Duration,
}

fn default_base_url(from_env: Option<String>) -> String {
    from_env
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: default_base_url(std::env::var(BASE_URL_ENV).ok()),
            session_param: DEFAULT_SESSION_PARAM.to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(60), // code rewrites can take a while
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings.
    ///
    /// Default settings:
    /// - Base URL: `$CODEHELPER_BASE_URL`, else `http://localhost:8081/api`
    /// - Session query parameter: `sessionId`
    /// - Connect timeout: 5 seconds
    /// - Request timeout: 60 seconds (JSON endpoints only; streams have none)
    /// - Health probe timeout: 5 seconds
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL, including any path prefix such as `/api`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the name of the query parameter that carries the session id.
    ///
    /// Some deployments expect `memoryId`.
    pub fn session_param(mut self, name: impl Into<String>) -> Self {
        self.session_param = name.into();
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout in seconds for the JSON endpoints.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the health probe timeout.
    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute `http`/`https`
    /// URL, the session parameter is blank, or the HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CodehelperError::InvalidConfig(format!(
                "unsupported scheme '{}' in base URL",
                url.scheme()
            )));
        }
        if self.session_param.trim().is_empty() {
            return Err(CodehelperError::InvalidConfig(
                "session parameter name must not be empty".into(),
            ));
        }

        let http = HttpClient::new(HttpConfig {
            base_url: self.base_url,
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
            health_timeout: self.health_timeout,
        })?;

        Ok(Client {
            http,
            session_param: self.session_param,
        })
    }
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.http.base()
    }

    /// Get the health API.
    pub fn health(&self) -> HealthApi {
        HealthApi::new(self.http.clone())
    }

    /// Get the one-shot chat API.
    pub fn chat(&self) -> ChatApi {
        ChatApi::new(self.http.clone())
    }

    /// Get the code modification API.
    pub fn code(&self) -> CodeApi {
        CodeApi::new(self.http.clone())
    }

    /// Probe `GET /health`; `true` only for HTTP 200 within the health timeout.
    pub async fn check_health(&self) -> bool {
        self.health().check().await
    }

    /// Ask a knowledge-base question. See [`ChatApi::chat_with_rag`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`ChatApi::chat_with_rag`].
    pub async fn chat_with_rag(&self, message: &str) -> Result<String> {
        self.chat().chat_with_rag(message).await
    }

    /// Rewrite code according to an instruction. See [`CodeApi::modify`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`CodeApi::modify`].
    pub async fn modify_code(&self, request: &ModifyCodeRequest) -> Result<String> {
        self.code().modify(request).await
    }

    /// Rewrite code and return the diff hunks. See [`CodeApi::modify_with_diff`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`CodeApi::modify_with_diff`].
    pub async fn modify_code_with_diff(
        &self,
        request: &ModifyCodeRequest,
    ) -> Result<CodeDiffResult> {
        self.code().modify_with_diff(request).await
    }

    /// Stream the answer to `message` in conversation `session_id`.
    ///
    /// Chunks go to `handler` as they arrive. Errors are reported through the
    /// handler as well; this call itself cannot fail.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open_chat_stream(
        &self,
        session_id: impl Into<SessionId>,
        message: impl Into<String>,
        handler: impl ChatHandler,
    ) -> StreamSession {
        self.open_chat(ChatRequest::new(session_id, message), handler)
    }

    /// Like [`open_chat_stream`](Self::open_chat_stream), taking a full
    /// [`ChatRequest`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open_chat(&self, request: ChatRequest, handler: impl ChatHandler) -> StreamSession {
        sse::open(&self.http, &self.session_param, request, Box::new(handler))
    }

    /// Stream a chat answer as a pull-based subscription.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn subscribe_chat(&self, request: ChatRequest) -> ChatSubscription {
        let (forward, rx) = ChatSubscription::channel();
        let session = self.open_chat(request, forward);
        ChatSubscription::new(rx, session)
    }
}
