//! One-shot chat endpoints.

use crate::error::{CodehelperError, Result};
use crate::http::HttpClient;
use reqwest::Method;

/// Chat API client for answers that are not streamed.
#[derive(Clone)]
pub struct ChatApi {
    http: HttpClient,
}

impl ChatApi {
    /// Create a new Chat API client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Ask a question answered from the backend's knowledge base.
    ///
    /// `GET /ai/chat-with-rag?message=<text>`; the answer is plain text and
    /// names its sources.
    ///
    /// # Errors
    ///
    /// Returns [`CodehelperError::InvalidRequest`] for a blank message and
    /// [`CodehelperError::UnexpectedStatus`] for non-success statuses.
    pub async fn chat_with_rag(&self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(CodehelperError::InvalidRequest(
                "message must not be empty".into(),
            ));
        }

        let resp = self
            .http
            .request(Method::GET, "/ai/chat-with-rag")
            .query(&[("message", message)])
            .timeout(self.http.config().timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CodehelperError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
