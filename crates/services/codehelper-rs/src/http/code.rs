//! Code modification endpoints.

use crate::error::{CodehelperError, Result};
use crate::http::HttpClient;
use crate::types::code::{CodeDiffResult, ModifyCodeRequest, ModifyCodeResponse};

/// Code API client.
#[derive(Clone)]
pub struct CodeApi {
    http: HttpClient,
}

impl CodeApi {
    /// Create a new Code API client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Ask the backend to rewrite code according to an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`CodehelperError::InvalidRequest`] for blank code or
    /// instruction, [`CodehelperError::Backend`] when the backend reports a
    /// failure in the body, and [`CodehelperError::UnexpectedStatus`] for
    /// non-success statuses.
    pub async fn modify(&self, req: &ModifyCodeRequest) -> Result<String> {
        validate(req)?;
        let resp: ModifyCodeResponse = self.http.post("/ai/modify-code", req).await?;

        match resp {
            ModifyCodeResponse {
                error: Some(error), ..
            } => Err(CodehelperError::Backend(error)),
            ModifyCodeResponse {
                modified_code: Some(code),
                ..
            } => Ok(code),
            _ => Err(CodehelperError::Backend(
                "response carried neither modifiedCode nor error".into(),
            )),
        }
    }

    /// Same as [`modify`](Self::modify) but returns the diff hunks as well.
    ///
    /// # Errors
    ///
    /// Same conditions as [`modify`](Self::modify).
    pub async fn modify_with_diff(&self, req: &ModifyCodeRequest) -> Result<CodeDiffResult> {
        validate(req)?;
        let result: CodeDiffResult = self.http.post("/ai/modify-code-with-diff", req).await?;

        if let Some(msg) = result.failure() {
            return Err(CodehelperError::Backend(msg.to_string()));
        }
        Ok(result)
    }
}

fn validate(req: &ModifyCodeRequest) -> Result<()> {
    if req.original_code.trim().is_empty() {
        return Err(CodehelperError::InvalidRequest(
            "original code must not be empty".into(),
        ));
    }
    if req.instruction.trim().is_empty() {
        return Err(CodehelperError::InvalidRequest(
            "instruction must not be empty".into(),
        ));
    }
    Ok(())
}
