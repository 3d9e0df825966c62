//! Code modification types.

use serde::{Deserialize, Serialize};

/// Body of `POST /ai/modify-code` and `POST /ai/modify-code-with-diff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyCodeRequest {
    /// Code to modify.
    pub original_code: String,
    /// What to change.
    pub instruction: String,
    /// File name, used by the backend as a hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ModifyCodeRequest {
    /// Create a request without a file name.
    pub fn new(original_code: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            original_code: original_code.into(),
            instruction: instruction.into(),
            file_name: None,
        }
    }

    /// Set the file name hint.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Response of `POST /ai/modify-code`.
///
/// The backend answers 200 in both outcomes and signals failure through
/// `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyCodeResponse {
    /// Modified code on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_code: Option<String>,
    /// `success` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Kind of a diff hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// One contiguous block of differences.
///
/// Line numbers are zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    pub original_start: u32,
    pub original_lines: u32,
    pub modified_start: u32,
    pub modified_lines: u32,
    #[serde(default)]
    pub original_lines_list: Vec<String>,
    #[serde(default)]
    pub modified_lines_list: Vec<String>,
    #[serde(rename = "type")]
    pub kind: DiffType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response of `POST /ai/modify-code-with-diff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDiffResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_code: Option<String>,
    #[serde(default)]
    pub hunks: Vec<DiffHunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl CodeDiffResult {
    /// Failure message if the backend reported one.
    pub fn failure(&self) -> Option<&str> {
        match (&self.error, self.status.as_deref()) {
            (Some(e), _) => Some(e.as_str()),
            (None, Some("error")) => Some("modification failed"),
            _ => None,
        }
    }
}
