//! Wire and domain types.

pub mod code;
pub mod session;

pub use code::{CodeDiffResult, DiffHunk, DiffType, ModifyCodeRequest, ModifyCodeResponse};
pub use session::{ChatRequest, SessionId, StreamState};
