//! Chat session types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque conversation identifier.
///
/// The backend uses it to continue an earlier conversation. Integers and
/// strings both convert into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Borrow the identifier as it is sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

macro_rules! session_id_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for SessionId {
            fn from(value: $t) -> Self {
                Self(value.to_string())
            }
        })*
    };
}

session_id_from_int!(i32, i64, u32, u64, usize);

/// One chat turn to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Conversation the message belongs to.
    pub session_id: SessionId,
    /// The user's utterance, sent unencoded here and URL-encoded on the wire.
    pub message: String,
    /// Project root the backend may read files from (`projectPath`).
    pub project_path: Option<String>,
}

impl ChatRequest {
    /// Create a request without a project path.
    pub fn new(session_id: impl Into<SessionId>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            project_path: None,
        }
    }

    /// Attach the project root directory.
    pub fn project_path(mut self, path: impl Into<String>) -> Self {
        self.project_path = Some(path.into());
        self
    }
}

/// Connection state of a [`StreamSession`](crate::sse::StreamSession).
///
/// `Closed` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Request issued, no response accepted yet.
    Connecting,
    /// Response accepted, events are flowing.
    Open,
    /// A transport error was reported; the connection is being torn down.
    Errored,
    /// Terminal. No further callbacks.
    Closed,
}

impl StreamState {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Errored => 2,
            Self::Closed => 3,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Errored,
            _ => Self::Closed,
        }
    }

    /// Whether the session has reached its terminal state.
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Errored => "errored",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}
