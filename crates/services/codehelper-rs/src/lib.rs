//! Rust SDK for the AI code helper backend.
//!
//! The centrepiece is the streaming chat client: [`Client::open_chat_stream`]
//! opens a server-sent events stream against `/ai/chat` and pushes each text
//! chunk to a [`ChatHandler`]. The same client offers a boolean health probe
//! and the code modification endpoints.
//!
//! ```no_run
//! use codehelper_rs::{Callbacks, ClientBuilder};
//!
//! # async fn run() -> codehelper_rs::Result<()> {
//! let client = ClientBuilder::new().build()?;
//! if client.check_health().await {
//!     let session = client.open_chat_stream(
//!         42,
//!         "hello",
//!         Callbacks::new(|chunk| print!("{chunk}")).with_closed(|| println!()),
//!     );
//!     // ... later
//!     session.close();
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rust_2018_idioms)]

pub mod error;
pub mod http;
pub mod sse;
pub mod types;

pub mod client;

// Re-exports
pub use crate::client::{Client, ClientBuilder};
pub use crate::error::{CodehelperError, Result};
pub use crate::sse::{Callbacks, ChatHandler, ChatSubscription, StreamSession};
pub use crate::types::{ChatRequest, SessionId, StreamState};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
