//! Pull-based view of a chat stream.

use super::{ChatHandler, StreamSession};
use crate::error::{CodehelperError, Result};
use crate::types::StreamState;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Forwards callbacks into a channel.
///
/// Unbounded because callbacks cannot wait; the sender goes away with the
/// handler when the session closes, which ends the receiver.
pub(crate) struct Forward {
    tx: mpsc::UnboundedSender<Result<String>>,
}

impl ChatHandler for Forward {
    fn on_chunk(&mut self, chunk: String) {
        let _ = self.tx.send(Ok(chunk));
    }

    fn on_error(&mut self, error: CodehelperError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Handle to a chat stream consumed with [`recv`](Self::recv).
///
/// Yields chunks and errors in delivery order, then `None` once the stream is
/// closed. It cannot be restarted. Dropping this handle closes the stream.
pub struct ChatSubscription {
    rx: mpsc::UnboundedReceiver<Result<String>>,
    session: StreamSession,
}

impl ChatSubscription {
    pub(crate) fn channel() -> (Forward, mpsc::UnboundedReceiver<Result<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Forward { tx }, rx)
    }

    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<String>>, session: StreamSession) -> Self {
        Self { rx, session }
    }

    /// Receive the next chunk.
    ///
    /// Returns `None` if the stream is closed.
    pub async fn recv(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }

    /// Current connection state of the underlying session.
    pub fn state(&self) -> StreamState {
        self.session.state()
    }

    /// The underlying session.
    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Close the subscription explicitly.
    ///
    /// Chunks that were received but not yet read are discarded.
    pub fn close(&mut self) {
        self.session.close();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Stream for ChatSubscription {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
