//! SSE (Server-Sent Events) chat streaming.
//!
//! [`open`] issues `GET /ai/chat` and spawns one task per session that reads
//! the event stream and calls the session's [`ChatHandler`] in delivery
//! order. The returned [`StreamSession`] owns that task; closing or dropping
//! it ends the stream.
//!
//! There is no reconnection. A stream that ends or fails is finished, and
//! the caller opens a new one if it wants to continue.

mod decoder;
mod subscription;

pub use subscription::ChatSubscription;

use crate::error::CodehelperError;
use crate::http::HttpClient;
use crate::types::{ChatRequest, SessionId, StreamState};
use decoder::{Frame, SseDecoder};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use std::cell::Cell;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

const EVENT_STREAM: &str = "text/event-stream";
const ERROR_BODY_LIMIT: usize = 4 * 1024;
const ERROR_BODY_WAIT: Duration = Duration::from_secs(1);

/// Receiver of stream callbacks.
///
/// Callbacks for one session run one at a time, in delivery order, on the
/// session's task. Only `on_chunk` is required.
pub trait ChatHandler: Send + 'static {
    /// A non-blank event payload, forwarded untrimmed.
    fn on_chunk(&mut self, chunk: String);

    /// A payload could not be extracted (the stream continues) or the
    /// transport failed (the stream is closed right after this call).
    fn on_error(&mut self, _error: CodehelperError) {}

    /// The server finished the stream normally.
    fn on_closed(&mut self) {}
}

type ChunkFn = Box<dyn FnMut(String) + Send>;
type ErrorFn = Box<dyn FnMut(CodehelperError) + Send>;
type ClosedFn = Box<dyn FnMut() + Send>;

/// [`ChatHandler`] assembled from closures.
pub struct Callbacks {
    on_chunk: ChunkFn,
    on_error: Option<ErrorFn>,
    on_closed: Option<ClosedFn>,
}

impl Callbacks {
    /// Handler that only receives chunks.
    pub fn new(on_chunk: impl FnMut(String) + Send + 'static) -> Self {
        Self {
            on_chunk: Box::new(on_chunk),
            on_error: None,
            on_closed: None,
        }
    }

    /// Also receive errors.
    #[must_use]
    pub fn with_error(mut self, on_error: impl FnMut(CodehelperError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Also be told when the server ends the stream.
    #[must_use]
    pub fn with_closed(mut self, on_closed: impl FnMut() + Send + 'static) -> Self {
        self.on_closed = Some(Box::new(on_closed));
        self
    }
}

impl ChatHandler for Callbacks {
    fn on_chunk(&mut self, chunk: String) {
        (self.on_chunk)(chunk);
    }

    fn on_error(&mut self, error: CodehelperError) {
        if let Some(f) = &mut self.on_error {
            f(error);
        }
    }

    fn on_closed(&mut self) {
        if let Some(f) = &mut self.on_closed {
            f();
        }
    }
}

/// How a stream ended, once the transport stopped delivering.
#[derive(Debug)]
pub(crate) enum Termination {
    /// Normal end of stream.
    Benign,
    /// Genuine failure; reported, then the connection is force-closed.
    Failed(CodehelperError),
}

/// Classify an error signal from the transport.
///
/// Normal termination and real failures arrive through the same channel.
/// If the transport is already closed when it signals, the server simply
/// finished the stream.
pub(crate) fn classify(transport: StreamState, error: CodehelperError) -> Termination {
    if transport.is_closed() {
        Termination::Benign
    } else {
        Termination::Failed(error)
    }
}

thread_local! {
    // Session whose handler is running on this thread, if any.
    static DISPATCHING: Cell<*const Shared> = const { Cell::new(std::ptr::null()) };
}

struct DispatchScope {
    previous: *const Shared,
}

impl DispatchScope {
    fn enter(shared: &Shared) -> Self {
        let previous = DISPATCHING.with(|d| d.replace(std::ptr::from_ref(shared)));
        Self { previous }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(self.previous));
    }
}

/// State shared between a [`StreamSession`] and its task.
///
/// The handler lock is held across every callback, so `close()` from another
/// thread waits for a running callback and nothing runs after it returns.
struct Shared {
    state: AtomicU8,
    handler: Mutex<Option<Box<dyn ChatHandler>>>,
}

impl Shared {
    fn new(handler: Box<dyn ChatHandler>) -> Self {
        Self {
            state: AtomicU8::new(StreamState::Connecting.as_u8()),
            handler: Mutex::new(Some(handler)),
        }
    }

    fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn ChatHandler>>> {
        self.handler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_open(&self) {
        // A concurrent close() wins.
        let _ = self.state.compare_exchange(
            StreamState::Connecting.as_u8(),
            StreamState::Open.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Run one non-terminal callback.
    fn invoke(&self, f: impl FnOnce(&mut dyn ChatHandler)) -> ControlFlow<()> {
        let mut guard = self.lock();
        if self.state().is_closed() {
            return ControlFlow::Break(());
        }
        let Some(handler) = guard.as_mut() else {
            return ControlFlow::Break(());
        };

        {
            let _scope = DispatchScope::enter(self);
            f(handler.as_mut());
        }

        if self.state().is_closed() {
            // Closed from inside the callback.
            let handler = guard.take();
            drop(guard);
            drop(handler);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    /// Report the end of the stream and release the handler.
    fn finish(&self, termination: Termination) {
        let mut guard = self.lock();
        if self.state().is_closed() {
            return;
        }
        let Some(mut handler) = guard.take() else {
            return;
        };

        {
            let _scope = DispatchScope::enter(self);
            match termination {
                Termination::Benign => {
                    tracing::debug!("chat stream ended");
                    self.set_state(StreamState::Closed);
                    handler.on_closed();
                }
                Termination::Failed(error) => {
                    tracing::warn!(%error, "chat stream failed");
                    self.set_state(StreamState::Errored);
                    handler.on_error(error);
                    self.set_state(StreamState::Closed);
                }
            }
        }

        drop(guard);
        drop(handler);
    }

    /// Move to `Closed` and drop the handler. Returns whether this call did it.
    fn close(&self) -> bool {
        let reentrant = DISPATCHING.with(|d| std::ptr::eq(d.get(), self));
        if reentrant {
            // Our own callback is running and holds the lock; the task
            // releases the handler once it returns.
            return self.state.swap(StreamState::Closed.as_u8(), Ordering::SeqCst)
                != StreamState::Closed.as_u8();
        }

        let mut guard = self.lock();
        let previous = self.state.swap(StreamState::Closed.as_u8(), Ordering::SeqCst);
        let handler = guard.take();
        drop(guard);
        drop(handler);
        previous != StreamState::Closed.as_u8()
    }
}

/// Handle to one chat stream.
///
/// Dropping the handle closes the stream.
pub struct StreamSession {
    session_id: SessionId,
    message: String,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _task: tokio::task::JoinHandle<()>,
}

impl StreamSession {
    /// Conversation this stream belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Message that opened the stream.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Current connection state.
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Whether the session reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Close the stream.
    ///
    /// Cancels the transport and suppresses every further callback. If a
    /// callback is running on another thread, this waits for it to return.
    /// Calling it from inside one of this session's own callbacks is allowed;
    /// that callback is then the last one. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        if self.shared.close() {
            tracing::debug!(session_id = %self.session_id, "chat stream closed by caller");
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("session_id", &self.session_id)
            .field("message", &self.message)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Open a chat stream and start delivering to `handler`.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub(crate) fn open(
    http: &HttpClient,
    session_param: &str,
    request: ChatRequest,
    handler: Box<dyn ChatHandler>,
) -> StreamSession {
    let mut query = vec![
        (session_param, request.session_id.as_str()),
        ("message", request.message.as_str()),
    ];
    if let Some(path) = request.project_path.as_deref() {
        query.push(("projectPath", path));
    }

    let req = http
        .request(Method::GET, "/ai/chat")
        .header(ACCEPT, EVENT_STREAM)
        .header(CACHE_CONTROL, "no-cache")
        .query(&query);

    let shared = Arc::new(Shared::new(handler));
    let cancel = CancellationToken::new();
    let span = tracing::debug_span!("chat_stream", session_id = %request.session_id);
    let task = tokio::spawn(drive(req, Arc::clone(&shared), cancel.clone()).instrument(span));

    StreamSession {
        session_id: request.session_id,
        message: request.message,
        shared,
        cancel,
        _task: task,
    }
}

async fn drive(req: reqwest::RequestBuilder, shared: Arc<Shared>, cancel: CancellationToken) {
    let termination = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        termination = pump(req, &shared) => termination,
    };

    // Returning drops the response body, which closes the connection.
    if let Some(termination) = termination {
        shared.finish(termination);
    }
}

/// Read the stream until it ends. `None` means the session was closed.
async fn pump(req: reqwest::RequestBuilder, shared: &Shared) -> Option<Termination> {
    tracing::debug!("connecting");
    let response = match req.send().await {
        Ok(resp) => resp,
        Err(e) => return Some(classify(StreamState::Connecting, e.into())),
    };
    let response = match accept(response).await {
        Ok(resp) => resp,
        Err(e) => return Some(classify(StreamState::Connecting, e)),
    };

    shared.mark_open();
    tracing::debug!("chat stream open");

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    loop {
        match body.next().await {
            Some(Ok(bytes)) => {
                for frame in decoder.push(&bytes) {
                    if deliver(shared, frame).is_break() {
                        return None;
                    }
                }
            }
            Some(Err(e)) => return Some(classify(StreamState::Open, e.into())),
            None => return Some(classify(StreamState::Closed, CodehelperError::StreamEnded)),
        }
    }
}

/// Check the response before reading events from it.
async fn accept(response: Response) -> Result<Response, CodehelperError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = error_body(response).await;
        return Err(CodehelperError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    if let Some(value) = response.headers().get(CONTENT_TYPE) {
        let content_type = value.to_str().unwrap_or_default();
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        if !mime.eq_ignore_ascii_case(EVENT_STREAM) {
            return Err(CodehelperError::InvalidContentType(content_type.to_string()));
        }
    }

    Ok(response)
}

/// Read at most [`ERROR_BODY_LIMIT`] bytes of a rejected response.
///
/// The body of an error answer may never end, so reading stops after
/// [`ERROR_BODY_WAIT`] with whatever arrived.
async fn error_body(response: Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    let read = async {
        while let Some(Ok(bytes)) = stream.next().await {
            body.extend_from_slice(&bytes);
            if body.len() >= ERROR_BODY_LIMIT {
                break;
            }
        }
    };
    if tokio::time::timeout(ERROR_BODY_WAIT, read).await.is_err() {
        tracing::debug!("error body still open, reporting the prefix read so far");
    }
    body.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&body).into_owned()
}

fn deliver(shared: &Shared, frame: Frame) -> ControlFlow<()> {
    match frame {
        Frame::Message { event, data } => {
            if let Some(name) = event.as_deref().filter(|name| *name != "message") {
                tracing::debug!(event = name, "skipping named event");
                return ControlFlow::Continue(());
            }
            if data.trim().is_empty() {
                tracing::trace!("skipping blank payload");
                return ControlFlow::Continue(());
            }
            shared.invoke(|h| h.on_chunk(data))
        }
        Frame::Malformed(reason) => {
            tracing::warn!(%reason, "malformed event");
            shared.invoke(|h| h.on_error(CodehelperError::Parse(reason)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{OnceLock, Weak, mpsc};

    fn message(data: &str) -> Frame {
        Frame::Message {
            event: None,
            data: data.to_string(),
        }
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Chunk(String),
        Error,
        Closed,
    }

    struct Recorder(mpsc::Sender<Call>);

    impl ChatHandler for Recorder {
        fn on_chunk(&mut self, chunk: String) {
            self.0.send(Call::Chunk(chunk)).unwrap();
        }
        fn on_error(&mut self, _error: CodehelperError) {
            self.0.send(Call::Error).unwrap();
        }
        fn on_closed(&mut self) {
            self.0.send(Call::Closed).unwrap();
        }
    }

    fn recorder() -> (Arc<Shared>, mpsc::Receiver<Call>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Shared::new(Box::new(Recorder(tx)))), rx)
    }

    #[test]
    fn error_signal_on_closed_transport_is_benign() {
        let t = classify(StreamState::Closed, CodehelperError::StreamEnded);
        assert!(matches!(t, Termination::Benign));
    }

    #[test]
    fn error_signal_on_live_transport_is_a_failure() {
        for state in [StreamState::Connecting, StreamState::Open] {
            let t = classify(state, CodehelperError::Parse("boom".into()));
            assert!(matches!(t, Termination::Failed(CodehelperError::Parse(_))));
        }
    }

    #[test]
    fn blank_and_named_events_are_not_delivered() {
        let (shared, rx) = recorder();
        shared.mark_open();

        let frames = [
            Frame::Message {
                event: None,
                data: "Hi".into(),
            },
            Frame::Message {
                event: None,
                data: " \t ".into(),
            },
            Frame::Message {
                event: Some("usage".into()),
                data: "42".into(),
            },
            Frame::Message {
                event: Some("message".into()),
                data: " there".into(),
            },
        ];
        for frame in frames {
            assert!(deliver(&shared, frame).is_continue());
        }

        drop(shared);
        let calls: Vec<Call> = rx.iter().collect();
        assert_eq!(
            calls,
            vec![Call::Chunk("Hi".into()), Call::Chunk(" there".into())]
        );
    }

    #[test]
    fn malformed_frame_reports_error_and_continues() {
        let (shared, rx) = recorder();
        shared.mark_open();

        assert!(deliver(&shared, Frame::Malformed("no data".into())).is_continue());
        assert_eq!(shared.state(), StreamState::Open);
        drop(shared);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![Call::Error]);
    }

    #[test]
    fn failure_reports_error_once_then_closes() {
        let (shared, rx) = recorder();
        shared.mark_open();

        shared.finish(Termination::Failed(CodehelperError::Parse("x".into())));
        assert_eq!(shared.state(), StreamState::Closed);

        // Nothing after the terminal callback.
        shared.finish(Termination::Benign);
        assert!(deliver(&shared, message("late")).is_break());

        drop(shared);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![Call::Error]);
    }

    #[test]
    fn close_suppresses_all_callbacks() {
        let (shared, rx) = recorder();
        shared.mark_open();

        assert!(shared.close());
        assert!(!shared.close());
        assert!(deliver(&shared, message("late")).is_break());
        shared.finish(Termination::Benign);

        drop(shared);
        assert!(rx.iter().next().is_none());
    }

    #[test]
    fn close_from_inside_a_callback_stops_delivery() {
        struct SelfClosing {
            session: Arc<OnceLock<Weak<Shared>>>,
            seen: mpsc::Sender<String>,
        }

        impl ChatHandler for SelfClosing {
            fn on_chunk(&mut self, chunk: String) {
                self.seen.send(chunk).unwrap();
                if let Some(shared) = self.session.get().and_then(Weak::upgrade) {
                    assert!(shared.close());
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        let session = Arc::new(OnceLock::new());
        let shared = Arc::new(Shared::new(Box::new(SelfClosing {
            session: Arc::clone(&session),
            seen: tx,
        })));
        session.set(Arc::downgrade(&shared)).unwrap();
        shared.mark_open();

        assert!(deliver(&shared, message("one")).is_break());
        assert!(deliver(&shared, message("two")).is_break());
        assert_eq!(shared.state(), StreamState::Closed);

        drop(shared);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec!["one".to_string()]);
    }
}
