//! Session ports: topic messaging and request/response over a [`MessagePort`].
//!
//! Architecture follows the reactor shape:
//! - `open` spawns one reader task that owns the inbound half of the port
//! - inbound frames are dispatched sequentially, in arrival order
//! - requests park a oneshot sender keyed by frame id; replies arrive on
//!   `<topic>:resolve:<id>` / `<topic>:reject:<id>` and complete it
//! - handlers run one at a time, in arrival order, on a second per-session
//!   task; replies are still completed by the reader, so a handler may
//!   itself await a request on the same session
//!
//! ```ignore
//! let (a, b) = MessageChannel::new().into_ports();
//! let manager = SessionPort::new();
//! manager.on_request(topic::CONTEXT_SUBSCRIBE, |p: SubscribeParams| async move { Ok(()) })?;
//! manager.open(a, SessionConfiguration::manager())?;
//!
//! let app = SessionPort::new();
//! app.open(b, SessionConfiguration::application())?;
//! app.request(topic::CONTEXT_SUBSCRIBE, json!({"id": "E1"})).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::channel::{MessagePort, Transport};
use crate::configuration::{Role, SessionConfiguration};
use crate::error::{RequestError, SessionError};
use crate::event::Event;
use crate::frame::WireFrame;
use crate::messages::ErrorMessage;
use crate::topic::{self, ReplyOutcome};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle identifying one session within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Future returned by a request handler.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Value>>;

type EventFn = dyn Fn(Value) -> anyhow::Result<()> + Send + Sync;
type RequestFn = dyn Fn(Value) -> HandlerFuture + Send + Sync;

/// What runs when a topic arrives.
#[derive(Clone)]
pub enum Handler {
    /// Synchronous. Replies `null` when a response is expected.
    Event(Arc<EventFn>),
    /// Awaited to completion before the next handler starts; its value (or
    /// error message) is the reply.
    Request(Arc<RequestFn>),
}

impl Handler {
    pub fn event<F>(f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Handler::Event(Arc::new(f))
    }

    pub fn request<F>(f: F) -> Self
    where
        F: Fn(Value) -> HandlerFuture + Send + Sync + 'static,
    {
        Handler::Request(Arc::new(f))
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Event(_) => f.write_str("Handler::Event"),
            Handler::Request(_) => f.write_str("Handler::Request"),
        }
    }
}

/// Lifecycle phase. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Open,
    Closed,
}

/// A handler invocation waiting its turn on the handler task.
struct Call {
    handler: Handler,
    frame: WireFrame,
}

struct PortState {
    phase: Phase,
    transport: Option<Arc<dyn Transport>>,
    calls: Option<mpsc::UnboundedSender<Call>>,
    local: Option<SessionConfiguration>,
    remote: Option<SessionConfiguration>,
}

type PendingSender = oneshot::Sender<Result<Value, RequestError>>;

struct Shared {
    id: SessionId,
    state: Mutex<PortState>,
    handlers: Mutex<HashMap<String, Handler>>,
    pending: Mutex<HashMap<String, PendingSender>>,
    cancel: CancellationToken,
    open_event: Event<SessionConfiguration>,
    close_event: Event<()>,
    error_event: Event<SessionError>,
}

/// One end of a session. Clones share the same underlying session.
#[derive(Clone)]
pub struct SessionPort {
    shared: Arc<Shared>,
}

impl SessionPort {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: SessionId::next(),
                state: Mutex::new(PortState {
                    phase: Phase::Idle,
                    transport: None,
                    calls: None,
                    local: None,
                    remote: None,
                }),
                handlers: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                cancel: CancellationToken::new(),
                open_event: Event::new(),
                close_event: Event::new(),
                error_event: Event::new(),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PortState> {
        self.shared.state.lock().expect("session state mutex poisoned")
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn is_open(&self) -> bool {
        self.phase() == Phase::Open
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }

    /// True once the peer's configuration has arrived and the session is open.
    pub fn is_connected(&self) -> bool {
        let state = self.state();
        state.phase == Phase::Open && state.remote.is_some()
    }

    /// Configuration this side sent.
    pub fn configuration(&self) -> Option<SessionConfiguration> {
        self.state().local.clone()
    }

    /// Configuration the peer sent on `ar.session.open`.
    pub fn info(&self) -> Option<SessionConfiguration> {
        self.state().remote.clone()
    }

    /// The peer's role, once known.
    pub fn remote_role(&self) -> Option<Role> {
        self.state().remote.as_ref().map(|c| c.role)
    }

    /// Raised when the peer's configuration arrives.
    pub fn open_event(&self) -> &Event<SessionConfiguration> {
        &self.shared.open_event
    }

    /// Raised exactly once, when the session closes.
    pub fn close_event(&self) -> &Event<()> {
        &self.shared.close_event
    }

    /// Raised for transport and protocol faults. Logged when unobserved.
    pub fn error_event(&self) -> &Event<SessionError> {
        &self.shared.error_event
    }

    // --- handler registry -------------------------------------------------

    pub fn register_handler(
        &self,
        topic: impl Into<String>,
        handler: Handler,
    ) -> Result<(), SessionError> {
        let topic = topic.into();
        let mut handlers = self.shared.handlers.lock().expect("session handlers mutex poisoned");
        if handlers.contains_key(&topic) {
            return Err(SessionError::DuplicateHandler(topic));
        }
        handlers.insert(topic, handler);
        Ok(())
    }

    pub fn unregister_handler(&self, topic: &str) -> bool {
        self.shared
            .handlers
            .lock()
            .expect("session handlers mutex poisoned")
            .remove(topic)
            .is_some()
    }

    pub fn has_handler(&self, topic: &str) -> bool {
        self.shared
            .handlers
            .lock()
            .expect("session handlers mutex poisoned")
            .contains_key(topic)
    }

    /// Register a typed event handler.
    pub fn on_event<P, F>(&self, topic: &str, f: F) -> Result<(), SessionError>
    where
        P: DeserializeOwned,
        F: Fn(P) + Send + Sync + 'static,
    {
        let name = topic.to_string();
        self.register_handler(
            topic,
            Handler::event(move |payload| {
                let params: P = serde_json::from_value(payload)
                    .map_err(|e| anyhow::anyhow!("invalid payload for {}: {}", name, e))?;
                f(params);
                Ok(())
            }),
        )
    }

    /// Register a typed request handler.
    pub fn on_request<P, R, F, Fut>(&self, topic: &str, f: F) -> Result<(), SessionError>
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let name = topic.to_string();
        let f = Arc::new(f);
        self.register_handler(
            topic,
            Handler::request(move |payload| {
                let params = serde_json::from_value::<P>(payload);
                let f = f.clone();
                let name = name.clone();
                async move {
                    let params =
                        params.map_err(|e| anyhow::anyhow!("invalid payload for {}: {}", name, e))?;
                    let value = f(params).await?;
                    Ok(serde_json::to_value(value)?)
                }
                .boxed()
            }),
        )
    }

    // --- lifecycle ---------------------------------------------------------

    /// Open the session over `port`, announcing `configuration` to the peer.
    ///
    /// Must be called from within a Tokio runtime: the reader task is
    /// spawned here. Fails with [`SessionError::AlreadyOpened`] on a second
    /// call or after close.
    pub fn open(
        &self,
        port: MessagePort,
        configuration: SessionConfiguration,
    ) -> Result<(), SessionError> {
        let MessagePort { transport, inbound } = port;
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();

        {
            let mut state = self.state();
            if state.phase != Phase::Idle {
                return Err(SessionError::AlreadyOpened);
            }
            state.phase = Phase::Open;
            state.transport = Some(transport);
            state.calls = Some(calls_tx);
            state.local = Some(configuration.clone());
        }

        debug!(session_id = %self.id(), role = %configuration.role, "Opening session");

        let payload = serde_json::to_value(&configuration).map_err(|e| SessionError::Serialize {
            topic: topic::OPEN.to_string(),
            message: e.to_string(),
        })?;
        self.post(WireFrame::new(topic::OPEN, payload));

        let port = self.clone();
        let cancel = self.shared.cancel.clone();
        tokio::spawn(async move {
            reader_task(port, inbound, cancel).await;
        });

        let port = self.clone();
        let cancel = self.shared.cancel.clone();
        tokio::spawn(async move {
            handler_task(port, calls_rx, cancel).await;
        });

        Ok(())
    }

    /// Close the session. Idempotent and safe to call from inside a handler.
    pub fn close(&self) {
        self.shutdown(true);
    }

    fn shutdown(&self, notify_peer: bool) {
        let (was_open, transport) = {
            let mut state = self.state();
            match state.phase {
                Phase::Closed => return,
                Phase::Idle => {
                    state.phase = Phase::Closed;
                    (false, None)
                }
                Phase::Open => {
                    state.phase = Phase::Closed;
                    state.calls = None;
                    (true, state.transport.take())
                }
            }
        };

        if let Some(transport) = transport {
            if was_open && notify_peer {
                match WireFrame::new(topic::CLOSE, Value::Null).encode() {
                    Ok(text) => {
                        if let Err(e) = transport.post_message(text) {
                            trace!(session_id = %self.id(), "CLOSE not delivered: {}", e);
                        }
                    }
                    Err(e) => warn!(session_id = %self.id(), "Failed to encode CLOSE: {}", e),
                }
            }
            transport.close();
        }

        self.shared.cancel.cancel();

        let abandoned = {
            let mut pending = self.shared.pending.lock().expect("session pending mutex poisoned");
            let count = pending.len();
            pending.clear();
            count
        };
        // Handlers and listeners commonly capture this port; dropping them
        // here breaks those reference cycles.
        self.shared
            .handlers
            .lock()
            .expect("session handlers mutex poisoned")
            .clear();

        debug!(
            session_id = %self.id(),
            by_peer = !notify_peer,
            abandoned_requests = abandoned,
            "Session closed"
        );

        self.shared.close_event.raise(&());
        self.shared.open_event.clear();
        self.shared.close_event.clear();
        self.shared.error_event.clear();
    }

    // --- outbound -----------------------------------------------------------

    /// Fire-and-forget. `Ok(false)` when the session is closed or the frame
    /// could not be delivered; `Err` only for caller misuse.
    pub fn send<P: Serialize>(&self, topic: &str, payload: P) -> Result<bool, SessionError> {
        match self.phase() {
            Phase::Idle => return Err(SessionError::NotOpened),
            Phase::Closed => return Ok(false),
            Phase::Open => {}
        }

        let payload = serde_json::to_value(payload).map_err(|e| SessionError::Serialize {
            topic: topic.to_string(),
            message: e.to_string(),
        })?;

        Ok(self.post(WireFrame::new(topic, payload)))
    }

    /// Send a request and wait for the peer's reply.
    ///
    /// There is no timeout; wrap in `tokio::time::timeout` when a bounded
    /// wait is needed. Closing the session settles the request with
    /// [`RequestError::Closed`].
    pub async fn request<P: Serialize>(&self, topic: &str, payload: P) -> Result<Value, RequestError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| RequestError::Serialize(e.to_string()))?;
        let frame = WireFrame::request(topic, payload);
        let request_id = frame.id.clone();
        let (tx, rx) = oneshot::channel();

        {
            let state = self.state();
            match state.phase {
                Phase::Idle => return Err(RequestError::NotOpen),
                Phase::Closed => return Err(RequestError::Closed),
                Phase::Open => {}
            }
            self.shared
                .pending
                .lock()
                .expect("session pending mutex poisoned")
                .insert(request_id.clone(), tx);
        }

        trace!(session_id = %self.id(), topic = %topic, request_id = %request_id, "Sending request");

        if !self.post(frame) {
            self.shared
                .pending
                .lock()
                .expect("session pending mutex poisoned")
                .remove(&request_id);
            return Err(RequestError::Undeliverable(topic.to_string()));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RequestError::Closed),
        }
    }

    /// Typed wrapper over [`SessionPort::request`].
    pub async fn request_as<P, R>(&self, topic: &str, payload: P) -> Result<R, RequestError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.request(topic, payload).await?;
        serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// Encode and hand a frame to the transport. Returns false when nothing
    /// was sent; transport failures are raised on the error event.
    fn post(&self, frame: WireFrame) -> bool {
        let transport = {
            let state = self.state();
            if state.phase != Phase::Open {
                return false;
            }
            state.transport.clone()
        };
        let Some(transport) = transport else {
            return false;
        };

        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                self.raise_error(SessionError::Protocol(format!(
                    "failed to encode frame for {}: {}",
                    frame.topic, e
                )));
                return false;
            }
        };

        match transport.post_message(text) {
            Ok(()) => true,
            Err(e) => {
                self.raise_error(SessionError::Transport(e.to_string()));
                false
            }
        }
    }

    fn send_error(&self, message: &str) {
        self.post(WireFrame::new(topic::ERROR, json!({ "message": message })));
    }

    fn raise_error(&self, err: SessionError) {
        if self.shared.error_event.raise(&err) == 0 {
            error!(session_id = %self.id(), error = %err, "Unobserved session error");
        }
    }

    fn reply(&self, request: &WireFrame, result: anyhow::Result<Value>) {
        let frame = match result {
            Ok(value) => WireFrame::new(topic::resolve(&request.topic, &request.id), value),
            Err(e) => {
                debug!(
                    session_id = %self.id(),
                    topic = %request.topic,
                    "Rejecting request: {}",
                    e
                );
                WireFrame::new(
                    topic::reject(&request.topic, &request.id),
                    json!({ "reason": e.to_string() }),
                )
            }
        };
        self.post(frame);
    }

    // --- inbound ------------------------------------------------------------

    fn dispatch(&self, text: &str) {
        let frame = match WireFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.id(), "Malformed frame: {}", e);
                let message = format!("malformed frame: {}", e);
                self.send_error(&message);
                self.raise_error(SessionError::Protocol(message));
                return;
            }
        };

        trace!(
            session_id = %self.id(),
            topic = %frame.topic,
            id = %frame.id,
            expects_response = frame.expects_response,
            "Inbound frame"
        );

        match frame.topic.as_str() {
            topic::OPEN => self.handle_open(frame),
            topic::CLOSE => self.shutdown(false),
            topic::ERROR => {
                let message = serde_json::from_value::<ErrorMessage>(frame.payload.clone())
                    .map(|e| e.message)
                    .unwrap_or_else(|_| frame.payload.to_string());
                self.raise_error(SessionError::Remote(message));
            }
            other => match topic::parse_reply(other) {
                Some((outcome, id)) => self.complete_request(outcome, id, frame.payload),
                None => self.invoke_handler(frame),
            },
        }
    }

    fn handle_open(&self, frame: WireFrame) {
        let remote = match serde_json::from_value::<SessionConfiguration>(frame.payload) {
            Ok(config) => config,
            Err(e) => {
                let message = format!("invalid session configuration: {}", e);
                self.send_error(&message);
                self.raise_error(SessionError::Protocol(message));
                return;
            }
        };

        {
            let mut state = self.state();
            if state.remote.is_some() {
                drop(state);
                let message = "session was opened twice by peer".to_string();
                self.send_error(&message);
                self.raise_error(SessionError::Protocol(message));
                return;
            }
            state.remote = Some(remote.clone());
        }

        debug!(session_id = %self.id(), remote_role = %remote.role, "Peer opened session");
        self.shared.open_event.raise(&remote);
    }

    fn complete_request(&self, outcome: ReplyOutcome, id: &str, payload: Value) {
        let sender = self
            .shared
            .pending
            .lock()
            .expect("session pending mutex poisoned")
            .remove(id);

        let Some(sender) = sender else {
            debug!(session_id = %self.id(), request_id = %id, "Discarding orphan reply");
            return;
        };

        let result = match outcome {
            ReplyOutcome::Resolve => Ok(payload),
            ReplyOutcome::Reject => {
                let reason = payload
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string());
                Err(RequestError::Rejected(reason))
            }
        };
        let _ = sender.send(result);
    }

    fn invoke_handler(&self, frame: WireFrame) {
        let handler = self
            .shared
            .handlers
            .lock()
            .expect("session handlers mutex poisoned")
            .get(&frame.topic)
            .cloned();

        match handler {
            None => {
                let err = SessionError::UnknownTopic(frame.topic.clone());
                warn!(session_id = %self.id(), topic = %frame.topic, "No handler for topic");
                if frame.expects_response {
                    self.reply(&frame, Err(anyhow::anyhow!(err.to_string())));
                }
                self.send_error(&err.to_string());
                self.raise_error(err);
            }
            Some(handler) => {
                let calls = self.state().calls.clone();
                if let Some(calls) = calls {
                    // Only fails once the handler task has exited on close.
                    let _ = calls.send(Call { handler, frame });
                }
            }
        }
    }

    /// Run one handler to completion and reply if the peer asked for it.
    async fn run_call(&self, call: Call) {
        let Call { handler, frame } = call;
        let WireFrame {
            id,
            topic,
            payload,
            expects_response,
        } = frame;

        let result = match handler {
            Handler::Event(f) => f(payload).map(|()| Value::Null),
            Handler::Request(f) => f(payload).await,
        };

        let request = WireFrame {
            id,
            topic,
            payload: Value::Null,
            expects_response,
        };
        if request.expects_response {
            self.reply(&request, result);
        } else if let Err(e) = result {
            self.raise_error(SessionError::Handler {
                topic: request.topic,
                message: e.to_string(),
            });
        }
    }
}

impl Default for SessionPort {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for SessionPort {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for SessionPort {}

impl std::fmt::Debug for SessionPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SessionPort")
            .field("id", &self.shared.id)
            .field("phase", &state.phase)
            .field("remote_role", &state.remote.as_ref().map(|c| c.role))
            .finish()
    }
}

/// Owns the inbound half of the port until the session closes.
async fn reader_task(
    port: SessionPort,
    mut inbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    trace!(session_id = %port.id(), "Reader task started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            message = inbound.recv() => match message {
                Some(text) => port.dispatch(&text),
                None => {
                    debug!(session_id = %port.id(), "Peer transport ended");
                    port.shutdown(false);
                    break;
                }
            },
        }
    }

    trace!(session_id = %port.id(), "Reader task exiting");
}

/// Runs handlers one at a time in the order the reader queued them.
async fn handler_task(
    port: SessionPort,
    mut calls: mpsc::UnboundedReceiver<Call>,
    cancel: CancellationToken,
) {
    loop {
        let call = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            call = calls.recv() => match call {
                Some(call) => call,
                None => break,
            },
        };
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = port.run_call(call) => {}
        }
    }

    trace!(session_id = %port.id(), "Handler task exiting");
}
