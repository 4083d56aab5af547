//! Protocol error types.

use thiserror::Error;

/// Errors decoding a wire frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame is not a JSON array")]
    NotAnArray,
    #[error("Frame must have 3 or 4 elements, got {0}")]
    WrongArity(usize),
    #[error("Invalid frame field: {0}")]
    InvalidField(&'static str),
}

/// Errors from a channel transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
}

/// Session-level faults.
///
/// `AlreadyOpened`, `NotOpened` and `DuplicateHandler` are caller misuse and
/// are returned synchronously. The rest are raised on the session's error
/// event because the peer may live in another process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session was already opened or closed")]
    AlreadyOpened,
    #[error("session has not been opened")]
    NotOpened,
    #[error("a handler is already registered for topic {0}")]
    DuplicateHandler(String),
    #[error("unable to handle message for topic {0}")]
    UnknownTopic(String),
    #[error("handler for {topic} failed: {message}")]
    Handler { topic: String, message: String },
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("peer reported error: {0}")]
    Remote(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to serialize payload for {topic}: {message}")]
    Serialize { topic: String, message: String },
}

/// Why a request did not produce a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("session is not open")]
    NotOpen,
    #[error("session closed before the request settled")]
    Closed,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("request on {0} could not be delivered")]
    Undeliverable(String),
    #[error("failed to serialize request payload: {0}")]
    Serialize(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}
