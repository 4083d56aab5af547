//! plxproto - Session protocol for Parallax contexts
//!
//! Every participant in a Parallax system (the manager, each application,
//! each reality) talks to the others over sessions. A session is one end of
//! a duplex message channel carrying JSON frames:
//!
//! - `frame` encodes `[id, topic, payload, expectsResponse?]` arrays
//! - `session` layers topic dispatch, the open/close handshake, and
//!   request/response correlation over a [`MessagePort`]
//! - `topic` names the well-known topics and the reply-topic convention
//! - `messages` holds the typed payloads for context, focus, reality and
//!   vuforia topics
//!
//! Transports are pluggable through [`Transport`]. [`MessageChannel`] gives an
//! in-process pair, which is what the manager uses for co-located contexts
//! and what the tests use throughout.

pub mod channel;
pub mod configuration;
pub mod error;
pub mod event;
pub mod frame;
pub mod messages;
pub mod session;
pub mod topic;

pub use channel::{MessageChannel, MessagePort, Transport};
pub use configuration::{Capabilities, Role, SessionConfiguration};
pub use error::{ChannelError, FrameError, RequestError, SessionError};
pub use event::{Event, ListenerId};
pub use frame::WireFrame;
pub use messages::{
    DataSetLoadEvent, DataSetParams, ErrorMessage, FocusState, FrameState, RealityDescriptor,
    ReferenceFrame, SerializedEntityPose, SerializedEntityPoseMap, SubscribeParams, Subview,
    SubviewKind, ViewState, Viewport, VuforiaErrorEvent, VuforiaErrorKind, VuforiaInitOptions,
};
pub use session::{Handler, HandlerFuture, Phase, SessionId, SessionPort};
