//! Topic names.
//!
//! Replies to a request travel on derived topics:
//! `<topic>:resolve:<id>` and `<topic>:reject:<id>`.

pub const OPEN: &str = "ar.session.open";
pub const CLOSE: &str = "ar.session.close";
pub const ERROR: &str = "ar.session.error";

pub const CONTEXT_SUBSCRIBE: &str = "ar.context.subscribe";
pub const CONTEXT_UNSUBSCRIBE: &str = "ar.context.unsubscribe";
pub const CONTEXT_UPDATE: &str = "ar.context.update";

pub const FOCUS_STATE: &str = "ar.focus.state";

pub const REALITY_FRAME_STATE: &str = "ar.reality.frameState";
pub const REALITY_REQUEST: &str = "ar.reality.request";
pub const REALITY_CURRENT: &str = "ar.reality.current";

/// Hardware tracking topics.
pub mod vuforia {
    pub const IS_AVAILABLE: &str = "ar.vuforia.isAvailable";
    pub const INIT: &str = "ar.vuforia.init";
    pub const DEINIT: &str = "ar.vuforia.deinit";
    pub const START_CAMERA: &str = "ar.vuforia.startCamera";
    pub const STOP_CAMERA: &str = "ar.vuforia.stopCamera";
    pub const START_TRACKER: &str = "ar.vuforia.startTracker";
    pub const STOP_TRACKER: &str = "ar.vuforia.stopTracker";
    pub const LOAD_DATA_SET: &str = "ar.vuforia.loadDataSet";
    pub const UNLOAD_DATA_SET: &str = "ar.vuforia.unloadDataSet";
    pub const ACTIVATE_DATA_SET: &str = "ar.vuforia.activateDataSet";
    pub const DEACTIVATE_DATA_SET: &str = "ar.vuforia.deactivateDataSet";
    pub const ERROR_EVENT: &str = "ar.vuforia.errorEvent";
    pub const DATA_SET_LOAD_EVENT: &str = "ar.vuforia.dataSetLoadEvent";
}

/// Which way a request settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Resolve,
    Reject,
}

impl ReplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyOutcome::Resolve => "resolve",
            ReplyOutcome::Reject => "reject",
        }
    }
}

/// Topic carrying the successful reply to request `id` on `topic`.
pub fn resolve(topic: &str, id: &str) -> String {
    reply(topic, ReplyOutcome::Resolve, id)
}

/// Topic carrying the failed reply to request `id` on `topic`.
pub fn reject(topic: &str, id: &str) -> String {
    reply(topic, ReplyOutcome::Reject, id)
}

pub fn reply(topic: &str, outcome: ReplyOutcome, id: &str) -> String {
    format!("{}:{}:{}", topic, outcome.as_str(), id)
}

/// Split a reply topic into (outcome, request id). Returns `None` for
/// ordinary topics.
pub fn parse_reply(topic: &str) -> Option<(ReplyOutcome, &str)> {
    let mut parts = topic.rsplitn(3, ':');
    let id = parts.next()?;
    let outcome = match parts.next()? {
        "resolve" => ReplyOutcome::Resolve,
        "reject" => ReplyOutcome::Reject,
        _ => return None,
    };
    let base = parts.next()?;
    if base.is_empty() || id.is_empty() {
        return None;
    }
    Some((outcome, id))
}
