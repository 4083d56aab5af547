//! Typed payloads for the non-session topics.
//!
//! Geometry crosses the wire as plain arrays: positions `[x, y, z]` in
//! meters, orientations `[x, y, z, w]` unit quaternions, times in seconds.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Basis a pose is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceFrame {
    /// The well-known root frame.
    Fixed,
    /// Another entity, by id.
    Entity(String),
}

impl ReferenceFrame {
    pub const FIXED_NAME: &'static str = "FIXED";

    pub fn entity(id: impl Into<String>) -> Self {
        ReferenceFrame::Entity(id.into())
    }

    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ReferenceFrame::Fixed => None,
            ReferenceFrame::Entity(id) => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReferenceFrame::Fixed => Self::FIXED_NAME,
            ReferenceFrame::Entity(id) => id,
        }
    }
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ReferenceFrame {
    fn from(value: &str) -> Self {
        if value == Self::FIXED_NAME {
            ReferenceFrame::Fixed
        } else {
            ReferenceFrame::Entity(value.to_string())
        }
    }
}

impl Serialize for ReferenceFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReferenceFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(serde::de::Error::custom("reference frame must not be empty"));
        }
        Ok(ReferenceFrame::from(raw.as_str()))
    }
}

/// One entity's pose on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEntityPose {
    /// Position relative to `r`.
    pub p: [f64; 3],
    /// Orientation relative to `r`.
    pub o: [f64; 4],
    /// Reference frame.
    pub r: ReferenceFrame,
}

/// Entity id → pose; `None` means "explicitly unknown this frame".
pub type SerializedEntityPoseMap = BTreeMap<String, Option<SerializedEntityPose>>;

/// Screen-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubviewKind {
    Single,
    LeftEye,
    RightEye,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subview {
    pub kind: SubviewKind,
    /// Column-major 4x4 projection matrix.
    pub projection_matrix: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

/// Per-view projection info a reality may attach to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub viewport: Viewport,
    #[serde(default)]
    pub subviews: Vec<Subview>,
}

/// One update tick. Published by realities on `ar.reality.frameState` and,
/// filtered per session, by the manager on `ar.context.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameState {
    pub time: f64,
    pub frame_number: u64,
    #[serde(default)]
    pub entities: SerializedEntityPoseMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewState>,
    /// Uri of the reality that produced the frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<String>,
}

impl FrameState {
    pub fn new(time: f64, frame_number: u64) -> Self {
        Self {
            time,
            frame_number,
            entities: BTreeMap::new(),
            view: None,
            reality: None,
        }
    }

    pub fn with_entity(mut self, id: impl Into<String>, pose: Option<SerializedEntityPose>) -> Self {
        self.entities.insert(id.into(), pose);
        self
    }
}

/// `ar.context.subscribe` / `ar.context.unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub id: String,
}

/// `ar.focus.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusState {
    pub state: bool,
}

/// `ar.session.error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// `ar.reality.request` / `ar.reality.current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealityDescriptor {
    pub uri: String,
}

impl RealityDescriptor {
    pub const EMPTY: &'static str = "reality:empty";

    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn empty() -> Self {
        Self::new(Self::EMPTY)
    }
}

/// `ar.vuforia.init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VuforiaInitOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

/// `ar.vuforia.{load,unload,activate,deactivate}DataSet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetParams {
    pub url: String,
}

/// Which hardware operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VuforiaErrorKind {
    Unavailable,
    Init,
    Deinit,
    Camera,
    Tracker,
    LoadDataSet,
    UnloadDataSet,
    ActivateDataSet,
    DeactivateDataSet,
}

/// `ar.vuforia.errorEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VuforiaErrorEvent {
    pub kind: VuforiaErrorKind,
    pub message: String,
}

/// `ar.vuforia.dataSetLoadEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetLoadEvent {
    pub url: String,
    pub trackables: Vec<String>,
}
