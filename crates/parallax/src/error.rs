//! Error types for the parallax services.

use plxconf::ConfigError;
use plxproto::{RequestError, Role, SessionError};
use thiserror::Error;

use crate::focus::FocusError;
use crate::graph::GraphError;
use crate::reality::RealityError;
use crate::vuforia::VuforiaError;

/// Umbrella error returned by service operations.
#[derive(Debug, Error)]
pub enum ParallaxError {
    #[error("operation requires the {expected} role, this context is {actual}")]
    Role { expected: Role, actual: Role },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Focus(#[from] FocusError),

    #[error(transparent)]
    Reality(#[from] RealityError),

    #[error(transparent)]
    Vuforia(#[from] VuforiaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ParallaxError>;
