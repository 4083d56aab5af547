//! Parallax - a distributed augmented-reality context.
//!
//! One process runs the **manager**. It owns the authoritative pose graph,
//! decides which application holds focus, installs the current reality and
//! arbitrates the tracking hardware. **Applications** and **realities**
//! connect to it over [`plxproto`] sessions:
//!
//! ```text
//!   reality ──frameState──▶ manager ──context.update──▶ applications
//!                             ▲  │
//!            vuforia.* ───────┘  └──focus.state──▶ focused application
//! ```
//!
//! [`Parallax`] wires the services for one of the three roles.

pub mod command_queue;
pub mod context;
pub mod entity;
pub mod error;
pub mod focus;
pub mod geometry;
pub mod graph;
pub mod pose;
pub mod property;
pub mod reality;
pub mod scheduler;
pub mod session_service;
pub mod telemetry;
pub mod vuforia;

use std::sync::Arc;

use plxconf::PlxConfig;
use plxproto::{MessagePort, RealityDescriptor, Role, SessionConfiguration, SessionPort};
use tracing::info;

pub use command_queue::{CommandQueue, CommandQueueError};
pub use context::ContextService;
pub use entity::{ids, Entity, EntityCollection, PropertyMode};
pub use error::{ParallaxError, Result};
pub use focus::{FocusChange, FocusError, FocusService};
pub use geometry::{Quaternion, Time, Transform, Vector3};
pub use graph::{GraphError, PoseGraph, UpdateSummary};
pub use pose::{EntityPose, PoseStatus};
pub use reality::{HostedConnector, RealityError, RealityLoader, RealityService};
pub use scheduler::FrameLoop;
pub use session_service::SessionService;
pub use vuforia::{
    DelegateEvent, DelegateEventSink, VuforiaClient, VuforiaDelegate, VuforiaError,
    VuforiaService, VuforiaSessionState,
};

/// The services of one context, wired for its role.
#[derive(Debug, Clone)]
pub struct Parallax {
    pub config: PlxConfig,
    pub sessions: SessionService,
    pub context: ContextService,
    pub focus: FocusService,
    pub reality: RealityService,
    /// Manager only, and only with a delegate.
    pub vuforia: Option<VuforiaService>,
    /// Applications only.
    pub vuforia_client: Option<VuforiaClient>,
}

impl Parallax {
    /// A manager that can only load `reality:empty` and has no tracking
    /// hardware.
    pub fn manager(config: PlxConfig) -> Self {
        let loader = RealityLoader::empty(config.frame_interval());
        Self::manager_with(config, loader, None)
    }

    pub fn manager_with(
        config: PlxConfig,
        loader: RealityLoader,
        delegate: Option<Arc<dyn VuforiaDelegate>>,
    ) -> Self {
        let mut parallax = Self::build(config, SessionConfiguration::manager(), loader);
        parallax.vuforia = delegate.map(|delegate| {
            VuforiaService::new(
                parallax.sessions.clone(),
                parallax.focus.clone(),
                parallax.context.clone(),
                delegate,
                &parallax.config.vuforia,
            )
        });
        parallax
    }

    /// An application that wants entity updates and speaks `ar.vuforia`.
    pub fn application(config: PlxConfig) -> Self {
        Self::with_configuration(
            config,
            SessionConfiguration::application().with_protocol(vuforia::PROTOCOL),
        )
    }

    pub fn reality(config: PlxConfig) -> Self {
        Self::with_configuration(config, SessionConfiguration::reality())
    }

    /// A non-manager context with a custom configuration.
    pub fn with_configuration(config: PlxConfig, configuration: SessionConfiguration) -> Self {
        let loader = RealityLoader::empty(config.frame_interval());
        let is_application = configuration.role == Role::Application;
        let mut parallax = Self::build(config, configuration, loader);
        if is_application {
            parallax.vuforia_client = Some(VuforiaClient::new(parallax.sessions.clone()));
        }
        parallax
    }

    fn build(config: PlxConfig, configuration: SessionConfiguration, loader: RealityLoader) -> Self {
        let sessions = SessionService::new(configuration);
        let context = ContextService::new(sessions.clone(), &config.context);
        let focus = FocusService::new(sessions.clone());
        let reality = RealityService::new(sessions.clone(), context.clone(), focus.clone(), loader);
        Self {
            config,
            sessions,
            context,
            focus,
            reality,
            vuforia: None,
            vuforia_client: None,
        }
    }

    pub fn role(&self) -> Role {
        self.sessions.role()
    }

    /// Application or reality: open the session to the manager.
    pub fn connect(&self, port: MessagePort) -> Result<()> {
        self.sessions.connect(port)
    }

    /// Manager: accept a peer over `port`.
    pub fn accept(&self, port: MessagePort) -> Result<SessionPort> {
        self.sessions.open_managed(port)
    }

    /// Manager: install the reality named in the configuration.
    pub fn install_default_reality(&self) -> Result<()> {
        let descriptor = RealityDescriptor::new(self.config.reality.default_uri.clone());
        info!(uri = %descriptor.uri, "Installing default reality");
        self.reality.install(descriptor)
    }

    /// Close every session this context holds.
    pub fn shutdown(&self) {
        info!(role = %self.role(), "Shutting down");
        self.sessions.close_all();
    }
}
