//! Reality loading and selection
//!
//! A reality is a peer session with the `reality` role that publishes
//! `ar.reality.frameState`. The manager installs one at a time; frames from
//! the installed reality drive [`ContextService::process_frame`].
//!
//! `reality:empty` runs in-process on a [`FrameLoop`], publishing only the
//! user's pose. Any other uri is handed to a [`HostedConnector`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plxproto::{
    topic, Event, FrameState, MessageChannel, MessagePort, RealityDescriptor, ReferenceFrame,
    Role, SerializedEntityPose, SessionConfiguration, SessionPort,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::context::ContextService;
use crate::entity::ids;
use crate::error::Result;
use crate::focus::FocusService;
use crate::geometry::Time;
use crate::scheduler::FrameLoop;
use crate::session_service::SessionService;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RealityError {
    #[error("no loader for reality {0}")]
    Unsupported(String),
    #[error("failed to connect to reality {uri}: {message}")]
    Connect { uri: String, message: String },
    #[error("only the focused session may change the reality")]
    NotFocused,
}

/// Opens a channel to a reality hosted elsewhere.
pub trait HostedConnector: Send + Sync + 'static {
    fn connect(&self, descriptor: &RealityDescriptor) -> std::result::Result<MessagePort, RealityError>;
}

/// Eye height of the user in the empty reality, meters.
const EMPTY_REALITY_EYE_HEIGHT: f64 = 1.6;

/// How realities are started.
#[derive(Clone)]
pub enum RealityLoader {
    /// Only `reality:empty`.
    Empty { frame_interval: Duration },
    /// `reality:empty` in-process, everything else through the connector.
    Hosted {
        frame_interval: Duration,
        connector: Arc<dyn HostedConnector>,
    },
}

impl RealityLoader {
    pub fn empty(frame_interval: Duration) -> Self {
        RealityLoader::Empty { frame_interval }
    }

    pub fn hosted(frame_interval: Duration, connector: Arc<dyn HostedConnector>) -> Self {
        RealityLoader::Hosted {
            frame_interval,
            connector,
        }
    }

    fn frame_interval(&self) -> Duration {
        match self {
            RealityLoader::Empty { frame_interval } => *frame_interval,
            RealityLoader::Hosted { frame_interval, .. } => *frame_interval,
        }
    }

    /// Start the reality and return the manager's session for it.
    pub fn load(
        &self,
        descriptor: &RealityDescriptor,
        sessions: &SessionService,
    ) -> Result<SessionPort> {
        if descriptor.uri == RealityDescriptor::EMPTY {
            let (manager_side, reality_side) = MessageChannel::new().into_ports();
            let session = sessions.open_managed(manager_side)?;
            EmptyReality::start(reality_side, self.frame_interval())?;
            return Ok(session);
        }

        match self {
            RealityLoader::Empty { .. } => {
                Err(RealityError::Unsupported(descriptor.uri.clone()).into())
            }
            RealityLoader::Hosted { connector, .. } => {
                let port = connector.connect(descriptor)?;
                Ok(sessions.open_managed(port)?)
            }
        }
    }
}

impl std::fmt::Debug for RealityLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealityLoader::Empty { frame_interval } => f
                .debug_struct("Empty")
                .field("frame_interval", frame_interval)
                .finish(),
            RealityLoader::Hosted { frame_interval, .. } => f
                .debug_struct("Hosted")
                .field("frame_interval", frame_interval)
                .finish_non_exhaustive(),
        }
    }
}

/// In-process reality publishing a stationary user.
struct EmptyReality;

impl EmptyReality {
    fn start(port: MessagePort, interval: Duration) -> Result<()> {
        let session = SessionPort::new();
        session.open(port, SessionConfiguration::reality())?;

        let publisher = session.clone();
        let frames = FrameLoop::spawn(interval, move |frame_number| {
            let frame = FrameState::new(Time::now().seconds(), frame_number).with_entity(
                ids::USER,
                Some(SerializedEntityPose {
                    p: [0.0, EMPTY_REALITY_EYE_HEIGHT, 0.0],
                    o: [0.0, 0.0, 0.0, 1.0],
                    r: ReferenceFrame::Fixed,
                }),
            );
            let frame = FrameState {
                reality: Some(RealityDescriptor::EMPTY.to_string()),
                ..frame
            };
            matches!(publisher.send(topic::REALITY_FRAME_STATE, &frame), Ok(true))
        });
        frames.stop_on_close(&session);

        debug!(session_id = %session.id(), "Empty reality started");
        Ok(())
    }
}

struct Installed {
    descriptor: RealityDescriptor,
    session: SessionPort,
}

struct Inner {
    sessions: SessionService,
    context: ContextService,
    focus: FocusService,
    loader: RealityLoader,
    current: Mutex<Option<Installed>>,
    /// Application side: last uri announced by the manager.
    announced: Mutex<Option<RealityDescriptor>>,
    changed: Event<RealityDescriptor>,
}

#[derive(Clone)]
pub struct RealityService {
    inner: Arc<Inner>,
}

impl RealityService {
    pub fn new(
        sessions: SessionService,
        context: ContextService,
        focus: FocusService,
        loader: RealityLoader,
    ) -> Self {
        let service = Self {
            inner: Arc::new(Inner {
                sessions: sessions.clone(),
                context,
                focus,
                loader,
                current: Mutex::new(None),
                announced: Mutex::new(None),
                changed: Event::new(),
            }),
        };

        if sessions.is_manager() {
            let reality = service.clone();
            sessions.connect_event().add_listener(move |session| {
                reality.attach_session(session);
            });
        } else {
            let reality = service.clone();
            let _ = sessions
                .manager()
                .on_event(topic::REALITY_CURRENT, move |descriptor: RealityDescriptor| {
                    reality.announce(descriptor);
                });
        }

        service
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Option<Installed>> {
        self.inner.current.lock().expect("reality mutex poisoned")
    }

    /// Raised when the installed (manager) or announced (application)
    /// reality changes.
    pub fn changed_event(&self) -> &Event<RealityDescriptor> {
        &self.inner.changed
    }

    /// The installed reality on the manager, the announced one elsewhere.
    pub fn current_reality(&self) -> Option<RealityDescriptor> {
        if self.inner.sessions.is_manager() {
            self.current().as_ref().map(|i| i.descriptor.clone())
        } else {
            self.inner
                .announced
                .lock()
                .expect("reality mutex poisoned")
                .clone()
        }
    }

    /// Manager: the session of the installed reality.
    pub fn session(&self) -> Option<SessionPort> {
        self.current().as_ref().map(|i| i.session.clone())
    }

    /// Manager: replace the installed reality.
    pub fn install(&self, descriptor: RealityDescriptor) -> Result<()> {
        self.inner.sessions.ensure_is_manager()?;

        let previous = self.current().take();
        if let Some(previous) = previous {
            info!(uri = %previous.descriptor.uri, "Closing reality");
            previous.session.close();
        }

        let session = self.inner.loader.load(&descriptor, &self.inner.sessions)?;
        info!(uri = %descriptor.uri, session_id = %session.id(), "Reality installed");

        *self.current() = Some(Installed {
            descriptor: descriptor.clone(),
            session,
        });

        for app in self.inner.sessions.managed_sessions(Some(Role::Application)) {
            let _ = app.send(topic::REALITY_CURRENT, &descriptor);
        }
        self.inner.changed.raise(&descriptor);
        Ok(())
    }

    /// Application: ask the manager to switch realities. Only honored while
    /// this application holds focus.
    pub async fn request(&self, descriptor: RealityDescriptor) -> Result<()> {
        self.inner.sessions.ensure_is_application()?;
        self.inner
            .sessions
            .manager()
            .request(topic::REALITY_REQUEST, descriptor)
            .await?;
        Ok(())
    }

    /// Reality: publish one frame to the manager.
    pub fn publish_frame(&self, frame: &FrameState) -> Result<bool> {
        self.inner.sessions.ensure_is_reality()?;
        Ok(self
            .inner
            .sessions
            .manager()
            .send(topic::REALITY_FRAME_STATE, frame)?)
    }

    fn is_installed(&self, session: &SessionPort) -> bool {
        self.current()
            .as_ref()
            .map(|i| &i.session == session)
            .unwrap_or(false)
    }

    fn attach_session(&self, session: &SessionPort) {
        match session.remote_role() {
            Some(Role::Reality) => {
                let reality = self.clone();
                let source = session.clone();
                let installed = session.on_event(topic::REALITY_FRAME_STATE, move |frame: FrameState| {
                    if !reality.is_installed(&source) {
                        trace!(session_id = %source.id(), "Ignoring frame from inactive reality");
                        return;
                    }
                    if let Err(e) = reality.inner.context.process_frame(frame) {
                        warn!(session_id = %source.id(), "Dropped reality frame: {}", e);
                    }
                });
                if let Err(e) = installed {
                    warn!(session_id = %session.id(), "Failed to install reality handler: {}", e);
                }
            }
            Some(Role::Application) => {
                if let Some(descriptor) = self.current_reality() {
                    let _ = session.send(topic::REALITY_CURRENT, &descriptor);
                }

                let reality = self.clone();
                let requester = session.clone();
                let installed = session.on_request(
                    topic::REALITY_REQUEST,
                    move |descriptor: RealityDescriptor| {
                        let reality = reality.clone();
                        let requester = requester.clone();
                        async move {
                            if !reality.inner.focus.is_focused(&requester) {
                                return Err(anyhow::Error::new(RealityError::NotFocused));
                            }
                            reality.install(descriptor)?;
                            anyhow::Ok(())
                        }
                    },
                );
                if let Err(e) = installed {
                    warn!(session_id = %session.id(), "Failed to install reality handler: {}", e);
                }
            }
            _ => {}
        }
    }

    fn announce(&self, descriptor: RealityDescriptor) {
        debug!(uri = %descriptor.uri, "Reality announced");
        *self
            .inner
            .announced
            .lock()
            .expect("reality mutex poisoned") = Some(descriptor.clone());
        self.inner.changed.raise(&descriptor);
    }
}

impl std::fmt::Debug for RealityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealityService")
            .field("current", &self.current_reality())
            .field("loader", &self.inner.loader)
            .finish()
    }
}
