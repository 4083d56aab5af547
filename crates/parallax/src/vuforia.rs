//! Tracking hardware arbitration
//!
//! One [`VuforiaDelegate`] drives the camera and tracker. Many applications
//! may want it; at most one (the controlling session) actually drives it.
//!
//! The manager keeps each session's desired state (init options, camera,
//! tracker, data sets). Commands from the controlling session run through a
//! [`CommandQueue`] against the delegate; commands from anyone else are only
//! recorded. Control changes hands when:
//! - a session inits while nobody controls the delegate, or while it holds
//!   focus
//! - focus moves to a session that has init options recorded
//!
//! A hand-off clears the queue, tears the previous controller down, then
//! replays the new controller's own desired state. The controller's state is
//! never copied to its successor.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use plxconf::VuforiaConfig;
use plxproto::{
    topic, DataSetLoadEvent, DataSetParams, Event, Role, SerializedEntityPoseMap, SessionId,
    SessionPort, VuforiaErrorEvent, VuforiaErrorKind, VuforiaInitOptions,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command_queue::{CommandQueue, CommandQueueError};
use crate::context::ContextService;
use crate::error::Result;
use crate::focus::{FocusChange, FocusService};
use crate::session_service::SessionService;

/// The protocol name applications advertise to use the delegate.
pub const PROTOCOL: &str = "ar.vuforia";

/// A classified hardware fault.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("vuforia {kind:?} error: {message}")]
pub struct VuforiaError {
    pub kind: VuforiaErrorKind,
    pub message: String,
}

impl VuforiaError {
    pub fn new(kind: VuforiaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn reclassify(self, kind: VuforiaErrorKind) -> Self {
        Self { kind, ..self }
    }

    pub fn to_event(&self) -> VuforiaErrorEvent {
        VuforiaErrorEvent {
            kind: self.kind,
            message: self.message.clone(),
        }
    }
}

/// Unsolicited output of a delegate.
#[derive(Debug, Clone)]
pub enum DelegateEvent {
    Error(VuforiaError),
    /// Trackable poses to merge into the next frame.
    Update(SerializedEntityPoseMap),
}

/// Where a delegate reports [`DelegateEvent`]s.
#[derive(Clone)]
pub struct DelegateEventSink {
    handler: Arc<dyn Fn(DelegateEvent) + Send + Sync>,
}

impl DelegateEventSink {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(DelegateEvent) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn emit(&self, event: DelegateEvent) {
        (self.handler)(event)
    }

    pub fn error(&self, kind: VuforiaErrorKind, message: impl Into<String>) {
        self.emit(DelegateEvent::Error(VuforiaError::new(kind, message)));
    }

    pub fn update(&self, entities: SerializedEntityPoseMap) {
        self.emit(DelegateEvent::Update(entities));
    }
}

impl std::fmt::Debug for DelegateEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateEventSink").finish_non_exhaustive()
    }
}

/// The camera/tracker driver.
#[async_trait]
pub trait VuforiaDelegate: Send + Sync + 'static {
    async fn is_available(&self) -> bool;
    async fn init(&self, options: &VuforiaInitOptions) -> std::result::Result<(), VuforiaError>;
    async fn deinit(&self) -> std::result::Result<(), VuforiaError>;
    async fn start_camera(&self) -> std::result::Result<(), VuforiaError>;
    async fn stop_camera(&self) -> std::result::Result<(), VuforiaError>;
    async fn start_tracker(&self) -> std::result::Result<(), VuforiaError>;
    async fn stop_tracker(&self) -> std::result::Result<(), VuforiaError>;
    /// Returns the names of the trackables in the data set.
    async fn load_data_set(&self, url: &str) -> std::result::Result<Vec<String>, VuforiaError>;
    async fn unload_data_set(&self, url: &str) -> std::result::Result<(), VuforiaError>;
    async fn activate_data_set(&self, url: &str) -> std::result::Result<(), VuforiaError>;
    async fn deactivate_data_set(&self, url: &str) -> std::result::Result<(), VuforiaError>;

    /// Called once when the delegate is handed to the manager.
    fn attach(&self, _sink: DelegateEventSink) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataSetState {
    pub loaded: bool,
    pub active: bool,
}

/// What a session wants the delegate to be doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VuforiaSessionState {
    pub init_options: Option<VuforiaInitOptions>,
    pub camera: bool,
    pub tracker: bool,
    pub data_sets: BTreeMap<String, DataSetState>,
}

/// Reply to `ar.vuforia.isAvailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
}

#[derive(Debug, Clone)]
enum Command {
    StartCamera,
    StopCamera,
    StartTracker,
    StopTracker,
    LoadDataSet(String),
    UnloadDataSet(String),
    ActivateDataSet(String),
    DeactivateDataSet(String),
}

impl Command {
    fn record(&self, state: &mut VuforiaSessionState) {
        match self {
            Command::StartCamera => state.camera = true,
            Command::StopCamera => state.camera = false,
            Command::StartTracker => state.tracker = true,
            Command::StopTracker => state.tracker = false,
            Command::LoadDataSet(url) => state.data_sets.entry(url.clone()).or_default().loaded = true,
            Command::UnloadDataSet(url) => {
                state.data_sets.remove(url);
            }
            Command::ActivateDataSet(url) => {
                state.data_sets.entry(url.clone()).or_default().active = true
            }
            Command::DeactivateDataSet(url) => {
                if let Some(ds) = state.data_sets.get_mut(url) {
                    ds.active = false;
                }
            }
        }
    }

    /// Run against the delegate. Loading yields the trackable names.
    async fn run(
        self,
        delegate: &dyn VuforiaDelegate,
    ) -> std::result::Result<Option<Vec<String>>, VuforiaError> {
        use VuforiaErrorKind as Kind;
        match self {
            Command::StartCamera => delegate.start_camera().await.map_err(|e| e.reclassify(Kind::Camera))?,
            Command::StopCamera => delegate.stop_camera().await.map_err(|e| e.reclassify(Kind::Camera))?,
            Command::StartTracker => delegate.start_tracker().await.map_err(|e| e.reclassify(Kind::Tracker))?,
            Command::StopTracker => delegate.stop_tracker().await.map_err(|e| e.reclassify(Kind::Tracker))?,
            Command::LoadDataSet(url) => {
                let trackables = delegate
                    .load_data_set(&url)
                    .await
                    .map_err(|e| e.reclassify(Kind::LoadDataSet))?;
                return Ok(Some(trackables));
            }
            Command::UnloadDataSet(url) => delegate
                .unload_data_set(&url)
                .await
                .map_err(|e| e.reclassify(Kind::UnloadDataSet))?,
            Command::ActivateDataSet(url) => delegate
                .activate_data_set(&url)
                .await
                .map_err(|e| e.reclassify(Kind::ActivateDataSet))?,
            Command::DeactivateDataSet(url) => delegate
                .deactivate_data_set(&url)
                .await
                .map_err(|e| e.reclassify(Kind::DeactivateDataSet))?,
        }
        Ok(None)
    }
}

type Queue = CommandQueue<SessionId, VuforiaError>;
type QueueResult<T> = std::result::Result<T, CommandQueueError<VuforiaError>>;

/// Bring the delegate up to `state`.
async fn setup(
    delegate: Arc<dyn VuforiaDelegate>,
    state: VuforiaSessionState,
    session: SessionPort,
) -> std::result::Result<(), VuforiaError> {
    let options = state.init_options.clone().unwrap_or_default();
    delegate
        .init(&options)
        .await
        .map_err(|e| e.reclassify(VuforiaErrorKind::Init))?;

    if state.camera {
        Command::StartCamera.run(delegate.as_ref()).await?;
    }
    for (url, ds) in &state.data_sets {
        if ds.loaded {
            if let Some(trackables) = Command::LoadDataSet(url.clone()).run(delegate.as_ref()).await? {
                let _ = session.send(
                    topic::vuforia::DATA_SET_LOAD_EVENT,
                    DataSetLoadEvent {
                        url: url.clone(),
                        trackables,
                    },
                );
            }
        }
        if ds.active {
            Command::ActivateDataSet(url.clone()).run(delegate.as_ref()).await?;
        }
    }
    if state.tracker {
        Command::StartTracker.run(delegate.as_ref()).await?;
    }
    Ok(())
}

/// Undo `state` and deinit. Keeps going past failures; reports the first.
async fn teardown(
    delegate: Arc<dyn VuforiaDelegate>,
    state: VuforiaSessionState,
) -> std::result::Result<(), VuforiaError> {
    let mut steps = Vec::new();
    if state.tracker {
        steps.push(Command::StopTracker);
    }
    for (url, ds) in &state.data_sets {
        if ds.active {
            steps.push(Command::DeactivateDataSet(url.clone()));
        }
        if ds.loaded {
            steps.push(Command::UnloadDataSet(url.clone()));
        }
    }
    if state.camera {
        steps.push(Command::StopCamera);
    }

    let mut first_error = None;
    for step in steps {
        if let Err(e) = step.run(delegate.as_ref()).await {
            first_error.get_or_insert(e);
        }
    }
    if let Err(e) = delegate.deinit().await {
        first_error.get_or_insert(e.reclassify(VuforiaErrorKind::Deinit));
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct Inner {
    sessions: SessionService,
    focus: FocusService,
    context: ContextService,
    delegate: Arc<dyn VuforiaDelegate>,
    queue: Queue,
    states: DashMap<SessionId, VuforiaSessionState>,
    controlling: Mutex<Option<SessionPort>>,
    default_license_key: Option<String>,
}

/// Manager-side owner of the delegate.
#[derive(Clone)]
pub struct VuforiaService {
    inner: Arc<Inner>,
}

impl VuforiaService {
    pub fn new(
        sessions: SessionService,
        focus: FocusService,
        context: ContextService,
        delegate: Arc<dyn VuforiaDelegate>,
        config: &VuforiaConfig,
    ) -> Self {
        let service = Self {
            inner: Arc::new(Inner {
                sessions: sessions.clone(),
                focus: focus.clone(),
                context,
                delegate: delegate.clone(),
                queue: Queue::new(),
                states: DashMap::new(),
                controlling: Mutex::new(None),
                default_license_key: config.license_key.clone(),
            }),
        };

        let weak = Arc::downgrade(&service.inner);
        delegate.attach(DelegateEventSink::new(move |event| {
            if let Some(service) = Self::upgrade(&weak) {
                service.on_delegate_event(event);
            }
        }));

        let weak = Arc::downgrade(&service.inner);
        service.inner.queue.error_event().add_listener(move |(owner, err)| {
            if let Some(service) = Self::upgrade(&weak) {
                service.on_command_error(*owner, err);
            }
        });

        if sessions.is_manager() {
            let weak = Arc::downgrade(&service.inner);
            sessions.connect_event().add_listener(move |session| {
                if let Some(service) = Self::upgrade(&weak) {
                    service.attach_session(session);
                }
            });

            let weak = Arc::downgrade(&service.inner);
            sessions.disconnect_event().add_listener(move |session| {
                if let Some(service) = Self::upgrade(&weak) {
                    service.on_disconnect(session);
                }
            });

            let weak = Arc::downgrade(&service.inner);
            focus.focus_change_event().add_listener(move |change| {
                if let Some(service) = Self::upgrade(&weak) {
                    service.on_focus_change(change);
                }
            });
        }

        service
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn controlling(&self) -> std::sync::MutexGuard<'_, Option<SessionPort>> {
        self.inner
            .controlling
            .lock()
            .expect("controlling session mutex poisoned")
    }

    /// The session currently driving the delegate.
    pub fn controlling_session(&self) -> Option<SessionPort> {
        self.controlling().clone()
    }

    fn is_controlling(&self, session: &SessionPort) -> bool {
        self.controlling().as_ref() == Some(session)
    }

    /// Recorded desired state for `session`.
    pub fn session_state(&self, session: SessionId) -> Option<VuforiaSessionState> {
        self.inner.states.get(&session).map(|s| s.value().clone())
    }

    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    fn state_snapshot(&self, session: SessionId) -> VuforiaSessionState {
        self.session_state(session).unwrap_or_default()
    }

    /// Record init options, and take control if allowed.
    pub async fn init(
        &self,
        session: &SessionPort,
        mut options: VuforiaInitOptions,
    ) -> QueueResult<()> {
        if options.license_key.is_none() {
            options.license_key = self.inner.default_license_key.clone();
        }
        self.inner
            .states
            .entry(session.id())
            .or_default()
            .init_options = Some(options);

        let take_control = {
            let controlling = self.controlling();
            match controlling.as_ref() {
                None => true,
                Some(current) => current == session || self.inner.focus.is_focused(session),
            }
        };

        if take_control {
            self.hand_off(session).await
        } else {
            debug!(session_id = %session.id(), "Init recorded; session is not controlling");
            Ok(())
        }
    }

    /// Forget `session`'s desired state; release control if it had it.
    pub async fn deinit(&self, session: &SessionPort) -> QueueResult<()> {
        let state = self
            .inner
            .states
            .insert(session.id(), VuforiaSessionState::default())
            .unwrap_or_default();

        let was_controlling = {
            let mut controlling = self.controlling();
            if controlling.as_ref() == Some(session) {
                controlling.take();
                true
            } else {
                false
            }
        };

        if was_controlling {
            info!(session_id = %session.id(), "Controlling session deinitialized");
            let delegate = self.inner.delegate.clone();
            self.inner
                .queue
                .push(session.id(), move || teardown(delegate, state))
                .await
        } else {
            Ok(())
        }
    }

    /// Clear the queue, tear down the previous controller, set up `next`.
    fn hand_off(
        &self,
        next: &SessionPort,
    ) -> impl std::future::Future<Output = QueueResult<()>> + Send + 'static {
        let previous = self.controlling().replace(next.clone());
        let queue = &self.inner.queue;
        queue.clear();

        info!(
            previous = ?previous.as_ref().map(|s| s.id()),
            next = %next.id(),
            "Vuforia hand-off"
        );

        if let Some(previous) = previous {
            let delegate = self.inner.delegate.clone();
            let state = self.state_snapshot(previous.id());
            // Outcome surfaces through the queue error event.
            let _ = queue.push(previous.id(), move || teardown(delegate, state));
        }

        let delegate = self.inner.delegate.clone();
        let state = self.state_snapshot(next.id());
        let session = next.clone();
        queue.push(next.id(), move || setup(delegate, state, session))
    }

    async fn command(&self, session: &SessionPort, command: Command) -> QueueResult<Option<Vec<String>>> {
        {
            let mut state = self.inner.states.entry(session.id()).or_default();
            command.record(&mut state);
        }

        if !self.is_controlling(session) {
            debug!(session_id = %session.id(), command = ?command, "Recorded; session is not controlling");
            return Ok(None);
        }

        let delegate = self.inner.delegate.clone();
        let url = match &command {
            Command::LoadDataSet(url) => Some(url.clone()),
            _ => None,
        };
        let result = self
            .inner
            .queue
            .push(session.id(), move || async move { command.run(delegate.as_ref()).await })
            .await?;

        if let (Some(url), Some(trackables)) = (url, &result) {
            let _ = session.send(
                topic::vuforia::DATA_SET_LOAD_EVENT,
                DataSetLoadEvent {
                    url,
                    trackables: trackables.clone(),
                },
            );
        }
        Ok(result)
    }

    fn on_focus_change(&self, change: &FocusChange) {
        let Some(current) = &change.current else {
            return;
        };
        let wants_control = self
            .session_state(current.id())
            .map(|s| s.init_options.is_some())
            .unwrap_or(false);
        if wants_control && !self.is_controlling(current) {
            // Outcome surfaces through the queue error event.
            let _ = self.hand_off(current);
        }
    }

    fn on_disconnect(&self, session: &SessionPort) {
        let state = self.inner.states.remove(&session.id()).map(|(_, s)| s);

        let was_controlling = {
            let mut controlling = self.controlling();
            if controlling.as_ref() == Some(session) {
                controlling.take();
                true
            } else {
                false
            }
        };

        if was_controlling {
            info!(session_id = %session.id(), "Controlling session closed; tearing down");
            self.inner.queue.clear();
            let delegate = self.inner.delegate.clone();
            let state = state.unwrap_or_default();
            let _ = self
                .inner
                .queue
                .push(session.id(), move || teardown(delegate, state));
        }
    }

    fn on_command_error(&self, owner: SessionId, err: &VuforiaError) {
        warn!(session_id = %owner, error = %err, "Vuforia command failed");

        if err.kind == VuforiaErrorKind::Init {
            let mut controlling = self.controlling();
            if controlling.as_ref().map(|s| s.id()) == Some(owner) {
                controlling.take();
            }
            drop(controlling);
            self.inner.queue.clear();
        }

        if let Some(session) = self.inner.sessions.get(owner) {
            let _ = session.send(topic::vuforia::ERROR_EVENT, err.to_event());
        }
    }

    fn on_delegate_event(&self, event: DelegateEvent) {
        match event {
            DelegateEvent::Error(err) => {
                // Mid-command faults belong to that command's owner, which
                // during a hand-off is not yet the controlling session.
                let owner = self
                    .inner
                    .queue
                    .current_owner()
                    .or_else(|| self.controlling_session().map(|s| s.id()));
                match owner {
                    Some(owner) => self.on_command_error(owner, &err),
                    None => warn!(error = %err, "Vuforia error with no owner"),
                }
            }
            DelegateEvent::Update(entities) => {
                if let Err(e) = self.inner.context.stage_entities(entities) {
                    warn!("Failed to stage trackables: {}", e);
                }
            }
        }
    }

    fn attach_session(&self, session: &SessionPort) {
        if session.remote_role() != Some(Role::Application) {
            return;
        }

        let mut results = Vec::new();

        let delegate = self.inner.delegate.clone();
        results.push(session.on_request(topic::vuforia::IS_AVAILABLE, move |_: Value| {
            let delegate = delegate.clone();
            async move {
                anyhow::Ok(Availability {
                    available: delegate.is_available().await,
                })
            }
        }));

        let service = self.clone();
        let port = session.clone();
        results.push(session.on_request(
            topic::vuforia::INIT,
            move |options: VuforiaInitOptions| {
                let service = service.clone();
                let port = port.clone();
                async move {
                    service.init(&port, options).await?;
                    anyhow::Ok(())
                }
            },
        ));

        let service = self.clone();
        let port = session.clone();
        results.push(session.on_request(topic::vuforia::DEINIT, move |_: Value| {
            let service = service.clone();
            let port = port.clone();
            async move {
                service.deinit(&port).await?;
                anyhow::Ok(())
            }
        }));

        let simple: [(&str, fn() -> Command); 4] = [
            (topic::vuforia::START_CAMERA, || Command::StartCamera),
            (topic::vuforia::STOP_CAMERA, || Command::StopCamera),
            (topic::vuforia::START_TRACKER, || Command::StartTracker),
            (topic::vuforia::STOP_TRACKER, || Command::StopTracker),
        ];
        for (name, make) in simple {
            let service = self.clone();
            let port = session.clone();
            results.push(session.on_request(name, move |_: Value| {
                let service = service.clone();
                let port = port.clone();
                async move {
                    service.command(&port, make()).await?;
                    anyhow::Ok(())
                }
            }));
        }

        let with_url: [(&str, fn(String) -> Command); 4] = [
            (topic::vuforia::LOAD_DATA_SET, Command::LoadDataSet),
            (topic::vuforia::UNLOAD_DATA_SET, Command::UnloadDataSet),
            (topic::vuforia::ACTIVATE_DATA_SET, Command::ActivateDataSet),
            (topic::vuforia::DEACTIVATE_DATA_SET, Command::DeactivateDataSet),
        ];
        for (name, make) in with_url {
            let service = self.clone();
            let port = session.clone();
            results.push(session.on_request(name, move |params: DataSetParams| {
                let service = service.clone();
                let port = port.clone();
                async move {
                    let trackables = service.command(&port, make(params.url)).await?;
                    anyhow::Ok(trackables)
                }
            }));
        }

        if let Some(Err(e)) = results.into_iter().find(|r| r.is_err()) {
            warn!(session_id = %session.id(), "Failed to install vuforia handlers: {}", e);
        }
    }
}

impl std::fmt::Debug for VuforiaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VuforiaService")
            .field("controlling", &self.controlling_session().map(|s| s.id()))
            .field("sessions", &self.inner.states.len())
            .finish()
    }
}

/// Application-side wrappers for the `ar.vuforia.*` topics.
#[derive(Clone)]
pub struct VuforiaClient {
    sessions: SessionService,
    error_event: Arc<Event<VuforiaErrorEvent>>,
    data_set_loaded: Arc<Event<DataSetLoadEvent>>,
}

impl VuforiaClient {
    pub fn new(sessions: SessionService) -> Self {
        let client = Self {
            sessions: sessions.clone(),
            error_event: Arc::new(Event::new()),
            data_set_loaded: Arc::new(Event::new()),
        };

        let errors = client.error_event.clone();
        let _ = sessions
            .manager()
            .on_event(topic::vuforia::ERROR_EVENT, move |event: VuforiaErrorEvent| {
                if errors.raise(&event) == 0 {
                    warn!(kind = ?event.kind, "Unobserved vuforia error: {}", event.message);
                }
            });

        let loaded = client.data_set_loaded.clone();
        let _ = sessions.manager().on_event(
            topic::vuforia::DATA_SET_LOAD_EVENT,
            move |event: DataSetLoadEvent| {
                loaded.raise(&event);
            },
        );

        client
    }

    pub fn error_event(&self) -> &Event<VuforiaErrorEvent> {
        &self.error_event
    }

    pub fn data_set_loaded_event(&self) -> &Event<DataSetLoadEvent> {
        &self.data_set_loaded
    }

    async fn call(&self, name: &str, payload: impl Serialize) -> Result<Value> {
        self.sessions.ensure_is_application()?;
        Ok(self.sessions.manager().request(name, payload).await?)
    }

    async fn call_as<R: DeserializeOwned>(&self, name: &str, payload: impl Serialize) -> Result<R> {
        self.sessions.ensure_is_application()?;
        Ok(self.sessions.manager().request_as(name, payload).await?)
    }

    pub async fn is_available(&self) -> Result<bool> {
        let availability: Availability = self.call_as(topic::vuforia::IS_AVAILABLE, ()).await?;
        Ok(availability.available)
    }

    pub async fn init(&self, options: VuforiaInitOptions) -> Result<()> {
        self.call(topic::vuforia::INIT, options).await.map(drop)
    }

    pub async fn deinit(&self) -> Result<()> {
        self.call(topic::vuforia::DEINIT, ()).await.map(drop)
    }

    pub async fn start_camera(&self) -> Result<()> {
        self.call(topic::vuforia::START_CAMERA, ()).await.map(drop)
    }

    pub async fn stop_camera(&self) -> Result<()> {
        self.call(topic::vuforia::STOP_CAMERA, ()).await.map(drop)
    }

    pub async fn start_tracker(&self) -> Result<()> {
        self.call(topic::vuforia::START_TRACKER, ()).await.map(drop)
    }

    pub async fn stop_tracker(&self) -> Result<()> {
        self.call(topic::vuforia::STOP_TRACKER, ()).await.map(drop)
    }

    /// Trackable names, or `None` when the request was only recorded
    /// because this session does not control the delegate.
    pub async fn load_data_set(&self, url: &str) -> Result<Option<Vec<String>>> {
        self.call_as(topic::vuforia::LOAD_DATA_SET, DataSetParams { url: url.to_string() })
            .await
    }

    pub async fn unload_data_set(&self, url: &str) -> Result<()> {
        self.call(topic::vuforia::UNLOAD_DATA_SET, DataSetParams { url: url.to_string() })
            .await
            .map(drop)
    }

    pub async fn activate_data_set(&self, url: &str) -> Result<()> {
        self.call(topic::vuforia::ACTIVATE_DATA_SET, DataSetParams { url: url.to_string() })
            .await
            .map(drop)
    }

    pub async fn deactivate_data_set(&self, url: &str) -> Result<()> {
        self.call(topic::vuforia::DEACTIVATE_DATA_SET, DataSetParams { url: url.to_string() })
            .await
            .map(drop)
    }
}

impl std::fmt::Debug for VuforiaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VuforiaClient").finish_non_exhaustive()
    }
}
