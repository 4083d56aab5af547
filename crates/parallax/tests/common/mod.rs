//! Shared fixtures for the parallax integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parallax::{DelegateEventSink, Parallax, VuforiaDelegate, VuforiaError};
use plxconf::PlxConfig;
use plxproto::{
    FrameState, MessageChannel, ReferenceFrame, SerializedEntityPose, SessionPort,
    VuforiaErrorKind, VuforiaInitOptions,
};

pub const WAIT: Duration = Duration::from_secs(2);

/// Poll until `check` holds or the wait expires.
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

pub fn test_config() -> PlxConfig {
    let mut config = PlxConfig::default();
    config.reality.frame_interval_ms = 5;
    config
}

/// Connect `app` to `manager` and wait until the manager has registered it.
pub async fn connect(manager: &Parallax, app: &Parallax) -> SessionPort {
    let (manager_side, app_side) = MessageChannel::new().into_ports();
    let session = manager.accept(manager_side).unwrap();
    app.connect(app_side).unwrap();
    assert!(
        wait_for(|| manager.sessions.get(session.id()).is_some()).await,
        "manager never registered the session"
    );
    assert!(wait_for(|| app.sessions.manager().is_connected()).await);
    session
}

pub fn fixed(p: [f64; 3]) -> Option<SerializedEntityPose> {
    Some(SerializedEntityPose {
        p,
        o: [0.0, 0.0, 0.0, 1.0],
        r: ReferenceFrame::Fixed,
    })
}

pub fn relative_to(parent: &str, p: [f64; 3]) -> Option<SerializedEntityPose> {
    Some(SerializedEntityPose {
        p,
        o: [0.0, 0.0, 0.0, 1.0],
        r: ReferenceFrame::entity(parent),
    })
}

pub fn frame(number: u64) -> FrameState {
    FrameState::new(number as f64 * 0.016, number)
}

/// Delegate that logs every call and can be told to fail init.
#[derive(Default)]
pub struct RecordingDelegate {
    calls: Mutex<Vec<String>>,
    fail_init: AtomicBool,
    error_on_deinit: AtomicBool,
    sink: Mutex<Option<DelegateEventSink>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Make `deinit` report a fault through the event sink.
    pub fn error_on_deinit(&self, enabled: bool) {
        self.error_on_deinit.store(enabled, Ordering::SeqCst);
    }

    pub fn sink(&self) -> DelegateEventSink {
        self.sink.lock().unwrap().clone().expect("delegate not attached")
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl VuforiaDelegate for RecordingDelegate {
    async fn is_available(&self) -> bool {
        true
    }

    async fn init(&self, options: &VuforiaInitOptions) -> Result<(), VuforiaError> {
        let key = options.license_key.clone().unwrap_or_default();
        self.record(format!("init:{key}"));
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(VuforiaError::new(VuforiaErrorKind::Init, "invalid license key"));
        }
        Ok(())
    }

    async fn deinit(&self) -> Result<(), VuforiaError> {
        self.record("deinit");
        if self.error_on_deinit.load(Ordering::SeqCst) {
            self.sink().error(VuforiaErrorKind::Deinit, "tracker still running");
        }
        Ok(())
    }

    async fn start_camera(&self) -> Result<(), VuforiaError> {
        self.record("startCamera");
        Ok(())
    }

    async fn stop_camera(&self) -> Result<(), VuforiaError> {
        self.record("stopCamera");
        Ok(())
    }

    async fn start_tracker(&self) -> Result<(), VuforiaError> {
        self.record("startTracker");
        Ok(())
    }

    async fn stop_tracker(&self) -> Result<(), VuforiaError> {
        self.record("stopTracker");
        Ok(())
    }

    async fn load_data_set(&self, url: &str) -> Result<Vec<String>, VuforiaError> {
        self.record(format!("load:{url}"));
        Ok(vec!["stones".to_string(), "chips".to_string()])
    }

    async fn unload_data_set(&self, url: &str) -> Result<(), VuforiaError> {
        self.record(format!("unload:{url}"));
        Ok(())
    }

    async fn activate_data_set(&self, url: &str) -> Result<(), VuforiaError> {
        self.record(format!("activate:{url}"));
        Ok(())
    }

    async fn deactivate_data_set(&self, url: &str) -> Result<(), VuforiaError> {
        self.record(format!("deactivate:{url}"));
        Ok(())
    }

    fn attach(&self, sink: DelegateEventSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }
}
