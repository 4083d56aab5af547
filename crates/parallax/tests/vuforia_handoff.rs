//! Tracking hardware hand-off between applications
//!
//! Verifies:
//! - The previous controller is torn down before the next one is set up
//! - Requests from non-controlling sessions are recorded, not executed
//! - Init failures release control and reach the requester
//! - A closing controller is torn down
//! - Faults during teardown reach the session being torn down
//! - Malformed replies surface as decode errors

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use parallax::{Parallax, ParallaxError, RealityLoader, VuforiaClient};
use plxconf::PlxConfig;
use plxproto::{
    topic, MessageChannel, RequestError, SerializedEntityPoseMap, SessionConfiguration,
    SessionPort, VuforiaErrorKind, VuforiaInitOptions,
};
use serde_json::{json, Value};

fn manager_with(delegate: &Arc<RecordingDelegate>, config: PlxConfig) -> Parallax {
    let loader = RealityLoader::empty(config.frame_interval());
    Parallax::manager_with(config, loader, Some(delegate.clone()))
}

fn key(key: &str) -> VuforiaInitOptions {
    VuforiaInitOptions {
        license_key: Some(key.to_string()),
    }
}

fn client(app: &Parallax) -> &VuforiaClient {
    app.vuforia_client.as_ref().unwrap()
}

#[tokio::test]
async fn test_focus_change_hands_off_control() {
    let delegate = RecordingDelegate::new();
    let manager = manager_with(&delegate, test_config());
    let a = Parallax::application(test_config());
    let b = Parallax::application(test_config());
    connect(&manager, &a).await;
    let sb = connect(&manager, &b).await;

    let loaded = Arc::new(Mutex::new(Vec::new()));
    let l = loaded.clone();
    client(&a).data_set_loaded_event().add_listener(move |event| {
        l.lock().unwrap().push(event.url.clone());
    });

    client(&a).init(key("key-a")).await.unwrap();
    client(&a).start_camera().await.unwrap();
    let trackables = client(&a).load_data_set("stones.xml").await.unwrap();
    assert_eq!(trackables, Some(vec!["stones".to_string(), "chips".to_string()]));
    assert!(wait_for(|| loaded.lock().unwrap().len() == 1).await);

    // Not focused and not controlling: only recorded.
    client(&b).init(key("key-b")).await.unwrap();
    client(&b).start_tracker().await.unwrap();
    assert_eq!(delegate.calls().len(), 3);

    manager.focus.set_focus(&sb).unwrap();

    assert!(wait_for(|| delegate.calls().len() == 8).await);
    assert_eq!(
        delegate.calls(),
        vec![
            "init:key-a",
            "startCamera",
            "load:stones.xml",
            "unload:stones.xml",
            "stopCamera",
            "deinit",
            "init:key-b",
            "startTracker",
        ]
    );
    let vuforia = manager.vuforia.as_ref().unwrap();
    assert_eq!(vuforia.controlling_session(), Some(sb));
}

#[tokio::test]
async fn test_focused_init_takes_control() {
    let delegate = RecordingDelegate::new();
    let manager = manager_with(&delegate, test_config());
    let a = Parallax::application(test_config());
    let b = Parallax::application(test_config());
    connect(&manager, &a).await;
    let sb = connect(&manager, &b).await;

    client(&a).init(key("key-a")).await.unwrap();

    // b has no init options yet, so focus alone changes nothing.
    manager.focus.set_focus(&sb).unwrap();
    assert!(wait_for(|| b.focus.has_focus()).await);
    assert_eq!(delegate.calls(), vec!["init:key-a"]);

    client(&b).init(key("key-b")).await.unwrap();
    assert_eq!(delegate.calls(), vec!["init:key-a", "deinit", "init:key-b"]);

    // The state of a is never replayed for b.
    let state = manager.vuforia.as_ref().unwrap().session_state(sb.id()).unwrap();
    assert!(!state.camera);
}

#[tokio::test]
async fn test_non_controlling_requests_are_recorded() {
    let delegate = RecordingDelegate::new();
    let mut config = test_config();
    config.vuforia.license_key = Some("site-key".to_string());
    let manager = manager_with(&delegate, config);
    let a = Parallax::application(test_config());
    let b = Parallax::application(test_config());
    connect(&manager, &a).await;
    let sb = connect(&manager, &b).await;

    assert!(client(&b).is_available().await.unwrap());

    client(&a).init(VuforiaInitOptions::default()).await.unwrap();
    assert_eq!(delegate.calls(), vec!["init:site-key"]);

    assert_eq!(client(&b).load_data_set("chips.xml").await.unwrap(), None);
    client(&b).activate_data_set("chips.xml").await.unwrap();
    assert_eq!(delegate.calls(), vec!["init:site-key"]);

    let state = manager.vuforia.as_ref().unwrap().session_state(sb.id()).unwrap();
    let chips = state.data_sets.get("chips.xml").unwrap();
    assert!(chips.loaded && chips.active);
}

#[tokio::test]
async fn test_init_failure_releases_control() {
    let delegate = RecordingDelegate::new();
    let manager = manager_with(&delegate, test_config());
    let a = Parallax::application(test_config());
    connect(&manager, &a).await;

    let kinds = Arc::new(Mutex::new(Vec::new()));
    let k = kinds.clone();
    client(&a).error_event().add_listener(move |event| {
        k.lock().unwrap().push(event.kind);
    });

    delegate.fail_init(true);
    let err = client(&a).init(key("expired")).await.unwrap_err();
    assert!(matches!(err, ParallaxError::Request(_)));
    assert!(wait_for(|| kinds.lock().unwrap().as_slice() == [VuforiaErrorKind::Init]).await);

    let vuforia = manager.vuforia.as_ref().unwrap();
    assert!(vuforia.controlling_session().is_none());

    delegate.fail_init(false);
    client(&a).init(key("renewed")).await.unwrap();
    assert!(vuforia.controlling_session().is_some());
}

#[tokio::test]
async fn test_teardown_fault_reaches_previous_controller() {
    let delegate = RecordingDelegate::new();
    let manager = manager_with(&delegate, test_config());
    let a = Parallax::application(test_config());
    let b = Parallax::application(test_config());
    connect(&manager, &a).await;
    let sb = connect(&manager, &b).await;

    let errors_a = Arc::new(Mutex::new(Vec::new()));
    let errors_b = Arc::new(Mutex::new(Vec::new()));
    let ea = errors_a.clone();
    client(&a).error_event().add_listener(move |event| {
        ea.lock().unwrap().push(event.kind);
    });
    let eb = errors_b.clone();
    client(&b).error_event().add_listener(move |event| {
        eb.lock().unwrap().push(event.kind);
    });

    client(&a).init(key("key-a")).await.unwrap();
    delegate.error_on_deinit(true);

    manager.focus.set_focus(&sb).unwrap();
    assert!(wait_for(|| b.focus.has_focus()).await);
    client(&b).init(key("key-b")).await.unwrap();
    assert_eq!(delegate.calls(), vec!["init:key-a", "deinit", "init:key-b"]);

    assert!(wait_for(|| errors_a.lock().unwrap().as_slice() == [VuforiaErrorKind::Deinit]).await);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(errors_b.lock().unwrap().is_empty());

    let vuforia = manager.vuforia.as_ref().unwrap();
    assert_eq!(vuforia.controlling_session(), Some(sb));
}

#[tokio::test]
async fn test_closing_controller_is_torn_down() {
    let delegate = RecordingDelegate::new();
    let manager = manager_with(&delegate, test_config());
    let a = Parallax::application(test_config());
    let sa = connect(&manager, &a).await;

    client(&a).init(key("key-a")).await.unwrap();
    client(&a).start_camera().await.unwrap();
    client(&a).start_tracker().await.unwrap();

    a.shutdown();
    assert!(wait_for(|| delegate.calls().last().map(String::as_str) == Some("deinit")).await);
    assert_eq!(
        delegate.calls(),
        vec!["init:key-a", "startCamera", "startTracker", "stopTracker", "stopCamera", "deinit"]
    );

    let vuforia = manager.vuforia.as_ref().unwrap();
    assert!(vuforia.controlling_session().is_none());
    assert!(vuforia.session_state(sa.id()).is_none());
}

#[tokio::test]
async fn test_trackable_updates_join_the_next_frame() {
    let delegate = RecordingDelegate::new();
    let manager = manager_with(&delegate, test_config());
    let a = Parallax::application(test_config());
    connect(&manager, &a).await;

    let mut trackables = SerializedEntityPoseMap::new();
    trackables.insert("stones".to_string(), fixed([0.0, 0.0, -2.0]));
    delegate.sink().update(trackables);

    manager.context.process_frame(frame(1)).unwrap();
    assert!(wait_for(|| a.context.get_pose("stones").is_known()).await);
}

#[tokio::test]
async fn test_malformed_replies_are_decode_errors() {
    let manager = SessionPort::new();
    manager
        .on_request(topic::vuforia::IS_AVAILABLE, |_: Value| async { anyhow::Ok(json!("yes")) })
        .unwrap();
    manager
        .on_request(topic::vuforia::LOAD_DATA_SET, |_: Value| async {
            anyhow::Ok(json!({ "trackables": 3 }))
        })
        .unwrap();

    let app = Parallax::application(test_config());
    let (manager_side, app_side) = MessageChannel::new().into_ports();
    manager.open(manager_side, SessionConfiguration::manager()).unwrap();
    app.connect(app_side).unwrap();
    assert!(wait_for(|| app.sessions.manager().is_connected()).await);

    let err = client(&app).is_available().await.unwrap_err();
    assert!(matches!(err, ParallaxError::Request(RequestError::Decode(_))), "{err:?}");

    let err = client(&app).load_data_set("stones.xml").await.unwrap_err();
    assert!(matches!(err, ParallaxError::Request(RequestError::Decode(_))), "{err:?}");
}
