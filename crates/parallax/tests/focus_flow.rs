//! Focus arbitration between two applications

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use parallax::{FocusError, Parallax, ParallaxError};
use plxproto::{MessageChannel, SessionPort};

#[tokio::test]
async fn test_focus_moves_between_applications() {
    let manager = Parallax::manager(test_config());
    let first = Parallax::application(test_config());
    let second = Parallax::application(test_config());
    let s1 = connect(&manager, &first).await;
    let s2 = connect(&manager, &second).await;

    let changes = Arc::new(Mutex::new(Vec::new()));
    let c = changes.clone();
    manager.focus.focus_change_event().add_listener(move |change| {
        c.lock().unwrap().push((
            change.previous.as_ref().map(SessionPort::id),
            change.current.as_ref().map(SessionPort::id),
        ));
    });

    let blurred = Arc::new(Mutex::new(0));
    let b = blurred.clone();
    first.focus.blur_event().add_listener(move |_| *b.lock().unwrap() += 1);

    manager.focus.set_focus(&s1).unwrap();
    assert!(wait_for(|| first.focus.has_focus()).await);
    assert!(!second.focus.has_focus());

    manager.focus.set_focus(&s2).unwrap();
    assert!(wait_for(|| second.focus.has_focus() && !first.focus.has_focus()).await);
    assert_eq!(*blurred.lock().unwrap(), 1);

    // Already focused: nothing changes.
    manager.focus.set_focus(&s2).unwrap();

    assert_eq!(
        *changes.lock().unwrap(),
        vec![(None, Some(s1.id())), (Some(s1.id()), Some(s2.id()))]
    );
    assert!(manager.focus.is_focused(&s2));
}

#[tokio::test]
async fn test_closing_focused_session_releases_focus() {
    let manager = Parallax::manager(test_config());
    let app = Parallax::application(test_config());
    let session = connect(&manager, &app).await;

    manager.focus.set_focus(&session).unwrap();
    assert!(wait_for(|| app.focus.has_focus()).await);

    app.shutdown();
    assert!(wait_for(|| manager.focus.session().is_none()).await);
}

#[tokio::test]
async fn test_focus_requires_connected_session() {
    let manager = Parallax::manager(test_config());
    let (manager_side, _unused) = MessageChannel::new().into_ports();
    let pending = manager.accept(manager_side).unwrap();

    let err = manager.focus.set_focus(&pending).unwrap_err();
    assert!(matches!(
        err,
        ParallaxError::Focus(FocusError::NotConnected(id)) if id == pending.id()
    ));

    let app = Parallax::application(test_config());
    assert!(matches!(
        app.focus.set_focus(&pending),
        Err(ParallaxError::Role { .. })
    ));
}

#[tokio::test]
async fn test_manager_rejects_peer_claiming_manager_role() {
    let manager = Parallax::manager(test_config());
    let rogue = SessionPort::new();
    let (manager_side, rogue_side) = MessageChannel::new().into_ports();
    let session = manager.accept(manager_side).unwrap();
    rogue
        .open(rogue_side, plxproto::SessionConfiguration::manager())
        .unwrap();

    assert!(wait_for(|| session.is_closed()).await);
    assert!(wait_for(|| rogue.is_closed()).await);
    assert_eq!(manager.sessions.managed_count(), 0);
}
