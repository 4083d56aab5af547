//! Pose propagation from the manager to applications
//!
//! Verifies:
//! - Applications see an entity as found, then lost when it goes unknown
//! - Subscribed entities are added to each update, unknown ones as null
//! - A subscribed entity that leaves the frame is reported lost
//! - The empty reality drives frames end to end

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use parallax::{ids, Parallax, PoseStatus, Vector3};
use plxproto::ReferenceFrame;

#[tokio::test]
async fn test_pose_found_then_lost() {
    let manager = Parallax::manager(test_config());
    let app = Parallax::application(test_config());
    connect(&manager, &app).await;

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let s = statuses.clone();
    let ctx = app.context.clone();
    app.context.update_event().add_listener(move |_| {
        s.lock().unwrap().push(ctx.get_pose(ids::USER).status);
    });

    manager
        .context
        .process_frame(frame(1).with_entity(ids::USER, fixed([0.0, 1.6, 0.0])))
        .unwrap();
    manager
        .context
        .process_frame(frame(2).with_entity(ids::USER, fixed([0.0, 1.7, 0.0])))
        .unwrap();
    manager
        .context
        .process_frame(frame(3).with_entity(ids::USER, None))
        .unwrap();

    assert!(wait_for(|| statuses.lock().unwrap().len() == 3).await);
    let statuses = statuses.lock().unwrap().clone();
    assert_eq!(statuses[0], PoseStatus::KNOWN | PoseStatus::FOUND);
    assert_eq!(statuses[1], PoseStatus::KNOWN);
    assert_eq!(statuses[2], PoseStatus::UNKNOWN | PoseStatus::LOST);
    assert!(app.context.get_pose(ids::USER).position.is_none());
}

#[tokio::test]
async fn test_subscriptions_extend_the_update() {
    let manager = Parallax::manager(test_config());
    let app = Parallax::application(test_config());
    let session = connect(&manager, &app).await;

    app.context.subscribe("ghost").await.unwrap();
    assert!(manager.context.subscriptions(session.id()).contains("ghost"));

    manager
        .context
        .process_frame(
            frame(1)
                .with_entity(ids::USER, fixed([2.0, 0.0, 0.0]))
                .with_entity("cup", relative_to(ids::USER, [0.0, 0.0, -1.0])),
        )
        .unwrap();

    assert!(wait_for(|| app.context.frame().map(|f| f.frame_number) == Some(1)).await);
    let update = app.context.frame().unwrap();
    assert!(update.entities.contains_key("cup"));
    assert!(update.entities.contains_key(ids::USER));
    // Subscribed but never seen: sent as unknown.
    assert_eq!(update.entities.get("ghost"), Some(&None));

    let cup = app.context.get_pose("cup");
    assert!(cup.is_known());
    assert!(cup
        .position
        .unwrap()
        .approx_eq(&Vector3::new(2.0, 0.0, -1.0), 1e-9));

    let relative = app
        .context
        .get_entity_pose("cup", &ReferenceFrame::entity(ids::USER));
    assert!(relative
        .position
        .unwrap()
        .approx_eq(&Vector3::new(0.0, 0.0, -1.0), 1e-9));

    app.context.unsubscribe("ghost").await.unwrap();
    assert!(manager.context.subscriptions(session.id()).is_empty());

    app.shutdown();
    assert!(wait_for(|| manager.sessions.managed_count() == 0).await);
}

#[tokio::test]
async fn test_subscribed_entity_absent_from_frame_is_lost() {
    let manager = Parallax::manager(test_config());
    let app = Parallax::application(test_config());
    connect(&manager, &app).await;
    app.context.subscribe("E1").await.unwrap();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let s = statuses.clone();
    let ctx = app.context.clone();
    app.context.update_event().add_listener(move |_| {
        s.lock().unwrap().push(ctx.get_pose("E1").status);
    });

    manager
        .context
        .process_frame(frame(1).with_entity("E1", fixed([1.0, 0.0, 0.0])))
        .unwrap();
    assert!(wait_for(|| statuses.lock().unwrap().len() == 1).await);
    manager.context.process_frame(frame(2)).unwrap();
    assert!(wait_for(|| statuses.lock().unwrap().len() == 2).await);

    let statuses = statuses.lock().unwrap().clone();
    assert_eq!(
        statuses,
        vec![
            PoseStatus::KNOWN | PoseStatus::FOUND,
            PoseStatus::UNKNOWN | PoseStatus::LOST,
        ]
    );
}

#[tokio::test]
async fn test_empty_reality_drives_frames() {
    let manager = Parallax::manager(test_config());
    let app = Parallax::application(test_config());
    connect(&manager, &app).await;

    manager.install_default_reality().unwrap();
    assert!(wait_for(|| app.context.get_pose(ids::USER).is_known()).await);

    let user = app.context.get_pose(ids::USER).position.unwrap();
    assert!((user.y - 1.6).abs() < 1e-9);
    assert!(app.context.get_pose(ids::LOCAL).is_known());
    assert_eq!(
        app.reality.current_reality().map(|r| r.uri),
        Some("reality:empty".to_string())
    );

    manager.shutdown();
    assert!(wait_for(|| !app.sessions.manager().is_open()).await);
}
