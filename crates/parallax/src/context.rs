//! Context service: the pose graph wired to sessions
//!
//! Manager side:
//! - `process_frame` applies an upstream [`FrameState`] (from the current
//!   reality) to the canonical graph, merges staged entities, keeps the
//!   local origin near the user, and pushes a per-session `ar.context.update`
//!   to every application that asked for entity updates
//! - `ar.context.subscribe` / `ar.context.unsubscribe` maintain each
//!   session's subscription set, dropped when the session closes
//!
//! Application side:
//! - `ar.context.update` is applied to a mirrored graph, then the update and
//!   render events fire
//! - poses are queried locally with [`ContextService::get_entity_pose`]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use plxconf::ContextConfig;
use plxproto::{
    topic, Event, FrameState, ReferenceFrame, Role, SerializedEntityPose, SerializedEntityPoseMap,
    SessionId, SessionPort, SubscribeParams,
};
use tracing::{debug, info, trace, warn};

use crate::entity::{ids, PropertyMode};
use crate::error::Result;
use crate::geometry::{Quaternion, Vector3};
use crate::graph::{PoseGraph, UpdateSummary};
use crate::pose::EntityPose;
use crate::session_service::SessionService;

struct Inner {
    sessions: SessionService,
    graph: Mutex<PoseGraph>,
    subscriptions: DashMap<SessionId, HashSet<String>>,
    staged: Mutex<SerializedEntityPoseMap>,
    local_origin: Mutex<Option<Vector3>>,
    local_origin_threshold: f64,
    last_frame: Mutex<Option<FrameState>>,
    update_event: Event<FrameState>,
    render_event: Event<FrameState>,
    local_origin_changed: Event<SerializedEntityPose>,
}

#[derive(Clone)]
pub struct ContextService {
    inner: Arc<Inner>,
}

impl ContextService {
    pub fn new(sessions: SessionService, config: &ContextConfig) -> Self {
        let mode = if config.sample_poses {
            PropertyMode::Sampled {
                max_samples: config.max_samples,
            }
        } else {
            PropertyMode::Constant
        };

        let service = Self {
            inner: Arc::new(Inner {
                sessions: sessions.clone(),
                graph: Mutex::new(PoseGraph::new(mode)),
                subscriptions: DashMap::new(),
                staged: Mutex::new(SerializedEntityPoseMap::new()),
                local_origin: Mutex::new(None),
                local_origin_threshold: config.local_origin_threshold,
                last_frame: Mutex::new(None),
                update_event: Event::new(),
                render_event: Event::new(),
                local_origin_changed: Event::new(),
            }),
        };

        if sessions.is_manager() {
            let context = service.clone();
            sessions.connect_event().add_listener(move |session| {
                context.attach_session(session);
            });
            let context = service.clone();
            sessions.disconnect_event().add_listener(move |session| {
                if context.inner.subscriptions.remove(&session.id()).is_some() {
                    debug!(session_id = %session.id(), "Dropped subscriptions");
                }
            });
        } else {
            let context = service.clone();
            let _ = sessions
                .manager()
                .on_event(topic::CONTEXT_UPDATE, move |frame: FrameState| {
                    if let Err(e) = context.apply_update(frame) {
                        warn!("Rejected context update: {}", e);
                    }
                });
        }

        service
    }

    fn graph(&self) -> std::sync::MutexGuard<'_, PoseGraph> {
        self.inner.graph.lock().expect("pose graph mutex poisoned")
    }

    /// Raised after each frame is applied, before render.
    pub fn update_event(&self) -> &Event<FrameState> {
        &self.inner.update_event
    }

    pub fn render_event(&self) -> &Event<FrameState> {
        &self.inner.render_event
    }

    /// Manager: raised with the new `ar.local` pose when it is recentered.
    pub fn local_origin_changed_event(&self) -> &Event<SerializedEntityPose> {
        &self.inner.local_origin_changed
    }

    /// Most recently applied frame, as sent to applications.
    pub fn frame(&self) -> Option<FrameState> {
        self.inner
            .last_frame
            .lock()
            .expect("last frame mutex poisoned")
            .clone()
    }

    /// Pose of `id` relative to `frame` at the current tick.
    pub fn get_entity_pose(&self, id: &str, frame: &ReferenceFrame) -> EntityPose {
        self.graph().get_pose(id, frame)
    }

    /// Pose of `id` in the fixed frame.
    pub fn get_pose(&self, id: &str) -> EntityPose {
        self.get_entity_pose(id, &ReferenceFrame::Fixed)
    }

    /// Manager: ids `session` subscribed to.
    pub fn subscriptions(&self, session: SessionId) -> HashSet<String> {
        self.inner
            .subscriptions
            .get(&session)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    /// Application: ask the manager to include `id` in our updates.
    pub async fn subscribe(&self, id: &str) -> Result<()> {
        self.inner.sessions.ensure_is_application()?;
        self.inner
            .sessions
            .manager()
            .request(topic::CONTEXT_SUBSCRIBE, SubscribeParams { id: id.to_string() })
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, id: &str) -> Result<()> {
        self.inner.sessions.ensure_is_application()?;
        self.inner
            .sessions
            .manager()
            .request(topic::CONTEXT_UNSUBSCRIBE, SubscribeParams { id: id.to_string() })
            .await?;
        Ok(())
    }

    /// Manager: merge `entities` into the next upstream frame. Entries the
    /// frame already carries win.
    pub fn stage_entities(&self, entities: SerializedEntityPoseMap) -> Result<()> {
        self.inner.sessions.ensure_is_manager()?;
        let mut staged = self.inner.staged.lock().expect("staged mutex poisoned");
        staged.extend(entities);
        Ok(())
    }

    fn attach_session(&self, session: &SessionPort) {
        if session.remote_role() != Some(Role::Application) {
            return;
        }

        let context = self.clone();
        let id = session.id();
        let subscribe = session.on_request(topic::CONTEXT_SUBSCRIBE, move |params: SubscribeParams| {
            let context = context.clone();
            async move {
                debug!(session_id = %id, entity = %params.id, "Subscribe");
                context
                    .inner
                    .subscriptions
                    .entry(id)
                    .or_default()
                    .insert(params.id);
                anyhow::Ok(())
            }
        });

        let context = self.clone();
        let unsubscribe = session.on_request(topic::CONTEXT_UNSUBSCRIBE, move |params: SubscribeParams| {
            let context = context.clone();
            async move {
                debug!(session_id = %id, entity = %params.id, "Unsubscribe");
                if let Some(mut set) = context.inner.subscriptions.get_mut(&id) {
                    set.remove(&params.id);
                }
                anyhow::Ok(())
            }
        });

        if let Err(e) = subscribe.and(unsubscribe) {
            warn!(session_id = %id, "Failed to install context handlers: {}", e);
        }
    }

    /// Manager: apply one upstream frame and fan it out.
    pub fn process_frame(&self, mut frame: FrameState) -> Result<UpdateSummary> {
        self.inner.sessions.ensure_is_manager()?;

        {
            let mut staged = self.inner.staged.lock().expect("staged mutex poisoned");
            for (id, pose) in std::mem::take(&mut *staged) {
                frame.entities.entry(id).or_insert(pose);
            }
        }

        let targets: Vec<SessionPort> = self
            .inner
            .sessions
            .managed_sessions(Some(Role::Application))
            .into_iter()
            .filter(|s| s.info().map(|c| c.capabilities.entity_updates).unwrap_or(false))
            .collect();

        let (summary, recentered, outbound) = {
            let mut graph = self.graph();
            let summary = graph.apply(&frame)?;
            let recentered = self.update_local_origin(&mut graph, &mut frame);

            let outbound: Vec<(SessionPort, FrameState)> = targets
                .into_iter()
                .map(|session| {
                    let mut entities = frame.entities.clone();
                    for id in self.subscriptions(session.id()) {
                        graph.serialize_with_ancestors(&id, &mut entities);
                    }
                    let update = FrameState {
                        entities,
                        ..frame.clone()
                    };
                    (session, update)
                })
                .collect();
            (summary, recentered, outbound)
        };

        *self.inner.last_frame.lock().expect("last frame mutex poisoned") = Some(frame.clone());

        if let Some(origin) = recentered {
            self.inner.local_origin_changed.raise(&origin);
        }
        self.inner.update_event.raise(&frame);

        for (session, update) in outbound {
            trace!(session_id = %session.id(), entities = update.entities.len(), "Context update");
            let _ = session.send(topic::CONTEXT_UPDATE, &update);
        }

        self.inner.render_event.raise(&frame);
        Ok(summary)
    }

    /// Place `ar.local` under the user, moving it only once the user has
    /// drifted past the threshold. Returns the new pose when it moved.
    fn update_local_origin(
        &self,
        graph: &mut PoseGraph,
        frame: &mut FrameState,
    ) -> Option<SerializedEntityPose> {
        let user = graph
            .relative_transform(ids::USER, &ReferenceFrame::Fixed)?
            .position;

        let mut origin = self.inner.local_origin.lock().expect("local origin mutex poisoned");
        let moved = match *origin {
            Some(current) => current.distance_squared(&user) > self.inner.local_origin_threshold,
            None => true,
        };
        if moved {
            info!(x = user.x, y = user.y, z = user.z, "Local origin recentered");
            *origin = Some(user);
        }
        let position = (*origin)?;

        let pose = SerializedEntityPose {
            p: position.to_array(),
            o: Quaternion::IDENTITY.to_array(),
            r: ReferenceFrame::Fixed,
        };
        if let Err(e) = graph.set_pose(ids::LOCAL, &pose) {
            warn!("Failed to place local origin: {}", e);
            return None;
        }
        frame.entities.insert(ids::LOCAL.to_string(), Some(pose.clone()));

        moved.then_some(pose)
    }

    /// Application: apply an update pushed by the manager.
    fn apply_update(&self, frame: FrameState) -> Result<()> {
        self.graph().apply(&frame)?;
        *self.inner.last_frame.lock().expect("last frame mutex poisoned") = Some(frame.clone());
        self.inner.update_event.raise(&frame);
        self.inner.render_event.raise(&frame);
        Ok(())
    }
}

impl std::fmt::Debug for ContextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextService")
            .field("role", &self.inner.sessions.role())
            .field("subscribers", &self.inner.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plxproto::SessionConfiguration;

    fn manager_context() -> ContextService {
        let sessions = SessionService::new(SessionConfiguration::manager());
        ContextService::new(sessions, &ContextConfig::default())
    }

    fn user_at(x: f64) -> Option<SerializedEntityPose> {
        Some(SerializedEntityPose {
            p: [x, 0.0, 0.0],
            o: [0.0, 0.0, 0.0, 1.0],
            r: ReferenceFrame::Fixed,
        })
    }

    #[test]
    fn test_local_origin_recenters_past_threshold() {
        let context = manager_context();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = changes.clone();
        context.local_origin_changed_event().add_listener(move |pose| {
            c.lock().unwrap().push(pose.p[0]);
        });

        // Threshold is 25e6 m², i.e. 5 km.
        for (tick, x) in [0.0, 100.0, 4_000.0, 6_000.0].into_iter().enumerate() {
            let frame = FrameState::new(tick as f64, tick as u64).with_entity(ids::USER, user_at(x));
            context.process_frame(frame).unwrap();
        }

        assert_eq!(*changes.lock().unwrap(), vec![0.0, 6_000.0]);
        let local = context.get_pose(ids::LOCAL);
        assert_eq!(local.position, Some(Vector3::new(6_000.0, 0.0, 0.0)));
        assert!(context.frame().unwrap().entities.contains_key(ids::LOCAL));
    }

    #[test]
    fn test_staged_entities_merge_without_overriding() {
        let context = manager_context();
        let mut staged = SerializedEntityPoseMap::new();
        staged.insert("target".into(), user_at(1.0));
        staged.insert(ids::USER.into(), user_at(99.0));
        context.stage_entities(staged).unwrap();

        let summary = context
            .process_frame(FrameState::new(1.0, 1).with_entity(ids::USER, user_at(0.0)))
            .unwrap();
        assert!(summary.added.contains("target"));
        assert_eq!(
            context.get_pose(ids::USER).position,
            Some(Vector3::new(0.0, 0.0, 0.0))
        );

        // Staged entries apply to one frame only.
        context.process_frame(FrameState::new(2.0, 2)).unwrap();
        assert!(!context.get_pose("target").is_known());
    }

    #[test]
    fn test_process_frame_requires_manager() {
        let sessions = SessionService::new(SessionConfiguration::application());
        let context = ContextService::new(sessions, &ContextConfig::default());
        assert!(context.process_frame(FrameState::new(0.0, 0)).is_err());
    }
}
