//! Entity pose graph
//!
//! Holds the canonical entities for one context and applies one
//! [`FrameState`] per tick:
//!
//! 1. Reference edges are validated against the existing graph; a cycle
//!    rejects the whole frame before anything is touched.
//! 2. Present entities are updated in place, ancestors first, creating any
//!    referenced entity that has not been seen yet.
//! 3. Entities present last tick but absent (or `null`) now are cleared.
//!
//! Pose queries walk the reference chain to the fixed root and are memoized
//! per `(entity, frame)` until the next tick.

use std::collections::{BTreeSet, HashMap, HashSet};

use plxproto::{FrameState, ReferenceFrame, SerializedEntityPose, SerializedEntityPoseMap};
use thiserror::Error;
use tracing::{debug, trace};

use crate::entity::{Entity, EntityCollection, PropertyMode};
use crate::geometry::{Quaternion, Time, Transform, Vector3};
use crate::pose::{EntityPose, PoseStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("reference cycle through entity {0}")]
    ReferenceCycle(String),
}

/// Presence changes produced by one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Ids known this tick but not last tick.
    pub added: BTreeSet<String>,
    /// Ids known last tick but not this tick.
    pub removed: BTreeSet<String>,
}

impl UpdateSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
pub struct PoseGraph {
    entities: EntityCollection,
    time: Time,
    frame_number: u64,
    /// Ids updated during the current tick.
    known: HashSet<String>,
    /// Memoized queries for the current tick.
    pose_cache: HashMap<String, EntityPose>,
    /// Keys whose last query was KNOWN, across ticks. A missing key is UNKNOWN.
    last_status: HashMap<String, PoseStatus>,
}

impl PoseGraph {
    pub fn new(mode: PropertyMode) -> Self {
        Self {
            entities: EntityCollection::new(mode),
            time: Time::default(),
            frame_number: 0,
            known: HashSet::new(),
            pose_cache: HashMap::new(),
            last_status: HashMap::new(),
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn entities(&self) -> &EntityCollection {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_or_create(&mut self, id: &str) -> &mut Entity {
        self.entities.get_or_create(id)
    }

    /// Ids updated during the current tick.
    pub fn known_ids(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    /// Apply one tick.
    pub fn apply(&mut self, frame: &FrameState) -> Result<UpdateSummary, GraphError> {
        self.check_cycles(&frame.entities)?;

        self.time = Time(frame.time);
        self.frame_number = frame.frame_number;
        self.pose_cache.clear();

        let previous = std::mem::take(&mut self.known);
        let mut visited = HashSet::new();
        for id in frame.entities.keys() {
            self.update_entity(id, &frame.entities, &mut visited);
        }

        let mut summary = UpdateSummary::default();
        for id in &self.known {
            if !previous.contains(id) {
                summary.added.insert(id.clone());
            }
        }
        for id in previous {
            if !self.known.contains(&id) {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.clear();
                }
                summary.removed.insert(id);
            }
        }

        if !summary.is_empty() {
            debug!(
                frame_number = self.frame_number,
                added = ?summary.added,
                removed = ?summary.removed,
                "Entity presence changed"
            );
        }

        Ok(summary)
    }

    /// Set one entity's pose within the current tick, outside of `apply`.
    pub fn set_pose(&mut self, id: &str, pose: &SerializedEntityPose) -> Result<(), GraphError> {
        let mut single = SerializedEntityPoseMap::new();
        single.insert(id.to_string(), Some(pose.clone()));
        self.check_cycles(&single)?;

        self.write_pose(id, Some(pose));
        self.known.insert(id.to_string());
        self.pose_cache.clear();
        Ok(())
    }

    fn update_entity(
        &mut self,
        id: &str,
        incoming: &SerializedEntityPoseMap,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(id.to_string()) {
            return;
        }

        let pose = incoming.get(id).and_then(Option::as_ref);
        if let Some(ReferenceFrame::Entity(parent)) = pose.map(|p| &p.r) {
            if incoming.contains_key(parent.as_str()) {
                self.update_entity(parent, incoming, visited);
            } else {
                self.entities.get_or_create(parent);
            }
        }

        self.write_pose(id, pose);
        if pose.is_some() {
            self.known.insert(id.to_string());
        }
    }

    fn write_pose(&mut self, id: &str, pose: Option<&SerializedEntityPose>) {
        let time = self.time;
        let entity = self.entities.get_or_create(id);
        match pose {
            Some(pose) => {
                entity.reference_frame = pose.r.clone();
                entity.position.set(time, Some(Vector3::from(pose.p)));
                entity
                    .orientation
                    .set(time, Some(Quaternion::from(pose.o).normalize()));
            }
            None => entity.clear(),
        }
    }

    /// Reject `incoming` if its edges, layered over the current graph,
    /// contain a cycle.
    fn check_cycles(&self, incoming: &SerializedEntityPoseMap) -> Result<(), GraphError> {
        let parent_of = |id: &str| -> Option<String> {
            match incoming.get(id) {
                Some(Some(pose)) => pose.r.entity_id().map(str::to_string),
                _ => self
                    .entities
                    .get(id)
                    .and_then(|e| e.reference_frame.entity_id().map(str::to_string)),
            }
        };

        for (id, pose) in incoming {
            if pose.is_none() {
                continue;
            }
            let mut seen = HashSet::new();
            let mut cursor = Some(id.clone());
            while let Some(current) = cursor {
                if !seen.insert(current.clone()) {
                    return Err(GraphError::ReferenceCycle(id.clone()));
                }
                cursor = parent_of(&current);
            }
        }
        Ok(())
    }

    /// Transform from `id`'s basis to the fixed root, if the whole chain is
    /// known at the current time.
    fn fixed_transform(&self, id: &str) -> Option<Transform> {
        let mut transform = Transform::IDENTITY;
        let mut cursor = id;
        // A chain longer than the entity count means a cycle slipped in.
        for _ in 0..=self.entities.len() {
            let entity = self.entities.get(cursor)?;
            transform = entity.local_transform(self.time)?.compose(&transform);
            match &entity.reference_frame {
                ReferenceFrame::Fixed => return Some(transform),
                ReferenceFrame::Entity(parent) => cursor = parent,
            }
        }
        None
    }

    fn frame_transform(&self, frame: &ReferenceFrame) -> Option<Transform> {
        match frame {
            ReferenceFrame::Fixed => Some(Transform::IDENTITY),
            ReferenceFrame::Entity(id) => self.fixed_transform(id),
        }
    }

    /// Transform of `id` relative to `frame`, without recording a query.
    pub fn relative_transform(&self, id: &str, frame: &ReferenceFrame) -> Option<Transform> {
        let entity = self.fixed_transform(id)?;
        let basis = self.frame_transform(frame)?;
        Some(basis.inverse().compose(&entity))
    }

    /// Pose of `id` relative to `frame` at the current tick.
    pub fn get_pose(&mut self, id: &str, frame: &ReferenceFrame) -> EntityPose {
        let key = format!("{}@{}", id, frame);
        if let Some(cached) = self.pose_cache.get(&key) {
            return cached.clone();
        }

        let relative = self.relative_transform(id, frame);

        let previous = self
            .last_status
            .get(&key)
            .copied()
            .unwrap_or(PoseStatus::UNKNOWN);
        let status = PoseStatus::transition(previous, relative.is_some());
        if status.is_known() {
            self.last_status.insert(key.clone(), PoseStatus::KNOWN);
        } else {
            self.last_status.remove(&key);
        }

        trace!(entity = %id, frame = %frame, status = ?status, "Pose query");

        let pose = EntityPose {
            time: self.time,
            reference_frame: frame.clone(),
            status,
            position: relative.map(|t| t.position),
            orientation: relative.map(|t| t.orientation),
        };
        self.pose_cache.insert(key, pose.clone());
        pose
    }

    /// Serialize `id` relative to its own reference frame, then each entity
    /// ancestor in turn, into `out`. Ids already in `out` are left alone.
    pub fn serialize_with_ancestors(&self, id: &str, out: &mut SerializedEntityPoseMap) {
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor.take() {
            if out.contains_key(&current) {
                break;
            }
            let serialized = self.serialize_entity(&current);
            cursor = serialized
                .as_ref()
                .and_then(|p| p.r.entity_id().map(str::to_string));
            out.insert(current, serialized);
        }
    }

    pub fn serialize_entity(&self, id: &str) -> Option<SerializedEntityPose> {
        let entity = self.entities.get(id)?;
        let transform = entity.local_transform(self.time)?;
        Some(SerializedEntityPose {
            p: transform.position.to_array(),
            o: transform.orientation.to_array(),
            r: entity.reference_frame.clone(),
        })
    }
}
