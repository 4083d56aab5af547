//! Tracked entities and the collection that owns them.

use std::collections::HashMap;

use plxproto::ReferenceFrame;

use crate::geometry::{Quaternion, Time, Transform, Vector3};
use crate::property::Property;

/// Well-known entity ids.
pub mod ids {
    /// The viewer's own pose, published by realities.
    pub const USER: &str = "ar.user";
    /// Recentering origin near the user.
    pub const LOCAL: &str = "ar.local";
}

/// How new entities store their poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    Constant,
    Sampled { max_samples: usize },
}

/// A named basis whose pose is defined relative to `reference_frame`.
///
/// Entities are never removed from their collection; an entity that stops
/// being tracked has its properties cleared.
#[derive(Debug, Clone)]
pub struct Entity {
    id: String,
    pub position: Property<Vector3>,
    pub orientation: Property<Quaternion>,
    pub reference_frame: ReferenceFrame,
}

impl Entity {
    pub fn new(id: impl Into<String>, mode: PropertyMode) -> Self {
        let (position, orientation) = match mode {
            PropertyMode::Constant => (Property::constant(), Property::constant()),
            PropertyMode::Sampled { max_samples } => (
                Property::sampled(max_samples),
                Property::sampled(max_samples),
            ),
        };
        Self {
            id: id.into(),
            position,
            orientation,
            reference_frame: ReferenceFrame::Fixed,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pose relative to this entity's own reference frame, if fully known.
    pub fn local_transform(&self, time: Time) -> Option<Transform> {
        let position = self.position.value_at(time)?;
        let orientation = self.orientation.value_at(time)?;
        Some(Transform::new(position, orientation))
    }

    pub fn is_known(&self, time: Time) -> bool {
        self.local_transform(time).is_some()
    }

    pub fn clear(&mut self) {
        self.position.clear();
        self.orientation.clear();
    }
}

/// Entities by id.
#[derive(Debug, Clone)]
pub struct EntityCollection {
    entities: HashMap<String, Entity>,
    mode: PropertyMode,
}

impl EntityCollection {
    pub fn new(mode: PropertyMode) -> Self {
        Self {
            entities: HashMap::new(),
            mode,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn get_or_create(&mut self, id: &str) -> &mut Entity {
        let mode = self.mode;
        self.entities
            .entry(id.to_string())
            .or_insert_with(|| Entity::new(id, mode))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}
