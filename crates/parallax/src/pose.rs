//! Pose query results.

use bitflags::bitflags;
use plxproto::ReferenceFrame;

use crate::geometry::{Quaternion, Time, Vector3};

bitflags! {
    /// Whether a pose is known, and whether that just changed.
    ///
    /// `KNOWN`/`UNKNOWN` are levels; exactly one is set. `FOUND`/`LOST` are
    /// edges, set only on the query where the level flipped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PoseStatus: u8 {
        const KNOWN = 1;
        const FOUND = 1 << 1;
        const LOST = 1 << 2;
        const UNKNOWN = 1 << 3;
    }
}

impl PoseStatus {
    /// Status for a query given the previous level of the same pair.
    pub fn transition(previous: PoseStatus, known_now: bool) -> PoseStatus {
        let was_known = previous.contains(PoseStatus::KNOWN);
        match (known_now, was_known) {
            (true, false) => PoseStatus::KNOWN | PoseStatus::FOUND,
            (true, true) => PoseStatus::KNOWN,
            (false, true) => PoseStatus::UNKNOWN | PoseStatus::LOST,
            (false, false) => PoseStatus::UNKNOWN,
        }
    }

    /// The level bits only.
    pub fn level(&self) -> PoseStatus {
        *self & (PoseStatus::KNOWN | PoseStatus::UNKNOWN)
    }

    pub fn is_known(&self) -> bool {
        self.contains(PoseStatus::KNOWN)
    }
}

/// An entity's pose relative to a reference frame at one time.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPose {
    pub time: Time,
    pub reference_frame: ReferenceFrame,
    pub status: PoseStatus,
    pub position: Option<Vector3>,
    pub orientation: Option<Quaternion>,
}

impl EntityPose {
    pub fn is_known(&self) -> bool {
        self.status.is_known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_edge_triggered() {
        let found = PoseStatus::transition(PoseStatus::UNKNOWN, true);
        assert_eq!(found, PoseStatus::KNOWN | PoseStatus::FOUND);

        let steady = PoseStatus::transition(found.level(), true);
        assert_eq!(steady, PoseStatus::KNOWN);

        let lost = PoseStatus::transition(steady.level(), false);
        assert_eq!(lost, PoseStatus::UNKNOWN | PoseStatus::LOST);

        let gone = PoseStatus::transition(lost.level(), false);
        assert_eq!(gone, PoseStatus::UNKNOWN);
    }

    #[test]
    fn test_found_and_lost_never_together() {
        for previous in [PoseStatus::KNOWN, PoseStatus::UNKNOWN] {
            for known in [true, false] {
                let s = PoseStatus::transition(previous, known);
                assert!(!(s.contains(PoseStatus::FOUND) && s.contains(PoseStatus::LOST)));
                assert_ne!(s.contains(PoseStatus::KNOWN), s.contains(PoseStatus::UNKNOWN));
            }
        }
    }
}
