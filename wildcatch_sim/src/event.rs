// Narrative simulation events.
//
// Subsystems (`registry.rs`, `projectile.rs`) push `SimEventKind` values into
// a plain `Vec` as things happen. `SimState::frame` stamps each one with the
// frame number and returns them as `SimEvent`s, so a UI log or the headless
// runner can report what happened without diffing state.
//
// See also: `sim.rs` for the frame loop that collects these, `command.rs` for
// the actions that produce the spawn/throw/send-out/recall events.
//
// **Critical constraint: determinism.** Events are emitted in processing
// order, which is itself deterministic (spawn-ordered projectiles, id-ordered
// roster), so the same run always yields the same event stream.

use crate::types::{CreatureId, ProjectileId, SpeciesId};
use serde::{Deserialize, Serialize};

/// A narrative event emitted by the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub frame: u64,
    pub kind: SimEventKind,
}

/// Things that happened during a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    CreatureSpawned {
        creature_id: CreatureId,
        species: SpeciesId,
    },
    ProjectileThrown {
        projectile_id: ProjectileId,
        speed: f32,
    },
    /// A projectile ran out of flight time without hitting anything.
    ProjectileExpired { projectile_id: ProjectileId },
    /// A projectile locked onto a creature; the catch roll is already made.
    CaptureStarted {
        creature_id: CreatureId,
        projectile_id: ProjectileId,
    },
    CaptureSucceeded { creature_id: CreatureId },
    CaptureFailed { creature_id: CreatureId },
    /// A creature left the failed state and is wandering again.
    BrokeFree { creature_id: CreatureId },
    /// A captured creature moved from the roster into an inventory slot.
    Stored { creature_id: CreatureId, slot: usize },
    SentOut { creature_id: CreatureId, slot: usize },
    Recalled { creature_id: CreatureId, slot: usize },
}

impl SimEventKind {
    /// The creature this event is about, if any.
    pub fn creature(&self) -> Option<CreatureId> {
        match self {
            Self::CreatureSpawned { creature_id, .. }
            | Self::CaptureStarted { creature_id, .. }
            | Self::CaptureSucceeded { creature_id }
            | Self::CaptureFailed { creature_id }
            | Self::BrokeFree { creature_id }
            | Self::Stored { creature_id, .. }
            | Self::SentOut { creature_id, .. }
            | Self::Recalled { creature_id, .. } => Some(*creature_id),
            Self::ProjectileThrown { .. } | Self::ProjectileExpired { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creature_accessor() {
        let stored = SimEventKind::Stored {
            creature_id: CreatureId(3),
            slot: 0,
        };
        assert_eq!(stored.creature(), Some(CreatureId(3)));
        let expired = SimEventKind::ProjectileExpired {
            projectile_id: ProjectileId(1),
        };
        assert_eq!(expired.creature(), None);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = SimEvent {
            frame: 12,
            kind: SimEventKind::CaptureStarted {
                creature_id: CreatureId(2),
                projectile_id: ProjectileId(5),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, restored);
    }
}
