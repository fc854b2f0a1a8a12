// Error types for the simulation.
//
// Three families, matching how failures are treated at runtime:
// - `ConfigError` / `TerrainError`: load-time problems. Terrain errors are
//   usually absorbed by `Heightfield::load_or_flat`, which logs and falls
//   back to flat ground rather than failing the session.
// - `TransitionError`: a capture-state event that is illegal in the current
//   state. Returned by `Creature::apply` so tests see illegal transitions
//   instead of silent no-ops.
// - `InventoryError`: rejected send-out/recall requests. Never fatal; the
//   registry guarantees no state was mutated when one is returned.

use crate::types::{CaptureState, CreatureId};
use thiserror::Error;

/// Errors raised while loading or validating a `GameConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while building a `Heightfield`.
#[derive(Debug, Error, PartialEq)]
pub enum TerrainError {
    #[error("heightfield needs at least 2x2 samples, got {width}x{depth}")]
    TooSmall { width: usize, depth: usize },
    #[error("heightfield expects {expected} samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },
    #[error("cell size must be positive and finite, got {0}")]
    CellSize(f32),
    #[error("heightfield sample {index} is not finite")]
    NonFinite { index: usize },
}

/// Events that drive the creature capture state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A projectile locked onto the creature.
    Hit,
    /// The shake sequence finished and the roll succeeded.
    Secure,
    /// The shake sequence finished and the roll failed.
    BreakFree,
    /// One tick after breaking free, the creature resumes wandering.
    Recover,
    /// The creature was deployed as a companion.
    Deploy,
}

/// An event that has no transition from the creature's current state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{creature}: no transition for {event:?} from {from}")]
pub struct TransitionError {
    pub creature: CreatureId,
    pub from: CaptureState,
    pub event: CaptureEvent,
}

/// Rejected inventory operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InventoryError {
    #[error("inventory slot {slot} is out of range (inventory holds {len})")]
    SlotOutOfRange { slot: usize, len: usize },
    #[error("slot {out} is already out; only one companion may be deployed")]
    CompanionAlreadyOut { out: usize },
    #[error("inventory slot {slot} is not out")]
    NotOut { slot: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_message() {
        let err = TransitionError {
            creature: CreatureId(4),
            from: CaptureState::Captured,
            event: CaptureEvent::Hit,
        };
        assert_eq!(
            err.to_string(),
            "CreatureId(4): no transition for Hit from Captured"
        );
    }

    #[test]
    fn config_parse_error_wraps_serde() {
        let err: ConfigError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
