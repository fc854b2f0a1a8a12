// Core types shared across the simulation.
//
// Defines the strongly-typed identifiers (`CreatureId`, `ProjectileId`,
// `SpeciesId`), the creature `CaptureState` machine states, and the registry
// `Placement` that records which container a creature id currently lives in.
// Spatial math uses `glam::Vec3`, re-exported here so the rest of the crate
// has a single import point.
//
// The coordinate system is right-handed, Y up. Terrain queries take world
// `(x, z)`; facing (`yaw`) is measured as `atan2(dx, dz)`, so yaw 0 faces +Z.
//
// **Critical constraint: determinism.** IDs are plain counters handed out by
// their owning container, never drawn from OS entropy, and they derive `Ord`
// so they can key `BTreeMap`s.

pub use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Entity IDs
// ---------------------------------------------------------------------------

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

counter_id!(
    /// Identity of a creature. Handed out by `CreatureRegistry` starting at
    /// 1 and never reused. A sent-out companion shares the id of the
    /// inventory entry it was cloned from.
    CreatureId(u32)
);
counter_id!(
    /// Identity of a thrown projectile, unique within a `ProjectileSet`.
    ProjectileId(u32)
);
counter_id!(
    /// Handle into the `SpeciesTable` arena.
    SpeciesId(u16)
);

// ---------------------------------------------------------------------------
// Capture state machine
// ---------------------------------------------------------------------------

/// Where a creature is in the wander/capture lifecycle.
///
/// `Idle` and `Walking` both wander; `Idle` is the state a creature is in
/// right after being sent out, before its first wander resample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Walking,
    Capturing,
    Captured,
    CaptureFailed,
}

impl CaptureState {
    /// True for the two wandering states.
    pub fn is_wandering(self) -> bool {
        matches!(self, Self::Idle | Self::Walking)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Walking => "Walking",
            Self::Capturing => "Capturing",
            Self::Captured => "Captured",
            Self::CaptureFailed => "CaptureFailed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Registry placement
// ---------------------------------------------------------------------------

/// Which container a creature id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// A wild creature in the active roster.
    Wild,
    /// Stored in the inventory at `slot`, not currently deployed.
    Stored { slot: usize },
    /// Stored at `slot` and also deployed as a companion in the roster.
    Companion { slot: usize },
}

impl Placement {
    /// Inventory slot, if the creature is owned at all.
    pub fn slot(self) -> Option<usize> {
        match self {
            Self::Wild => None,
            Self::Stored { slot } | Self::Companion { slot } => Some(slot),
        }
    }
}

/// Horizontal (XZ-plane) distance between two points.
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}
