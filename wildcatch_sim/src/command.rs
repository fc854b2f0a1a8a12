// Actions that mutate simulation state.
//
// Everything a player (or the headless runner) can do to the world goes
// through `SimAction`, applied by `SimState::apply_action` at the start of a
// frame. Current actions:
// - `SpawnCreature`: place a wild creature of a species. Speed and radius
//   default to the wander config when omitted; `y` snaps to the terrain.
// - `Throw`: launch a projectile from an eye position along an aim vector,
//   with the speed taken from a charge level in `[0, 1]`.
// - `SendOut`: deploy the inventory creature in `slot` at a position.
// - `Recall`: withdraw the companion deployed from `slot`.
//
// See also: `sim.rs` for `apply_action`, `projectile.rs` for the throw
// model, `registry.rs` for the inventory rules behind send-out and recall.
//
// **Critical constraint: determinism.** Actions are the sole external input
// to the sim. Replaying the same actions on the same frames with the same
// seed reproduces the run.

use crate::types::{SpeciesId, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimAction {
    SpawnCreature {
        species: SpeciesId,
        position: Vec3,
        speed: Option<f32>,
        radius: Option<f32>,
    },
    Throw {
        eye: Vec3,
        aim: Vec3,
        /// Throw strength in `[0, 1]`; clamped.
        charge: f32,
    },
    SendOut { slot: usize, position: Vec3 },
    Recall { slot: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serialization_roundtrip() {
        let actions = vec![
            SimAction::SpawnCreature {
                species: SpeciesId(2),
                position: Vec3::new(1.0, 0.0, -4.0),
                speed: None,
                radius: Some(0.45),
            },
            SimAction::Throw {
                eye: Vec3::new(0.0, 1.7, 0.0),
                aim: Vec3::Z,
                charge: 0.5,
            },
            SimAction::Recall { slot: 0 },
        ];
        let json = serde_json::to_string(&actions).unwrap();
        let restored: Vec<SimAction> = serde_json::from_str(&json).unwrap();
        assert_eq!(actions, restored);
    }
}
