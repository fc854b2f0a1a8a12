// wildcatch_sim: pure Rust creature-catching simulation library.
//
// This crate contains all simulation logic for wildcatch: terrain queries,
// wandering creatures, thrown capture projectiles and their shake/lock
// protocol, the creature roster and inventory, and procedural population. It
// has no rendering or windowing dependencies; renderers read pose snapshots
// (`CreaturePose`, `ProjectilePose`) and drive the sim through `SimAction`s
// and `SimState::frame`.
//
// Module overview:
// - `sim.rs`:        Top-level SimState, frame loop, physics substep accumulator.
// - `terrain.rs`:    Terrain trait, Heightfield (bilinear heights, central-difference normals), FlatGround.
// - `obstacle.rs`:   Static props, world-space AABBs, sphere contact.
// - `creature.rs`:   Creature, capture state transitions, wandering and obstacle avoidance.
// - `projectile.rs`: Projectile flight, bounce response, lock/shake timeline, throw model, trajectory preview.
// - `registry.rs`:   CreatureRegistry: roster, inventory, companion send-out/recall, capture trigger.
// - `scatter.rs`:    Procedural placement of obstacles and creatures on flat ground.
// - `command.rs`:    SimAction: all external mutations.
// - `event.rs`:      SimEvent: narrative events returned from each frame.
// - `config.rs`:     GameConfig: all tunable parameters, JSON-loadable.
// - `species.rs`:    SpeciesData / SpeciesTable, data-driven creature descriptors.
// - `error.rs`:      Error enums and capture-state events.
// - `prng`:          Re-exported from `wildcatch_prng`: xoshiro256++ GameRng and the RandomSource trait.
// - `types.rs`:      Entity IDs, CaptureState, Placement, Vec3 re-export.
//
// The `headless` binary (`src/bin/headless.rs`) runs a populated session
// without a renderer and logs what happens.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, actions, dt) -> (new_state, events)`. All randomness comes from a
// seeded xoshiro256++ PRNG (re-exported from `wildcatch_prng`). No `HashMap`,
// no system time, no OS entropy. Use `BTreeMap` for ordered collections.

pub mod command;
pub mod config;
pub mod creature;
pub mod error;
pub mod event;
pub mod obstacle;
pub use wildcatch_prng as prng;
pub mod projectile;
pub mod registry;
pub mod scatter;
pub mod sim;
pub mod species;
pub mod terrain;
pub mod types;
