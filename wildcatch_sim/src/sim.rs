// Core simulation state and frame loop.
//
// `SimState` is the single source of truth for a session. It owns the game
// config, the seeded PRNG, the optional terrain, the static obstacles, the
// creature registry, and the live projectiles. Each call to `frame(dt,
// actions)` advances the world by one rendered frame and returns the
// narrative events that happened.
//
// ## Frame order
//
//   1. Apply the frame's `SimAction`s (spawn, throw, send out, recall).
//   2. `advance_physics(dt)`: add `dt` to the accumulator and run fixed
//      substeps of `physics.timestep` while it holds a full step. Each
//      substep:
//        a. steps every projectile (flight or shake timeline) and applies
//           finished capture outcomes to their targets by id;
//        b. runs the capture trigger for flying projectiles;
//        c. removes spent projectiles.
//      At most `physics.max_substeps_per_frame` substeps run; leftover time
//      beyond that is discarded.
//   3. `update_all(dt)`: every roster creature advances once with the whole
//      frame `dt`.
//   4. `update_inventory`: newly captured creatures move into the inventory.
//
// Projectiles collide with the heightfield when one is loaded and with a flat
// plane at `physics.fallback_ground_y` otherwise. Creatures follow the
// heightfield when one is loaded and keep their height otherwise.
//
// ## Save/load
//
// `SimState` derives serde. The species table and the obstacle collision
// caches are `#[serde(skip)]` and rebuilt by `rebuild_transient_state()`;
// `to_json()` / `from_json()` handle the full cycle.
//
// See also: `command.rs` for `SimAction`, `event.rs` for `SimEvent`,
// `registry.rs` for the creature side of the capture protocol,
// `projectile.rs` for the projectile side, `scatter.rs` for procedural
// population.
//
// **Critical constraint: determinism.** All randomness comes from `rng`, a
// seeded `GameRng`. Creatures iterate in id order and projectiles in spawn
// order. No system time, no OS entropy.

use crate::command::SimAction;
use crate::config::GameConfig;
use crate::creature::CreaturePose;
use crate::error::{ConfigError, InventoryError};
use crate::event::{SimEvent, SimEventKind};
use crate::obstacle::{Aabb, Obstacle, obstacle_centers};
use crate::projectile::{self, ProjectilePose, ProjectileSet, StepContext};
use crate::registry::CreatureRegistry;
use crate::scatter;
use crate::species::SpeciesTable;
use crate::terrain::{FlatGround, Heightfield, Terrain};
use crate::types::{CreatureId, ProjectileId, SpeciesId, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wildcatch_prng::GameRng;

/// Top-level simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    /// Frames completed so far.
    pub frame: u64,

    /// The simulation's deterministic PRNG.
    pub rng: GameRng,

    /// Game configuration (immutable after initialization).
    pub config: GameConfig,

    /// Loaded terrain, if any.
    pub terrain: Option<Heightfield>,

    /// Static props. Change through `set_obstacles` / `scatter_obstacles`
    /// so the collision caches stay in sync.
    obstacles: Vec<Obstacle>,

    pub registry: CreatureRegistry,

    pub projectiles: ProjectileSet,

    /// Unsimulated physics time carried to the next frame.
    accumulator: f32,

    /// Species arena built from config. Not serialized.
    #[serde(skip)]
    pub species_table: SpeciesTable,

    /// Obstacle centers for creature avoidance. Not serialized.
    #[serde(skip)]
    obstacle_centers: Vec<Vec3>,

    /// Obstacle boxes for projectile collision. Not serialized.
    #[serde(skip)]
    obstacle_boxes: Vec<Aabb>,
}

/// The result of advancing one frame.
pub struct FrameResult {
    /// Narrative events emitted during this frame, in processing order.
    pub events: Vec<SimEvent>,
}

impl SimState {
    /// Create a new simulation with default config and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::build(seed, GameConfig::default())
    }

    /// Create a new simulation with a validated config.
    pub fn with_config(seed: u64, config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(seed, config))
    }

    fn build(seed: u64, config: GameConfig) -> Self {
        let species_table = config.species_table();
        Self {
            frame: 0,
            rng: GameRng::new(seed),
            config,
            terrain: None,
            obstacles: Vec::new(),
            registry: CreatureRegistry::new(),
            projectiles: ProjectileSet::new(),
            accumulator: 0.0,
            species_table,
            obstacle_centers: Vec::new(),
            obstacle_boxes: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // World setup
    // -----------------------------------------------------------------------

    pub fn set_terrain(&mut self, terrain: Option<Heightfield>) {
        self.terrain = terrain;
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn set_obstacles(&mut self, obstacles: Vec<Obstacle>) {
        self.obstacles = obstacles;
        self.rebuild_obstacle_caches();
    }

    /// Scatter `count` obstacles over the terrain. Returns how many were
    /// placed.
    pub fn scatter_obstacles(&mut self, count: usize) -> usize {
        let flat = self.fallback_ground();
        let terrain: &dyn Terrain = match &self.terrain {
            Some(field) => field,
            None => &flat,
        };
        let placed = scatter::scatter_obstacles(count, terrain, &self.config.scatter, &mut self.rng);
        let n = placed.len();
        self.obstacles.extend(placed);
        self.rebuild_obstacle_caches();
        n
    }

    /// Scatter `count` wild creatures over the terrain.
    pub fn scatter_creatures(&mut self, count: usize) -> FrameResult {
        let flat = self.fallback_ground();
        let terrain: &dyn Terrain = match &self.terrain {
            Some(field) => field,
            None => &flat,
        };
        let seeds = scatter::scatter_creatures(
            count,
            self.species_table.len(),
            terrain,
            &self.config.scatter,
            &mut self.rng,
        );

        let mut kinds = Vec::with_capacity(seeds.len());
        for seed in seeds {
            self.spawn_creature(seed.species, seed.position, seed.speed, seed.radius, &mut kinds);
        }
        self.stamp(kinds)
    }

    fn fallback_ground(&self) -> FlatGround {
        FlatGround {
            height: self.config.physics.fallback_ground_y,
        }
    }

    fn rebuild_obstacle_caches(&mut self) {
        self.obstacle_centers = obstacle_centers(&self.obstacles);
        self.obstacle_boxes = self.obstacles.iter().map(Obstacle::aabb).collect();
    }

    // -----------------------------------------------------------------------
    // Frame loop
    // -----------------------------------------------------------------------

    /// Apply `actions` and advance the world by `dt` seconds.
    ///
    /// Negative or non-finite `dt` is treated as zero.
    pub fn frame(&mut self, dt: f32, actions: &[SimAction]) -> FrameResult {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut kinds = Vec::new();

        for action in actions {
            self.apply_action(action, &mut kinds);
        }

        self.advance_physics(dt, &mut kinds);

        let wander = &self.config.wander;
        let terrain = self.terrain.as_ref().map(|t| t as &dyn Terrain);
        self.registry.update_all(
            dt,
            terrain,
            &self.obstacle_centers,
            wander,
            &mut self.rng,
            &mut kinds,
        );
        self.registry.update_inventory(&mut kinds);

        let result = self.stamp(kinds);
        self.frame += 1;
        result
    }

    /// Run as many fixed physics substeps as the accumulated time allows.
    /// Returns the number of substeps run.
    pub fn advance_physics(&mut self, dt: f32, events: &mut Vec<SimEventKind>) -> u32 {
        let h = self.config.physics.timestep;
        let max_substeps = self.config.physics.max_substeps_per_frame;
        self.accumulator += dt;

        let flat = self.fallback_ground();
        let terrain: &dyn Terrain = match &self.terrain {
            Some(field) => field,
            None => &flat,
        };
        let ctx = StepContext {
            physics: &self.config.physics,
            capture: &self.config.capture,
            terrain,
            obstacles: &self.obstacle_boxes,
        };

        let mut substeps = 0;
        while self.accumulator >= h && substeps < max_substeps {
            for resolution in self.projectiles.step(h, &ctx) {
                self.registry.resolve_capture(resolution, events);
            }
            self.registry.handle_capture_collisions(
                self.projectiles.as_mut_slice(),
                &self.species_table,
                &mut self.rng,
                events,
            );
            self.projectiles.remove_spent(ctx.capture, events);

            self.accumulator -= h;
            substeps += 1;
        }

        if self.accumulator >= h {
            debug!(dropped = self.accumulator, "physics substep cap reached");
            self.accumulator = 0.0;
        }
        substeps
    }

    fn stamp(&self, kinds: Vec<SimEventKind>) -> FrameResult {
        let frame = self.frame;
        FrameResult {
            events: kinds
                .into_iter()
                .map(|kind| SimEvent { frame, kind })
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Apply a single action. Rejected requests (unknown species, bad
    /// inventory slots) are logged and otherwise ignored.
    pub fn apply_action(&mut self, action: &SimAction, events: &mut Vec<SimEventKind>) {
        match action {
            SimAction::SpawnCreature {
                species,
                position,
                speed,
                radius,
            } => {
                if self.species_table.get(*species).is_none() {
                    warn!(%species, "spawn rejected: unknown species");
                    return;
                }
                let speed = speed.unwrap_or(self.config.wander.default_speed);
                let radius = radius.unwrap_or(self.config.wander.default_radius);
                let mut position = *position;
                if let Some(field) = &self.terrain {
                    position.y = field.height_at(position.x, position.z);
                }
                self.spawn_creature(*species, position, speed, radius, events);
            }
            SimAction::Throw { eye, aim, charge } => {
                let speed = projectile::throw_speed(*charge, &self.config.projectile);
                self.throw_projectile(*eye, *aim, speed, events);
            }
            SimAction::SendOut { slot, position } => {
                // Errors are logged by the registry.
                let _ = self.registry.send_out(*slot, *position, events);
            }
            SimAction::Recall { slot } => {
                let _ = self.registry.recall(*slot, events);
            }
        }
    }

    fn spawn_creature(
        &mut self,
        species: SpeciesId,
        position: Vec3,
        speed: f32,
        radius: f32,
        events: &mut Vec<SimEventKind>,
    ) -> CreatureId {
        let id = self.registry.spawn_creature(
            species,
            position,
            speed,
            radius,
            &self.config.wander,
            &mut self.rng,
        );
        events.push(SimEventKind::CreatureSpawned {
            creature_id: id,
            species,
        });
        id
    }

    /// Launch a projectile from `eye` along `aim` at `speed`.
    pub fn throw_projectile(
        &mut self,
        eye: Vec3,
        aim: Vec3,
        speed: f32,
        events: &mut Vec<SimEventKind>,
    ) -> ProjectileId {
        let params = &self.config.projectile;
        let (position, velocity) = projectile::launch_state(eye, aim, speed, params);
        let id = self.projectiles.spawn(position, velocity, params);
        events.push(SimEventKind::ProjectileThrown {
            projectile_id: id,
            speed,
        });
        id
    }

    /// Deploy the creature in `slot` outside the frame loop. The returned
    /// events carry the current frame number.
    pub fn send_out(
        &mut self,
        slot: usize,
        position: Vec3,
    ) -> Result<(CreatureId, FrameResult), InventoryError> {
        let mut kinds = Vec::new();
        let id = self.registry.send_out(slot, position, &mut kinds)?;
        Ok((id, self.stamp(kinds)))
    }

    /// Withdraw the companion deployed from `slot` outside the frame loop.
    pub fn recall(&mut self, slot: usize) -> Result<(CreatureId, FrameResult), InventoryError> {
        let mut kinds = Vec::new();
        let id = self.registry.recall(slot, &mut kinds)?;
        Ok((id, self.stamp(kinds)))
    }

    pub fn is_out(&self, slot: usize) -> bool {
        self.registry.is_out(slot)
    }

    // -----------------------------------------------------------------------
    // Renderer views
    // -----------------------------------------------------------------------

    pub fn creature_poses(&self) -> Vec<CreaturePose> {
        self.registry.poses(&self.species_table)
    }

    pub fn projectile_poses(&self) -> Vec<ProjectilePose> {
        self.projectiles.poses(&self.config.capture)
    }

    /// Aiming preview for a throw at `charge`.
    pub fn preview_trajectory(&self, eye: Vec3, aim: Vec3, charge: f32) -> Vec<Vec3> {
        let speed = projectile::throw_speed(charge, &self.config.projectile);
        projectile::predict_trajectory(eye, aim, speed, &self.config.physics, &self.config.projectile)
    }

    // -----------------------------------------------------------------------
    // Save/load
    // -----------------------------------------------------------------------

    /// Rebuild all `#[serde(skip)]` fields after deserialization.
    pub fn rebuild_transient_state(&mut self) {
        self.species_table = self.config.species_table();
        self.rebuild_obstacle_caches();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut state: SimState = serde_json::from_str(json)?;
        state.rebuild_transient_state();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptureState;

    fn populated(seed: u64) -> SimState {
        let mut sim = SimState::new(seed);
        let field = Heightfield::from_fn(81, 81, 0.5, |i, j| {
            (i as f32 * 0.2).sin() * 0.3 + (j as f32 * 0.15).cos() * 0.2
        })
        .unwrap();
        sim.config.scatter.range = 18.0;
        sim.set_terrain(Some(field));
        sim.scatter_obstacles(6);
        sim.scatter_creatures(8);
        sim
    }

    #[test]
    fn new_sim_is_empty() {
        let sim = SimState::new(1);
        assert_eq!(sim.frame, 0);
        assert_eq!(sim.registry.roster_len(), 0);
        assert!(sim.projectiles.is_empty());
        assert_eq!(sim.species_table.len(), 4);
    }

    #[test]
    fn with_config_rejects_invalid_config() {
        let mut config = GameConfig::default();
        config.species.clear();
        assert!(SimState::with_config(1, config).is_err());
    }

    #[test]
    fn frame_advances_counter_and_stamps_events() {
        let mut sim = SimState::new(3);
        let result = sim.frame(
            1.0 / 60.0,
            &[SimAction::SpawnCreature {
                species: SpeciesId(0),
                position: Vec3::ZERO,
                speed: None,
                radius: None,
            }],
        );
        assert_eq!(sim.frame, 1);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].frame, 0);
        assert!(matches!(
            result.events[0].kind,
            SimEventKind::CreatureSpawned { creature_id: CreatureId(1), .. }
        ));
    }

    #[test]
    fn accumulator_runs_whole_substeps() {
        let mut sim = SimState::new(3);
        sim.config.physics.timestep = 0.25;
        let mut events = Vec::new();
        // 2.5 substeps' worth runs 2 and carries the half.
        assert_eq!(sim.advance_physics(0.625, &mut events), 2);
        assert_eq!(sim.advance_physics(0.125, &mut events), 1);
        assert_eq!(sim.advance_physics(0.0, &mut events), 0);
    }

    #[test]
    fn long_stall_is_capped() {
        let mut sim = SimState::new(3);
        let mut events = Vec::new();
        let cap = sim.config.physics.max_substeps_per_frame;
        assert_eq!(sim.advance_physics(60.0, &mut events), cap);
        // The backlog was dropped, not carried.
        assert_eq!(sim.advance_physics(0.0, &mut events), 0);
    }

    #[test]
    fn bad_dt_is_ignored() {
        let mut sim = SimState::new(3);
        sim.frame(f32::NAN, &[]);
        sim.frame(-1.0, &[]);
        let mut events = Vec::new();
        assert_eq!(sim.advance_physics(0.0, &mut events), 0);
    }

    #[test]
    fn throw_action_spawns_projectile() {
        let mut sim = SimState::new(3);
        let result = sim.frame(
            0.0,
            &[SimAction::Throw {
                eye: Vec3::new(0.0, 1.7, 0.0),
                aim: Vec3::Z,
                charge: 1.0,
            }],
        );
        assert_eq!(sim.projectiles.len(), 1);
        assert!(matches!(
            result.events[0].kind,
            SimEventKind::ProjectileThrown { speed, .. } if speed == 22.0
        ));
    }

    #[test]
    fn thrown_projectile_expires_on_fallback_ground() {
        let mut sim = SimState::new(3);
        sim.config.projectile.lifetime = 0.5;
        let mut events = Vec::new();
        sim.throw_projectile(Vec3::ZERO, Vec3::Z, 6.0, &mut events);
        let mut expired = false;
        for _ in 0..60 {
            let result = sim.frame(1.0 / 60.0, &[]);
            expired |= result
                .events
                .iter()
                .any(|e| matches!(e.kind, SimEventKind::ProjectileExpired { .. }));
        }
        assert!(expired);
        assert!(sim.projectiles.is_empty());
    }

    #[test]
    fn spawn_action_snaps_to_terrain() {
        let mut sim = SimState::new(3);
        sim.set_terrain(Some(Heightfield::from_fn(9, 9, 1.0, |_, _| 2.5).unwrap()));
        sim.frame(
            0.0,
            &[SimAction::SpawnCreature {
                species: SpeciesId(1),
                position: Vec3::new(1.0, 40.0, 1.0),
                speed: Some(1.0),
                radius: Some(0.3),
            }],
        );
        let creature = sim.registry.get(CreatureId(1)).unwrap();
        assert_eq!(creature.position.y, 2.5);
        assert_eq!(creature.radius, 0.3);
        assert_eq!(creature.state(), CaptureState::Walking);
    }

    #[test]
    fn wandering_creatures_follow_terrain() {
        let mut sim = populated(9);
        assert_eq!(sim.registry.roster_len(), 8);
        assert_eq!(sim.obstacles().len(), 6);
        for _ in 0..300 {
            sim.frame(1.0 / 60.0, &[]);
        }
        assert_eq!(sim.registry.roster_len(), 8);
        for c in sim.registry.roster() {
            let y = sim.terrain.as_ref().unwrap().height_at(c.position.x, c.position.z);
            assert!((c.position.y - y).abs() < 1e-5);
        }
    }

    #[test]
    fn determinism_same_seed_same_run() {
        let mut a = populated(42);
        let mut b = populated(42);
        let throw = [SimAction::Throw {
            eye: Vec3::new(0.0, 2.0, 0.0),
            aim: Vec3::new(0.3, -0.1, 1.0),
            charge: 0.4,
        }];
        for i in 0..240 {
            let actions: &[SimAction] = if i % 30 == 0 { &throw } else { &[] };
            let ea = a.frame(1.0 / 60.0, actions).events;
            let eb = b.frame(1.0 / 60.0, actions).events;
            assert_eq!(ea, eb);
        }
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn different_seeds_diverge() {
        let a = populated(1);
        let b = populated(2);
        assert_ne!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn serialization_roundtrip_rebuilds_caches() {
        let mut sim = populated(7);
        for _ in 0..30 {
            sim.frame(1.0 / 60.0, &[]);
        }
        let json = sim.to_json().unwrap();
        let mut restored = SimState::from_json(&json).unwrap();
        assert_eq!(restored.species_table.len(), sim.species_table.len());
        assert_eq!(restored.obstacles().len(), sim.obstacles().len());

        // Both continue identically.
        for _ in 0..60 {
            let ea = sim.frame(1.0 / 60.0, &[]).events;
            let eb = restored.frame(1.0 / 60.0, &[]).events;
            assert_eq!(ea, eb);
        }
        assert_eq!(sim.to_json().unwrap(), restored.to_json().unwrap());
    }

    #[test]
    fn tampered_terrain_save_loads_flat() {
        let mut sim = SimState::new(5);
        sim.set_terrain(Some(Heightfield::from_fn(3, 3, 1.0, |i, j| (i + j) as f32).unwrap()));
        let throw = SimAction::Throw {
            eye: Vec3::new(0.0, 1.7, 0.0),
            aim: Vec3::new(0.3, 0.0, 1.0),
            charge: 0.2,
        };
        sim.frame(1.0 / 60.0, &[throw]);

        let mut value: serde_json::Value = serde_json::from_str(&sim.to_json().unwrap()).unwrap();
        value["terrain"]["heights"] = serde_json::json!([0.0, 1.0, 2.0, 3.0]);
        let mut restored = SimState::from_json(&value.to_string()).unwrap();
        assert!(restored.terrain.as_ref().unwrap().is_degenerate());

        for _ in 0..120 {
            restored.frame(1.0 / 60.0, &[]);
        }
        assert_eq!(restored.frame, 121);
    }

    #[test]
    fn spawn_with_unknown_species_is_rejected() {
        let mut sim = SimState::new(3);
        let unknown = SpeciesId(sim.species_table.len() as u16);
        let events = sim
            .frame(
                0.0,
                &[SimAction::SpawnCreature {
                    species: unknown,
                    position: Vec3::ZERO,
                    speed: None,
                    radius: None,
                }],
            )
            .events;
        assert!(events.is_empty());
        assert_eq!(sim.registry.roster_len(), 0);
    }

    #[test]
    fn direct_send_out_and_recall_report_events() {
        let mut sim = SimState::new(9);
        let mut events = Vec::new();
        let id = sim.spawn_creature(SpeciesId(0), Vec3::ZERO, 1.0, 0.5, &mut events);
        let creature = sim.registry.get_mut(id).unwrap();
        creature.apply(crate::error::CaptureEvent::Hit).unwrap();
        creature.apply(crate::error::CaptureEvent::Secure).unwrap();
        sim.registry.update_inventory(&mut events);
        assert_eq!(sim.registry.inventory().len(), 1);

        let (out, result) = sim.send_out(0, Vec3::new(1.0, 0.0, 1.0)).unwrap();
        assert_eq!(out, id);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].frame, sim.frame);
        assert_eq!(result.events[0].kind, SimEventKind::SentOut { creature_id: id, slot: 0 });

        let (back, result) = sim.recall(0).unwrap();
        assert_eq!(back, id);
        assert_eq!(result.events[0].kind, SimEventKind::Recalled { creature_id: id, slot: 0 });
        assert!(sim.recall(0).is_err());
    }

    #[test]
    fn preview_uses_charge() {
        let sim = SimState::new(1);
        let weak = sim.preview_trajectory(Vec3::ZERO, Vec3::Z, 0.0);
        let strong = sim.preview_trajectory(Vec3::ZERO, Vec3::Z, 1.0);
        assert!(strong[10].z > weak[10].z);
    }
}
