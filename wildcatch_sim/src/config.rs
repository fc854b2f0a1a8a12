// Data-driven game configuration.
//
// All tunable simulation parameters live in `GameConfig`, loaded from JSON at
// startup (or taken from `Default`, which carries the shipped values). The sim
// never hardcodes a physics or behavior constant; it reads from the config.
//
// Parameters are grouped into nested structs by concern:
// - `PhysicsParams`:    gravity, bounce response, fixed timestep.
// - `ProjectileParams`: projectile size, lifetime, throw model, preview.
// - `CaptureParams`:    shake timeline and post-resolution grace.
// - `WanderParams`:     creature wandering and obstacle avoidance.
// - `TerrainParams`:    heightmap ingestion scale.
// - `ScatterParams`:    procedural population of obstacles and creatures.
//
// Species descriptors live in `species`, a list whose indices become
// `SpeciesId` handles (see `species.rs`).
//
// See also: `sim.rs` which owns the `GameConfig` as part of `SimState`.
//
// **Critical constraint: determinism.** Config values feed directly into the
// simulation. The same config and seed always produce the same run.

use crate::error::ConfigError;
use crate::species::{SpeciesData, SpeciesTable};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Parameter groups
// ---------------------------------------------------------------------------

/// Integration and collision-response constants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// Downward acceleration in m/s².
    pub gravity: f32,
    /// Fraction of speed kept after a bounce (applied to the whole
    /// reflected vector).
    pub restitution: f32,
    /// Extra damping applied only to the tangential part of a bounce.
    pub friction: f32,
    /// Fixed physics substep in seconds.
    pub timestep: f32,
    /// Upper bound on a single flight integration step.
    pub max_flight_step: f32,
    /// Ground height used for projectile collision when no terrain is loaded.
    pub fallback_ground_y: f32,
    /// Maximum substeps run in one frame. Time beyond this is dropped so a
    /// long stall cannot trigger a catch-up spiral.
    pub max_substeps_per_frame: u32,
}

/// Projectile size, lifetime, and throw model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectileParams {
    pub radius: f32,
    /// Seconds of flight before a projectile expires.
    pub lifetime: f32,
    /// Distance in front of the thrower's eye where projectiles appear.
    pub spawn_distance: f32,
    /// Vertical velocity added to every throw.
    pub upward_velocity: f32,
    pub min_throw_speed: f32,
    pub max_throw_speed: f32,
    /// Seconds of charging needed to reach `max_throw_speed`.
    pub max_charge_time: f32,
    /// Integration rate of the trajectory preview, in steps per second.
    pub preview_rate_hz: u32,
    /// Number of points in a trajectory preview.
    pub preview_points: usize,
}

/// Lock/shake timeline of a capture attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureParams {
    /// Seconds per shake cycle.
    pub shake_duration: f32,
    /// Shakes before the outcome is applied.
    pub max_shakes: u32,
    /// Horizontal shake offset amplitude in meters.
    pub shake_amplitude: f32,
    /// Presented roll amplitude in degrees while shaking.
    pub shake_roll_degrees: f32,
    /// A locked projectile is removed once its lock timer exceeds this.
    pub lock_grace: f32,
}

/// Creature wandering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WanderParams {
    /// Assumed radius of every obstacle for avoidance purposes.
    pub obstacle_radius: f32,
    /// Wander durations are drawn uniformly from `[min, max)`.
    pub min_duration: f32,
    pub max_duration: f32,
    /// Displacements at or below this length do not update facing.
    pub facing_epsilon: f32,
    pub default_speed: f32,
    pub default_radius: f32,
}

/// Heightmap ingestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainParams {
    /// World meters between adjacent height samples.
    pub cell_size: f32,
    /// Height of a fully white heightmap pixel.
    pub height_scale: f32,
}

/// Procedural world population.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScatterParams {
    /// Placement happens within `[-range, range]` on both axes.
    pub range: f32,
    pub obstacle_margin: f32,
    pub creature_margin: f32,
    /// Minimum `normal.y` of terrain accepted for an obstacle.
    pub obstacle_min_flatness: f32,
    /// Minimum `normal.y` of terrain accepted for a creature.
    pub creature_min_flatness: f32,
    pub obstacle_scale_xz: (f32, f32),
    pub obstacle_scale_y: (f32, f32),
    pub creature_speed: (f32, f32),
    pub creature_radius: (f32, f32),
    /// Local-space bounding box of the obstacle model.
    pub obstacle_local_min: [f32; 3],
    pub obstacle_local_max: [f32; 3],
    /// Placement attempts allowed per requested entity before giving up.
    pub attempts_per_entity: u32,
}

// ---------------------------------------------------------------------------
// Top-level game config
// ---------------------------------------------------------------------------

/// Top-level game configuration. Loaded once, never mutated at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    pub physics: PhysicsParams,
    pub projectile: ProjectileParams,
    pub capture: CaptureParams,
    pub wander: WanderParams,
    pub terrain: TerrainParams,
    pub scatter: ScatterParams,
    /// Species descriptors; index `i` is `SpeciesId(i)`.
    pub species: Vec<SpeciesData>,
}

impl GameConfig {
    /// Parse and validate a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the sim relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, v: f32) -> Result<(), ConfigError> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {v}")))
            }
        }
        fn ordered(name: &str, (lo, hi): (f32, f32)) -> Result<(), ConfigError> {
            if lo <= hi {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} range is inverted: {lo} > {hi}")))
            }
        }

        positive("physics.timestep", self.physics.timestep)?;
        positive("physics.max_flight_step", self.physics.max_flight_step)?;
        positive("projectile.radius", self.projectile.radius)?;
        positive("capture.shake_duration", self.capture.shake_duration)?;
        positive("terrain.cell_size", self.terrain.cell_size)?;
        if self.physics.max_substeps_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "physics.max_substeps_per_frame must be at least 1".into(),
            ));
        }
        if self.projectile.preview_rate_hz == 0 {
            return Err(ConfigError::Invalid(
                "projectile.preview_rate_hz must be at least 1".into(),
            ));
        }
        ordered(
            "projectile throw speed",
            (self.projectile.min_throw_speed, self.projectile.max_throw_speed),
        )?;
        ordered(
            "wander duration",
            (self.wander.min_duration, self.wander.max_duration),
        )?;
        ordered("scatter.obstacle_scale_xz", self.scatter.obstacle_scale_xz)?;
        ordered("scatter.obstacle_scale_y", self.scatter.obstacle_scale_y)?;
        ordered("scatter.creature_speed", self.scatter.creature_speed)?;
        ordered("scatter.creature_radius", self.scatter.creature_radius)?;

        if self.species.is_empty() {
            return Err(ConfigError::Invalid("at least one species is required".into()));
        }
        if self.species.len() > u16::MAX as usize {
            return Err(ConfigError::Invalid("too many species".into()));
        }
        for s in &self.species {
            if !(0.0..=1.0).contains(&s.catch_rate) {
                return Err(ConfigError::Invalid(format!(
                    "species {} catch_rate must be in [0, 1], got {}",
                    s.name, s.catch_rate
                )));
            }
        }
        Ok(())
    }

    /// Build the species arena from the config's species list.
    pub fn species_table(&self) -> SpeciesTable {
        SpeciesTable::new(self.species.clone())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsParams {
                gravity: 9.8,
                restitution: 0.6,
                friction: 0.95,
                timestep: 1.0 / 120.0,
                max_flight_step: 1.0 / 60.0,
                fallback_ground_y: -0.5,
                max_substeps_per_frame: 240,
            },
            projectile: ProjectileParams {
                radius: 0.2,
                lifetime: 15.0,
                spawn_distance: 1.0,
                upward_velocity: 2.0,
                min_throw_speed: 6.0,
                max_throw_speed: 22.0,
                max_charge_time: 1.0,
                preview_rate_hz: 60,
                preview_points: 64,
            },
            capture: CaptureParams {
                shake_duration: 0.6,
                max_shakes: 3,
                shake_amplitude: 0.12,
                shake_roll_degrees: 25.0,
                lock_grace: 2.8,
            },
            wander: WanderParams {
                obstacle_radius: 0.7,
                min_duration: 1.0,
                max_duration: 3.0,
                facing_epsilon: 0.001,
                default_speed: 2.0,
                default_radius: 0.5,
            },
            terrain: TerrainParams {
                cell_size: 0.5,
                height_scale: 5.0,
            },
            scatter: ScatterParams {
                range: 100.0,
                obstacle_margin: 2.0,
                creature_margin: 5.0,
                obstacle_min_flatness: 0.90,
                creature_min_flatness: 0.85,
                obstacle_scale_xz: (0.9, 1.7),
                obstacle_scale_y: (0.7, 1.3),
                creature_speed: (1.5, 3.0),
                creature_radius: (0.4, 0.6),
                obstacle_local_min: [-0.5, 0.0, -0.5],
                obstacle_local_max: [0.5, 0.6, 0.5],
                attempts_per_entity: 50,
            },
            species: vec![
                SpeciesData {
                    name: "Sparkmouse".into(),
                    display_scale: 0.25,
                    catch_rate: 0.7,
                    display_color: [1.0, 0.9, 0.2],
                    render_handle: 0,
                },
                SpeciesData {
                    name: "Emberkit".into(),
                    display_scale: 0.7,
                    catch_rate: 0.3,
                    display_color: [1.0, 0.5, 0.1],
                    render_handle: 1,
                },
                SpeciesData {
                    name: "Shellpup".into(),
                    display_scale: 0.85,
                    catch_rate: 0.5,
                    display_color: [0.3, 0.6, 1.0],
                    render_handle: 2,
                },
                // Model is authored in centimeters.
                SpeciesData {
                    name: "Bloomtoad".into(),
                    display_scale: 100.0,
                    catch_rate: 0.5,
                    display_color: [0.3, 0.8, 0.4],
                    render_handle: 3,
                },
            ],
        }
    }
}
