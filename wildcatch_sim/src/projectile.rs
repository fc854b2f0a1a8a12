// Projectiles: thrown capture devices.
//
// A `Projectile` is in one of two regimes, held in `ProjectilePhase`:
// - `Flying`: fixed-step Euler integration under gravity, sphere collision
//   against obstacle AABBs and the terrain, bounce response, and a lifetime
//   countdown. Expired flyers are dropped.
// - `Locked(CaptureLock)`: pinned above a creature it hit. The lock runs the
//   shake timeline (`shake_phase` cycles every `shake_duration`, wrapping
//   into `shake_count`), offsets the presented position sideways while
//   shaking, and after `max_shakes` reports a `CaptureResolution` exactly
//   once. A locked projectile is removed once its lock timer passes
//   `lock_grace`.
//
// The capture trigger itself (which creature a flyer hits and the catch
// roll) lives in `registry.rs`, because only the registry knows creature
// ownership. It calls `Projectile::lock_onto` to switch regimes.
//
// Bounce response: reflect the velocity about the contact normal, scale the
// whole vector by restitution, then scale only the tangential part by the
// friction factor. See `bounce`.
//
// Also here: the throw model (`charge_fraction`, `throw_speed`,
// `launch_state`) and the renderer's trajectory preview
// (`predict_trajectory`), which integrates against the fallback ground plane
// only.
//
// See also: `obstacle.rs` for `Aabb::sphere_contact`, `terrain.rs` for the
// `Terrain` trait, `sim.rs` for the substep accumulator that drives
// `ProjectileSet::step`.
//
// **Critical constraint: determinism.** Stepping never draws randomness; the
// catch roll happens once, at lock time, in the registry.

use crate::config::{CaptureParams, PhysicsParams, ProjectileParams};
use crate::event::SimEventKind;
use crate::obstacle::{Aabb, Contact};
use crate::terrain::Terrain;
use crate::types::{CreatureId, ProjectileId, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Collision response
// ---------------------------------------------------------------------------

/// Velocity after bouncing off a surface with unit normal `n`.
pub fn bounce(v: Vec3, n: Vec3, restitution: f32, friction: f32) -> Vec3 {
    let reflected = (v - 2.0 * v.dot(n) * n) * restitution;
    let normal_part = reflected.dot(n) * n;
    let tangential = reflected - normal_part;
    normal_part + tangential * friction
}

/// Push `position` out of a contact and bounce `velocity` if it is heading
/// into the surface.
fn resolve_contact(
    position: &mut Vec3,
    velocity: &mut Vec3,
    contact: Contact,
    physics: &PhysicsParams,
) {
    *position += contact.normal * contact.depth;
    if velocity.dot(contact.normal) < 0.0 {
        *velocity = bounce(*velocity, contact.normal, physics.restitution, physics.friction);
    }
}

/// Sphere-vs-terrain contact, measured along the terrain normal under the
/// sphere center.
fn terrain_contact(terrain: &dyn Terrain, center: Vec3, radius: f32) -> Option<Contact> {
    let ground = Vec3::new(center.x, terrain.height_at(center.x, center.z), center.z);
    let normal = terrain.normal_at(center.x, center.z);
    let dist = (center - ground).dot(normal);
    (dist < radius).then_some(Contact {
        normal,
        depth: radius - dist,
    })
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// State of a projectile that has locked onto a creature.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureLock {
    /// Seconds since the lock began.
    pub lock_timer: f32,
    pub shake_count: u32,
    /// Progress through the current shake, in `[0, 1)`.
    pub shake_phase: f32,
    /// Anchor the shake oscillates around.
    pub base_position: Vec3,
    /// Outcome of the catch roll made at lock time.
    pub success: bool,
    /// Set once the outcome has been reported.
    pub resolved: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProjectilePhase {
    Flying,
    Locked(CaptureLock),
}

/// Reported once per lock when the shake sequence completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureResolution {
    pub projectile: ProjectileId,
    pub target: CreatureId,
    pub success: bool,
}

/// Renderer-facing snapshot of a projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectilePose {
    pub id: ProjectileId,
    pub position: Vec3,
    /// Roll about the forward axis, in degrees.
    pub roll_degrees: f32,
    /// Uniform scale (the sphere's drawn radius).
    pub scale: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    pub id: ProjectileId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    /// Seconds of flight left.
    pub life: f32,
    /// The creature this projectile locked onto, if any. Never cleared.
    pub target: Option<CreatureId>,
    pub phase: ProjectilePhase,
}

impl Projectile {
    pub fn new(id: ProjectileId, position: Vec3, velocity: Vec3, params: &ProjectileParams) -> Self {
        Self {
            id,
            position,
            velocity,
            radius: params.radius,
            life: params.lifetime,
            target: None,
            phase: ProjectilePhase::Flying,
        }
    }

    /// Still in free flight.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, ProjectilePhase::Flying)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.phase, ProjectilePhase::Locked(_))
    }

    pub fn lock(&self) -> Option<&CaptureLock> {
        match &self.phase {
            ProjectilePhase::Locked(lock) => Some(lock),
            ProjectilePhase::Flying => None,
        }
    }

    /// Switch to the locked regime, pinned at `anchor` above `target`.
    pub fn lock_onto(&mut self, target: CreatureId, anchor: Vec3, success: bool) {
        self.velocity = Vec3::ZERO;
        self.position = anchor;
        self.target = Some(target);
        self.phase = ProjectilePhase::Locked(CaptureLock {
            lock_timer: 0.0,
            shake_count: 0,
            shake_phase: 0.0,
            base_position: anchor,
            success,
            resolved: false,
        });
    }

    /// One flight substep of at most `physics.max_flight_step` seconds.
    fn fly(&mut self, h: f32, physics: &PhysicsParams, terrain: &dyn Terrain, obstacles: &[Aabb]) {
        let step = h.min(physics.max_flight_step);
        self.velocity.y -= physics.gravity * step;
        self.position += self.velocity * step;

        for aabb in obstacles {
            if let Some(contact) = aabb.sphere_contact(self.position, self.radius) {
                resolve_contact(&mut self.position, &mut self.velocity, contact, physics);
            }
        }
        if let Some(contact) = terrain_contact(terrain, self.position, self.radius) {
            resolve_contact(&mut self.position, &mut self.velocity, contact, physics);
        }

        self.life -= step;
    }

    /// Advance the shake timeline. Returns the outcome on the substep the
    /// final shake completes.
    fn shake(&mut self, h: f32, capture: &CaptureParams) -> Option<CaptureResolution> {
        let ProjectilePhase::Locked(lock) = &mut self.phase else {
            return None;
        };
        lock.lock_timer += h;

        if lock.shake_count < capture.max_shakes {
            lock.shake_phase += h / capture.shake_duration;
            if lock.shake_phase >= 1.0 {
                lock.shake_phase = 0.0;
                lock.shake_count += 1;
            }
        }

        if lock.shake_count < capture.max_shakes {
            let offset = capture.shake_amplitude * (lock.shake_phase * std::f32::consts::TAU).sin();
            self.position = lock.base_position + Vec3::new(offset, 0.0, 0.0);
            return None;
        }

        self.position = lock.base_position;
        if lock.resolved {
            return None;
        }
        lock.resolved = true;
        self.target.map(|target| CaptureResolution {
            projectile: self.id,
            target,
            success: lock.success,
        })
    }

    /// Flying projectiles whose life ran out, and locked ones past the grace
    /// period.
    pub fn is_spent(&self, capture: &CaptureParams) -> bool {
        match &self.phase {
            ProjectilePhase::Flying => self.life <= 0.0,
            ProjectilePhase::Locked(lock) => lock.lock_timer > capture.lock_grace,
        }
    }

    pub fn pose(&self, capture: &CaptureParams) -> ProjectilePose {
        let (roll_degrees, scale) = match &self.phase {
            ProjectilePhase::Flying => (0.0, self.radius),
            ProjectilePhase::Locked(lock) if lock.shake_count < capture.max_shakes => {
                let roll = capture.shake_roll_degrees
                    * (lock.shake_phase * std::f32::consts::TAU).sin();
                (roll, self.radius)
            }
            ProjectilePhase::Locked(lock) => {
                let shrink = 0.3 + 0.7 * (-2.0 * lock.lock_timer).exp();
                (0.0, self.radius * shrink)
            }
        };
        ProjectilePose {
            id: self.id,
            position: self.position,
            roll_degrees,
            scale,
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectileSet
// ---------------------------------------------------------------------------

/// Borrowed world view for one physics substep.
pub struct StepContext<'a> {
    pub physics: &'a PhysicsParams,
    pub capture: &'a CaptureParams,
    pub terrain: &'a dyn Terrain,
    pub obstacles: &'a [Aabb],
}

/// All live projectiles, in spawn order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectileSet {
    projectiles: Vec<Projectile>,
    next_id: u32,
}

impl ProjectileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, position: Vec3, velocity: Vec3, params: &ProjectileParams) -> ProjectileId {
        self.next_id += 1;
        let id = ProjectileId(self.next_id);
        self.projectiles.push(Projectile::new(id, position, velocity, params));
        id
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    pub fn as_mut_slice(&mut self) -> &mut [Projectile] {
        &mut self.projectiles
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Advance every projectile by one substep of `h` seconds. Returns the
    /// capture outcomes that completed during this substep.
    pub fn step(&mut self, h: f32, ctx: &StepContext<'_>) -> Vec<CaptureResolution> {
        let mut resolutions = Vec::new();
        for projectile in &mut self.projectiles {
            if projectile.is_locked() {
                resolutions.extend(projectile.shake(h, ctx.capture));
            } else {
                projectile.fly(h, ctx.physics, ctx.terrain, ctx.obstacles);
            }
        }
        resolutions
    }

    /// Drop spent projectiles. Flyers that ran out of life are reported as
    /// expired.
    pub fn remove_spent(&mut self, capture: &CaptureParams, events: &mut Vec<SimEventKind>) {
        self.projectiles.retain(|p| {
            if !p.is_spent(capture) {
                return true;
            }
            if p.is_active() {
                events.push(SimEventKind::ProjectileExpired { projectile_id: p.id });
            }
            false
        });
    }

    pub fn poses(&self, capture: &CaptureParams) -> Vec<ProjectilePose> {
        self.projectiles.iter().map(|p| p.pose(capture)).collect()
    }
}

// ---------------------------------------------------------------------------
// Throw model and trajectory preview
// ---------------------------------------------------------------------------

/// Charge in `[0, 1]` after holding the throw for `held_seconds`.
pub fn charge_fraction(held_seconds: f32, params: &ProjectileParams) -> f32 {
    if params.max_charge_time <= 0.0 {
        return 1.0;
    }
    (held_seconds / params.max_charge_time).clamp(0.0, 1.0)
}

/// Launch speed for a charge level. Charge is clamped to `[0, 1]`.
pub fn throw_speed(charge: f32, params: &ProjectileParams) -> f32 {
    let t = charge.clamp(0.0, 1.0);
    params.min_throw_speed + (params.max_throw_speed - params.min_throw_speed) * t
}

/// Spawn position and velocity for a throw from `eye` along `aim`.
pub fn launch_state(eye: Vec3, aim: Vec3, speed: f32, params: &ProjectileParams) -> (Vec3, Vec3) {
    let dir = aim.normalize_or(Vec3::Z);
    let position = eye + dir * params.spawn_distance;
    let velocity = dir * speed + Vec3::new(0.0, params.upward_velocity, 0.0);
    (position, velocity)
}

/// Points along the predicted path of a throw, for the aiming preview.
///
/// Bounces off the flat fallback ground only: vertical speed is reflected and
/// scaled by restitution, horizontal speed is damped by friction.
pub fn predict_trajectory(
    eye: Vec3,
    aim: Vec3,
    speed: f32,
    physics: &PhysicsParams,
    params: &ProjectileParams,
) -> Vec<Vec3> {
    let dt = 1.0 / params.preview_rate_hz.max(1) as f32;
    let ground = physics.fallback_ground_y;
    let restitution = physics.restitution.clamp(0.0, 1.0);
    let (mut p, mut v) = launch_state(eye, aim, speed, params);

    let mut points = Vec::with_capacity(params.preview_points);
    for _ in 0..params.preview_points {
        points.push(p);
        v.y -= physics.gravity * dt;
        p += v * dt;
        if p.y <= ground {
            p.y = ground;
            v.y = -v.y * restitution;
            v.x *= physics.friction;
            v.z *= physics.friction;
        }
    }
    points
}
