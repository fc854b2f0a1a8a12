// Creatures: roaming, capturable entities.
//
// A `Creature` carries its identity, a `SpeciesId` handle into the species
// arena, kinematic state, and its place in the capture state machine:
//
//   Idle/Walking --Hit--> Capturing --Secure----> Captured --Deploy--> Idle
//                                   \--BreakFree--> CaptureFailed --Recover--> Walking
//
// Capture-protocol transitions all go through `apply`. The only other state
// change is Idle -> Walking when a wandering creature draws a heading, and
// that path never runs outside Idle/Walking. `apply` is total over
// (state, event) pairs and returns `TransitionError` for pairs with no edge,
// so a protocol bug shows up as an error instead of a silently ignored event.
//
// ## Per-tick behavior (`update`)
//
// - Idle/Walking: propose `position + velocity * dt`. If the proposal comes
//   within `obstacle_radius + radius` (planar) of any obstacle center, the
//   move is dropped for this tick and a new wander heading and duration are
//   drawn. Otherwise the move commits. Then `y` snaps to the terrain (if
//   any), the wander countdown runs down and resamples on expiry, and yaw
//   follows the realized horizontal displacement when it is longer than
//   `facing_epsilon`.
// - Capturing: frozen; only `capture_elapsed` accumulates. The projectile
//   protocol decides the outcome.
// - Captured: frozen and hidden. The registry moves it to the inventory.
// - CaptureFailed: on the tick *after* the failure was applied, the creature
//   becomes visible, draws a fresh heading, and walks again. The one-tick
//   delay lets observers see the failed state.
//
// See also: `registry.rs` which owns creatures and drives `update`,
// `projectile.rs` for the capture protocol that sends `Hit`/`Secure`/
// `BreakFree`.

use crate::config::WanderParams;
use crate::error::{CaptureEvent, TransitionError};
use crate::species::SpeciesTable;
use crate::terrain::Terrain;
use crate::types::{CaptureState, CreatureId, SpeciesId, Vec3, planar_distance};
use serde::{Deserialize, Serialize};
use wildcatch_prng::RandomSource;

/// What a single `update` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreatureTick {
    /// Wandered and committed the step.
    Moved,
    /// Wandered but the step was blocked by an obstacle.
    Blocked,
    /// Capturing or Captured: nothing moved.
    Suspended,
    /// Left CaptureFailed and resumed wandering.
    Recovered,
}

/// Renderer-facing snapshot of a creature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CreaturePose {
    pub id: CreatureId,
    pub species: SpeciesId,
    pub position: Vec3,
    /// Rotation about +Y in radians.
    pub yaw: f32,
    pub scale: f32,
    pub visible: bool,
}

/// A roaming, capturable creature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Creature {
    pub id: CreatureId,
    pub species: SpeciesId,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Unit heading in the XZ plane.
    pub wander_direction: Vec3,
    /// Facing about +Y, `atan2(dx, dz)` of the last real displacement.
    pub yaw: f32,
    pub radius: f32,
    pub speed: f32,
    pub visible: bool,
    /// Seconds until the next forced heading change.
    pub wander_timer: f32,
    /// Seconds spent in the current Capturing state.
    pub capture_elapsed: f32,
    state: CaptureState,
}

impl Creature {
    /// Create a creature and give it an initial wander heading.
    pub fn new(
        id: CreatureId,
        species: SpeciesId,
        position: Vec3,
        speed: f32,
        radius: f32,
        params: &WanderParams,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let mut creature = Self {
            id,
            species,
            position,
            velocity: Vec3::ZERO,
            wander_direction: Vec3::Z,
            yaw: 0.0,
            radius,
            speed,
            visible: true,
            wander_timer: 0.0,
            capture_elapsed: 0.0,
            state: CaptureState::Idle,
        };
        creature.redraw_wander(params, rng);
        creature.state = CaptureState::Walking;
        creature
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether a projectile may start a capture on this creature, ignoring
    /// ownership (which only the registry knows).
    pub fn is_capturable(&self) -> bool {
        self.state.is_wandering()
    }

    /// Apply a capture-protocol event.
    pub fn apply(&mut self, event: CaptureEvent) -> Result<CaptureState, TransitionError> {
        use CaptureEvent as E;
        use CaptureState as S;

        let next = match (self.state, event) {
            (S::Idle | S::Walking, E::Hit) => {
                self.velocity = Vec3::ZERO;
                self.capture_elapsed = 0.0;
                self.visible = false;
                S::Capturing
            }
            (S::Capturing, E::Secure) => {
                self.visible = false;
                S::Captured
            }
            (S::Capturing, E::BreakFree) => {
                self.visible = true;
                S::CaptureFailed
            }
            (S::CaptureFailed, E::Recover) => {
                self.visible = true;
                S::Walking
            }
            (S::Captured, E::Deploy) => {
                self.visible = true;
                self.capture_elapsed = 0.0;
                self.velocity = Vec3::ZERO;
                // Expire the timer so the first update draws a heading.
                self.wander_timer = 0.0;
                S::Idle
            }
            (from, event) => {
                return Err(TransitionError {
                    creature: self.id,
                    from,
                    event,
                });
            }
        };
        self.state = next;
        Ok(next)
    }

    /// Draw a new heading and wander duration. Leaves the capture state alone.
    fn redraw_wander(&mut self, params: &WanderParams, rng: &mut dyn RandomSource) {
        let angle = rng.angle();
        self.wander_direction = Vec3::new(angle.cos(), 0.0, angle.sin());
        self.velocity = self.wander_direction * self.speed;
        self.wander_timer = rng.range_f32(params.min_duration, params.max_duration);
    }

    /// Redraw the heading of a wandering creature; Idle becomes Walking.
    fn resume_wander(&mut self, params: &WanderParams, rng: &mut dyn RandomSource) {
        if !self.state.is_wandering() {
            return;
        }
        self.redraw_wander(params, rng);
        self.state = CaptureState::Walking;
    }

    /// Advance one frame.
    pub fn update(
        &mut self,
        dt: f32,
        terrain: Option<&dyn Terrain>,
        obstacles: &[Vec3],
        params: &WanderParams,
        rng: &mut dyn RandomSource,
    ) -> CreatureTick {
        match self.state {
            CaptureState::Captured => return CreatureTick::Suspended,
            CaptureState::Capturing => {
                self.capture_elapsed += dt;
                return CreatureTick::Suspended;
            }
            CaptureState::CaptureFailed => {
                // Recover is always legal from CaptureFailed.
                let _ = self.apply(CaptureEvent::Recover);
                self.redraw_wander(params, rng);
                return CreatureTick::Recovered;
            }
            CaptureState::Idle | CaptureState::Walking => {}
        }

        let old_position = self.position;
        let proposed = self.position + self.velocity * dt;
        let clearance = params.obstacle_radius + self.radius;
        let blocked = obstacles
            .iter()
            .any(|&center| planar_distance(center, proposed) < clearance);

        if blocked {
            self.resume_wander(params, rng);
        } else {
            self.position = proposed;
        }

        if let Some(terrain) = terrain {
            self.position.y = terrain.height_at(self.position.x, self.position.z);
        }

        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 {
            self.resume_wander(params, rng);
        }

        let dx = self.position.x - old_position.x;
        let dz = self.position.z - old_position.z;
        if (dx * dx + dz * dz).sqrt() > params.facing_epsilon {
            self.yaw = dx.atan2(dz);
        }

        if blocked {
            CreatureTick::Blocked
        } else {
            CreatureTick::Moved
        }
    }

    pub fn pose(&self, species: &SpeciesTable) -> CreaturePose {
        CreaturePose {
            id: self.id,
            species: self.species,
            position: self.position,
            yaw: self.yaw,
            scale: species.display_scale(self.species),
            visible: self.visible,
        }
    }

    /// Force a state without going through `apply`. Test setup only.
    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: CaptureState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::terrain::{FlatGround, Heightfield};
    use wildcatch_prng::SequenceRng;

    fn params() -> WanderParams {
        GameConfig::default().wander
    }

    /// Heading +X (angle 0), duration at the minimum.
    fn walker(rng: &mut SequenceRng) -> Creature {
        Creature::new(
            CreatureId(1),
            SpeciesId(0),
            Vec3::ZERO,
            2.0,
            0.5,
            &params(),
            rng,
        )
    }

    #[test]
    fn new_creature_walks_along_drawn_heading() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let c = walker(&mut rng);
        assert_eq!(c.state(), CaptureState::Walking);
        assert!((c.wander_direction - Vec3::X).length() < 1e-6);
        assert!((c.velocity - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);
        assert_eq!(c.wander_timer, 1.0);
    }

    #[test]
    fn wander_duration_in_configured_range() {
        let mut rng = wildcatch_prng::GameRng::new(3);
        let p = params();
        for _ in 0..200 {
            let c = Creature::new(CreatureId(1), SpeciesId(0), Vec3::ZERO, 2.0, 0.5, &p, &mut rng);
            assert!((p.min_duration..=p.max_duration).contains(&c.wander_timer));
        }
    }

    #[test]
    fn free_walk_sums_velocity_and_follows_terrain() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        c.wander_timer = f32::INFINITY;
        let ground = Heightfield::from_fn(41, 41, 1.0, |i, _| i as f32 * 0.1).unwrap();
        let dt = 0.1;
        for _ in 0..10 {
            assert_eq!(c.update(dt, Some(&ground), &[], &params(), &mut rng), CreatureTick::Moved);
            assert_eq!(c.position.y, ground.height_at(c.position.x, c.position.z));
        }
        assert!((c.position.x - 2.0).abs() < 1e-4);
        assert!(c.position.z.abs() < 1e-6);
        // Facing +X.
        assert!((c.yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn blocked_step_keeps_position_and_redraws_heading() {
        // Initial heading +X; after the block, angle 0.25 turns = +Z.
        let mut rng = SequenceRng::new(vec![0.0, 0.0, 0.25, 0.5]);
        let mut c = walker(&mut rng);
        let before = c.position;
        let obstacle = Vec3::new(1.2, 0.0, 0.0);
        let tick = c.update(0.1, None, &[obstacle], &params(), &mut rng);
        assert_eq!(tick, CreatureTick::Blocked);
        assert_eq!(c.position, before);
        assert!((c.wander_direction - Vec3::Z).length() < 1e-5);
        assert_eq!(c.state(), CaptureState::Walking);
        // No displacement, so facing is unchanged.
        assert_eq!(c.yaw, 0.0);
    }

    #[test]
    fn missing_terrain_leaves_height_alone() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        c.position.y = 7.0;
        c.update(0.1, None, &[], &params(), &mut rng);
        assert_eq!(c.position.y, 7.0);
    }

    #[test]
    fn expired_timer_redraws_heading() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0, 0.5, 0.0]);
        let mut c = walker(&mut rng);
        c.update(1.0, None, &[], &params(), &mut rng);
        // Angle 0.5 turns = -X.
        assert!((c.wander_direction + Vec3::X).length() < 1e-5);
        assert_eq!(c.wander_timer, 1.0);
    }

    #[test]
    fn capturing_freezes_movement() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        c.apply(CaptureEvent::Hit).unwrap();
        assert_eq!(c.velocity, Vec3::ZERO);
        assert!(!c.visible);
        let before = c.position;
        let ground = FlatGround { height: 3.0 };
        assert_eq!(c.update(0.25, Some(&ground), &[], &params(), &mut rng), CreatureTick::Suspended);
        assert_eq!(c.position, before);
        assert_eq!(c.capture_elapsed, 0.25);
        assert_eq!(c.state(), CaptureState::Capturing);
    }

    #[test]
    fn failure_is_visible_for_one_tick_then_walks() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        c.apply(CaptureEvent::Hit).unwrap();
        c.apply(CaptureEvent::BreakFree).unwrap();
        assert_eq!(c.state(), CaptureState::CaptureFailed);
        assert!(c.visible);

        let tick = c.update(0.016, None, &[], &params(), &mut rng);
        assert_eq!(tick, CreatureTick::Recovered);
        assert_eq!(c.state(), CaptureState::Walking);
        assert!(c.visible);
        assert!(c.velocity.length() > 0.0);
    }

    #[test]
    fn capturing_creature_ignores_wander_triggers() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0, 0.25, 0.5]);
        let mut c = walker(&mut rng);
        c.apply(CaptureEvent::Hit).unwrap();
        c.wander_timer = 0.0;

        // Expired timer and an obstacle right on top: still frozen and hidden.
        let obstacle = c.position;
        let tick = c.update(1.0, None, &[obstacle], &params(), &mut rng);
        assert_eq!(tick, CreatureTick::Suspended);
        assert_eq!(c.state(), CaptureState::Capturing);
        assert!(!c.visible);
        assert!(!c.is_capturable());
        assert_eq!(c.velocity, Vec3::ZERO);

        // The only exits are Secure and BreakFree.
        assert!(c.apply(CaptureEvent::Recover).is_err());
        assert!(c.apply(CaptureEvent::Deploy).is_err());
        assert_eq!(c.state(), CaptureState::Capturing);
    }

    #[test]
    fn secured_creature_is_hidden_and_frozen() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        c.apply(CaptureEvent::Hit).unwrap();
        c.apply(CaptureEvent::Secure).unwrap();
        assert_eq!(c.state(), CaptureState::Captured);
        assert!(!c.visible);
        assert_eq!(c.update(1.0, None, &[], &params(), &mut rng), CreatureTick::Suspended);
        assert_eq!(c.state(), CaptureState::Captured);
    }

    #[test]
    fn deploy_resets_to_idle() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        c.force_state(CaptureState::Captured);
        c.visible = false;
        assert_eq!(c.apply(CaptureEvent::Deploy), Ok(CaptureState::Idle));
        assert!(c.visible);
        // First tick after deployment draws a heading.
        c.update(0.016, None, &[], &params(), &mut rng);
        assert_eq!(c.state(), CaptureState::Walking);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let mut c = walker(&mut rng);
        let err = c.apply(CaptureEvent::Secure).unwrap_err();
        assert_eq!(err.from, CaptureState::Walking);
        assert_eq!(err.event, CaptureEvent::Secure);
        assert_eq!(c.state(), CaptureState::Walking);

        c.apply(CaptureEvent::Hit).unwrap();
        assert!(c.apply(CaptureEvent::Hit).is_err());
        assert!(c.apply(CaptureEvent::Deploy).is_err());
        assert!(c.apply(CaptureEvent::Recover).is_err());
    }

    #[test]
    fn pose_uses_species_scale() {
        let mut rng = SequenceRng::new(vec![0.0, 0.0]);
        let c = walker(&mut rng);
        let table = GameConfig::default().species_table();
        let pose = c.pose(&table);
        assert_eq!(pose.scale, 0.25);
        assert!(pose.visible);
        assert_eq!(pose.id, CreatureId(1));
    }
}
