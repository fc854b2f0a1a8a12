// Static obstacles (rocks and other props).
//
// An `Obstacle` is a placed model instance: a world position, a per-axis
// scale, and the model's local-space bounding box. Two views of it are used:
// - its center `position`, which wandering creatures steer around using a
//   fixed avoidance radius (see `creature.rs`);
// - its world-space `Aabb`, which projectiles collide against with a
//   closest-point sphere test (see `projectile.rs`).
//
// `Contact` is the shared collision result type: a unit normal pointing away
// from the surface and the penetration depth along it.

use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Box spanning two arbitrary corners (component-wise min/max).
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Closest point inside the box to `p`.
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    /// Sphere-vs-box contact. `None` when the sphere does not overlap.
    ///
    /// When the sphere center is inside the box the direction is undefined,
    /// so the contact pushes straight up by the full radius.
    pub fn sphere_contact(&self, center: Vec3, radius: f32) -> Option<Contact> {
        let delta = center - self.closest_point(center);
        let dist_sq = delta.length_squared();
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        let normal = if dist > 1e-4 { delta / dist } else { Vec3::Y };
        Some(Contact {
            normal,
            depth: radius - dist,
        })
    }
}

/// Result of a penetration test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Unit vector pointing out of the surface.
    pub normal: Vec3,
    /// Distance to move along `normal` to resolve the overlap.
    pub depth: f32,
}

/// A placed static prop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub position: Vec3,
    pub scale: Vec3,
    pub local_min: Vec3,
    pub local_max: Vec3,
}

impl Obstacle {
    pub fn new(position: Vec3, scale: Vec3, local_min: Vec3, local_max: Vec3) -> Self {
        Self {
            position,
            scale,
            local_min,
            local_max,
        }
    }

    /// World-space bounds. Negative scales are handled by re-sorting the
    /// corners.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_corners(
            self.position + self.scale * self.local_min,
            self.position + self.scale * self.local_max,
        )
    }
}

/// Centers of `obstacles`, the form creature avoidance consumes.
pub fn obstacle_centers(obstacles: &[Obstacle]) -> Vec<Vec3> {
    obstacles.iter().map(|o| o.position).collect()
}
