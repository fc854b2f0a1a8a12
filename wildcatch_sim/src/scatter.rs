// Procedural world population.
//
// Scatters obstacles and creature spawn points uniformly over a square area
// centered on the origin, rejecting spots where the terrain is too steep
// (`normal.y` below a flatness threshold). Each placement samples the terrain
// height so entities sit on the ground.
//
// Rejection sampling is bounded: a call gets `count * attempts_per_entity`
// attempts in total and logs a warning if it runs out with fewer placements
// than requested, instead of looping forever on a cliff-only map.
//
// See also: `obstacle.rs` for `Obstacle`, `sim.rs` which turns
// `CreatureSeed`s into registry entries.
//
// **Critical constraint: determinism.** Draw order per attempt is fixed
// (x, z, then the entity's own parameters) and all draws come from the
// caller's `RandomSource`.

use crate::config::ScatterParams;
use crate::obstacle::Obstacle;
use crate::terrain::Terrain;
use crate::types::{SpeciesId, Vec3};
use tracing::warn;
use wildcatch_prng::RandomSource;

/// Where and what to spawn for one scattered creature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CreatureSeed {
    pub position: Vec3,
    pub species: SpeciesId,
    pub speed: f32,
    pub radius: f32,
}

/// Draw a ground point inside `range - margin` where the terrain is at least
/// `min_flatness` flat. `None` when the spot is too steep.
fn try_ground_point(
    terrain: &dyn Terrain,
    range: f32,
    margin: f32,
    min_flatness: f32,
    rng: &mut dyn RandomSource,
) -> Option<Vec3> {
    let x = rng.range_f32(-range + margin, range - margin);
    let z = rng.range_f32(-range + margin, range - margin);
    if terrain.normal_at(x, z).dot(Vec3::Y) < min_flatness {
        return None;
    }
    Some(Vec3::new(x, terrain.height_at(x, z), z))
}

fn attempt_budget(count: usize, params: &ScatterParams) -> usize {
    count.saturating_mul(params.attempts_per_entity.max(1) as usize)
}

/// Place up to `count` obstacles on flat ground.
pub fn scatter_obstacles(
    count: usize,
    terrain: &dyn Terrain,
    params: &ScatterParams,
    rng: &mut dyn RandomSource,
) -> Vec<Obstacle> {
    let mut placed = Vec::with_capacity(count);
    let local_min = Vec3::from_array(params.obstacle_local_min);
    let local_max = Vec3::from_array(params.obstacle_local_max);

    for _ in 0..attempt_budget(count, params) {
        if placed.len() == count {
            break;
        }
        let Some(position) = try_ground_point(
            terrain,
            params.range,
            params.obstacle_margin,
            params.obstacle_min_flatness,
            rng,
        ) else {
            continue;
        };
        let (xz_lo, xz_hi) = params.obstacle_scale_xz;
        let (y_lo, y_hi) = params.obstacle_scale_y;
        let scale_xz = rng.range_f32(xz_lo, xz_hi);
        let scale_y = rng.range_f32(y_lo, y_hi);
        placed.push(Obstacle::new(
            position,
            Vec3::new(scale_xz, scale_y, scale_xz),
            local_min,
            local_max,
        ));
    }

    if placed.len() < count {
        warn!(requested = count, placed = placed.len(), "obstacle scatter ran out of attempts");
    }
    placed
}

/// Pick up to `count` creature spawns on flat ground, each with a random
/// species out of `species_count`.
pub fn scatter_creatures(
    count: usize,
    species_count: usize,
    terrain: &dyn Terrain,
    params: &ScatterParams,
    rng: &mut dyn RandomSource,
) -> Vec<CreatureSeed> {
    let mut seeds = Vec::with_capacity(count);
    if species_count == 0 {
        warn!("no species configured, no creatures scattered");
        return seeds;
    }

    for _ in 0..attempt_budget(count, params) {
        if seeds.len() == count {
            break;
        }
        let Some(position) = try_ground_point(
            terrain,
            params.range,
            params.creature_margin,
            params.creature_min_flatness,
            rng,
        ) else {
            continue;
        };
        let (speed_lo, speed_hi) = params.creature_speed;
        let (radius_lo, radius_hi) = params.creature_radius;
        let speed = rng.range_f32(speed_lo, speed_hi);
        let radius = rng.range_f32(radius_lo, radius_hi);
        let species = SpeciesId(rng.index(species_count) as u16);
        seeds.push(CreatureSeed {
            position,
            species,
            speed,
            radius,
        });
    }

    if seeds.len() < count {
        warn!(requested = count, placed = seeds.len(), "creature scatter ran out of attempts");
    }
    seeds
}
