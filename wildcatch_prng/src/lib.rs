// Deterministic, portable randomness for the wildcatch simulation.
//
// Three pieces live here:
// - `RandomSource`: the narrow trait every random decision in the sim draws
//   through (wander headings, wander durations, capture rolls, world
//   scattering). Sim code never names a concrete generator; it takes
//   `&mut dyn RandomSource`, so tests can inject an exact sequence.
// - `GameRng`: xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding,
//   the production implementation. Hand-rolled so output is identical on all
//   platforms and the sim state can serialize its generator.
// - `SequenceRng`: a scripted source that replays a fixed list of unit
//   floats, cycling when exhausted. Used by tests to force specific wander
//   angles or capture outcomes.
//
// **Critical constraint: determinism.** Given the same prior state, every
// method must return the same value regardless of platform or optimization
// level. No stdlib hashing, no OS entropy.

use serde::{Deserialize, Serialize};

/// Anything that can hand out uniform unit floats.
///
/// `next_unit` must return a value in `[0, 1)`. The provided helpers build
/// every other draw the sim needs on top of it, so a scripted source only has
/// to implement one method.
pub trait RandomSource {
    /// A uniform `f32` in `[0, 1)`.
    fn next_unit(&mut self) -> f32;

    /// A uniform value in `[low, high)`. Returns `low` when the range is
    /// empty or inverted instead of panicking, since the sim calls this from
    /// per-tick code.
    fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        low + self.next_unit() * (high - low)
    }

    /// A uniform angle in `[0, 2π)`.
    fn angle(&mut self) -> f32 {
        self.next_unit() * std::f32::consts::TAU
    }

    /// A uniform index in `[0, len)`. `len == 0` yields 0.
    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        // Truncation keeps the result strictly below `len` because
        // `next_unit` never returns 1.0.
        ((self.next_unit() * len as f32) as usize).min(len - 1)
    }
}

/// Xoshiro256++ PRNG, the simulation's production source of randomness.
///
/// The sim state owns exactly one `GameRng`, seeded from the session seed, so
/// a run is fully reproducible from `(seed, config, actions)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f32` in [0, 1) from the upper 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

impl RandomSource for GameRng {
    fn next_unit(&mut self) -> f32 {
        self.next_f32()
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Replays a fixed list of unit floats, wrapping around at the end.
///
/// Values are clamped into `[0, 1)` on construction so a test can write
/// `1.0` to mean "as high as possible" without breaking the trait contract.
/// An empty script always yields 0.0.
#[derive(Clone, Debug, Default)]
pub struct SequenceRng {
    values: Vec<f32>,
    cursor: usize,
}

impl SequenceRng {
    pub fn new(values: impl Into<Vec<f32>>) -> Self {
        let values = values
            .into()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f32::EPSILON))
            .collect();
        Self { values, cursor: 0 }
    }

    /// A source that always returns `value`.
    pub fn constant(value: f32) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws made so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for SequenceRng {
    fn next_unit(&mut self) -> f32 {
        if self.values.is_empty() {
            self.cursor += 1;
            return 0.0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}
