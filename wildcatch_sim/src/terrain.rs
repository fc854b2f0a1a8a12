// Terrain height and normal queries.
//
// `Heightfield` is a dense grid of elevation samples stored as a flat
// `Vec<f32>` indexed by `i + j * width` (i along X, j along Z). The grid is
// centered on the world origin: sample (0, 0) sits at world
// `(-half_width, -half_depth)` and samples are `cell_size` meters apart.
//
// Queries:
// - `height_at(x, z)`: world → fractional grid coordinates, clamped to the
//   grid, then bilinear interpolation of the enclosing cell's four corners.
//   Exact at sample nodes; continuous everywhere.
// - `normal_at(x, z)`: central differences of `height_at` at ± one cell in X
//   and Z, forming `(-dh/dx, 1, -dh/dz)` normalized. Derived from the height
//   function itself so collision normals always agree with collision heights.
//
// A grid narrower than two samples on either axis is degenerate and reads as
// flat ground at height 0. Loading code that hits malformed input calls
// `load_or_flat`, which logs and returns such a field instead of failing.
//
// The `Terrain` trait is the seam the rest of the sim consumes: creatures and
// projectiles only ever ask for heights and normals. `FlatGround` implements
// it for sessions with no heightmap loaded.
//
// See also: `creature.rs` (terrain following), `projectile.rs` (terrain
// bounce), `scatter.rs` (flatness checks when placing entities).

use crate::error::TerrainError;
use crate::types::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Height/normal query surface.
pub trait Terrain {
    /// Elevation at world `(x, z)`.
    fn height_at(&self, x: f32, z: f32) -> f32;
    /// Unit surface normal at world `(x, z)`.
    fn normal_at(&self, x: f32, z: f32) -> Vec3;
}

/// An infinite horizontal plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlatGround {
    pub height: f32,
}

impl Terrain for FlatGround {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }

    fn normal_at(&self, _x: f32, _z: f32) -> Vec3 {
        Vec3::Y
    }
}

/// Immutable grid of elevation samples.
///
/// Deserialization re-runs the checks in `new`; a saved field that fails them
/// loads as `flat()` with a warning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "SavedHeightfield")]
pub struct Heightfield {
    /// Flat storage: index = i + j * width.
    heights: Vec<f32>,
    /// Samples along X.
    width: usize,
    /// Samples along Z.
    depth: usize,
    cell_size: f32,
    half_width: f32,
    half_depth: f32,
}

/// On-disk shape of a `Heightfield`. Derived half extents are recomputed.
#[derive(Deserialize)]
struct SavedHeightfield {
    heights: Vec<f32>,
    width: usize,
    depth: usize,
    cell_size: f32,
}

impl From<SavedHeightfield> for Heightfield {
    fn from(saved: SavedHeightfield) -> Self {
        if saved.heights.is_empty() && (saved.width < 2 || saved.depth < 2) {
            return Self::flat();
        }
        match Self::new(saved.width, saved.depth, saved.cell_size, saved.heights) {
            Ok(field) => field,
            Err(err) => {
                warn!(%err, "saved heightfield rejected, using flat terrain");
                Self::flat()
            }
        }
    }
}

impl Default for Heightfield {
    fn default() -> Self {
        Self::flat()
    }
}

impl Heightfield {
    /// Build a heightfield from `width * depth` samples in row-major order
    /// (X fastest).
    pub fn new(
        width: usize,
        depth: usize,
        cell_size: f32,
        heights: Vec<f32>,
    ) -> Result<Self, TerrainError> {
        if width < 2 || depth < 2 {
            return Err(TerrainError::TooSmall { width, depth });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(TerrainError::CellSize(cell_size));
        }
        let expected = width * depth;
        if heights.len() != expected {
            return Err(TerrainError::SampleCount {
                expected,
                actual: heights.len(),
            });
        }
        if let Some(index) = heights.iter().position(|h| !h.is_finite()) {
            return Err(TerrainError::NonFinite { index });
        }
        Ok(Self {
            heights,
            width,
            depth,
            cell_size,
            half_width: (width - 1) as f32 * cell_size * 0.5,
            half_depth: (depth - 1) as f32 * cell_size * 0.5,
        })
    }

    /// Build from 8-bit grayscale pixels: height = `gray / 255 * height_scale`.
    /// Brighter pixels are higher.
    pub fn from_grayscale(
        pixels: &[u8],
        width: usize,
        depth: usize,
        cell_size: f32,
        height_scale: f32,
    ) -> Result<Self, TerrainError> {
        let heights = pixels
            .iter()
            .map(|&p| p as f32 / 255.0 * height_scale)
            .collect();
        Self::new(width, depth, cell_size, heights)
    }

    /// Build by evaluating `f(i, j)` at every sample.
    pub fn from_fn(
        width: usize,
        depth: usize,
        cell_size: f32,
        f: impl Fn(usize, usize) -> f32,
    ) -> Result<Self, TerrainError> {
        let mut heights = Vec::with_capacity(width * depth);
        for j in 0..depth {
            for i in 0..width {
                heights.push(f(i, j));
            }
        }
        Self::new(width, depth, cell_size, heights)
    }

    /// Degenerate field: every query returns height 0 and normal +Y.
    pub fn flat() -> Self {
        Self {
            heights: Vec::new(),
            width: 0,
            depth: 0,
            cell_size: 1.0,
            half_width: 0.0,
            half_depth: 0.0,
        }
    }

    /// Like `from_grayscale`, but malformed input degrades to `flat()` with a
    /// warning instead of an error.
    pub fn load_or_flat(
        pixels: &[u8],
        width: usize,
        depth: usize,
        cell_size: f32,
        height_scale: f32,
    ) -> Self {
        match Self::from_grayscale(pixels, width, depth, cell_size, height_scale) {
            Ok(field) => field,
            Err(err) => {
                warn!(%err, "heightmap rejected, using flat terrain");
                Self::flat()
            }
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width < 2 || self.depth < 2
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World-space half extents `(x, z)` of the grid.
    pub fn half_extents(&self) -> (f32, f32) {
        (self.half_width, self.half_depth)
    }

    /// Raw sample at grid `(i, j)`, clamped to the grid.
    pub fn sample(&self, i: usize, j: usize) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        let i = i.min(self.width - 1);
        let j = j.min(self.depth - 1);
        self.heights[i + j * self.width]
    }

    /// World position of sample `(i, j)`.
    pub fn sample_position(&self, i: usize, j: usize) -> Vec3 {
        Vec3::new(
            i as f32 * self.cell_size - self.half_width,
            self.sample(i, j),
            j as f32 * self.cell_size - self.half_depth,
        )
    }
}

impl Terrain for Heightfield {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        let max_u = (self.width - 1) as f32;
        let max_v = (self.depth - 1) as f32;
        // NaN inputs clamp to NaN; treat them as the grid origin.
        let u = ((x + self.half_width) / self.cell_size).clamp(0.0, max_u);
        let v = ((z + self.half_depth) / self.cell_size).clamp(0.0, max_v);
        let u = if u.is_nan() { 0.0 } else { u };
        let v = if v.is_nan() { 0.0 } else { v };

        let i = u.floor() as usize;
        let j = v.floor() as usize;
        let tx = u - i as f32;
        let tz = v - j as f32;

        let h00 = self.sample(i, j);
        let h10 = self.sample(i + 1, j);
        let h01 = self.sample(i, j + 1);
        let h11 = self.sample(i + 1, j + 1);

        let h0 = (1.0 - tx) * h00 + tx * h10;
        let h1 = (1.0 - tx) * h01 + tx * h11;
        (1.0 - tz) * h0 + tz * h1
    }

    fn normal_at(&self, x: f32, z: f32) -> Vec3 {
        let eps = self.cell_size;
        let h_left = self.height_at(x - eps, z);
        let h_right = self.height_at(x + eps, z);
        let h_down = self.height_at(x, z - eps);
        let h_up = self.height_at(x, z + eps);

        let dx = (h_right - h_left) / (2.0 * eps);
        let dz = (h_up - h_down) / (2.0 * eps);
        Vec3::new(-dx, 1.0, -dz).normalize_or(Vec3::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x3 grid, cell size 1, centered: samples at x,z in {-1, 0, 1}.
    fn small_field() -> Heightfield {
        Heightfield::new(
            3,
            3,
            1.0,
            vec![
                0.0, 1.0, 2.0, //
                1.0, 2.0, 3.0, //
                4.0, 4.0, 4.0,
            ],
        )
        .unwrap()
    }

    #[test]
    fn exact_at_sample_nodes() {
        let field = small_field();
        for j in 0..3 {
            for i in 0..3 {
                let p = field.sample_position(i, j);
                assert_eq!(field.height_at(p.x, p.z), field.sample(i, j), "node ({i}, {j})");
            }
        }
    }

    #[test]
    fn bilinear_midpoint_is_corner_average() {
        let field = small_field();
        // Center of the first cell: corners 0, 1, 1, 2.
        let h = field.height_at(-0.5, -0.5);
        assert!((h - 1.0).abs() < 1e-6);
    }

    #[test]
    fn continuous_within_a_cell() {
        let field = small_field();
        // Cell (1, 1) has corners 2, 3, 4, 4 -> max corner delta 2.
        let max_delta = 2.0;
        let mut prev = field.height_at(0.0, 0.0);
        for step in 1..=100 {
            let t = step as f32 / 100.0;
            let h = field.height_at(t, t);
            assert!((h - prev).abs() <= max_delta * 0.02 + 1e-5);
            prev = h;
        }
    }

    #[test]
    fn queries_clamp_outside_the_grid() {
        let field = small_field();
        assert_eq!(field.height_at(-50.0, -50.0), 0.0);
        assert_eq!(field.height_at(50.0, 50.0), 4.0);
        assert_eq!(field.height_at(50.0, -50.0), 2.0);
    }

    #[test]
    fn degenerate_field_is_flat_zero() {
        let field = Heightfield::flat();
        assert!(field.is_degenerate());
        assert_eq!(field.height_at(3.0, -7.0), 0.0);
        assert_eq!(field.normal_at(3.0, -7.0), Vec3::Y);
    }

    #[test]
    fn normal_of_flat_plane_is_up() {
        let field = Heightfield::from_fn(4, 4, 0.5, |_, _| 2.0).unwrap();
        let n = field.normal_at(0.1, 0.2);
        assert!((n - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn normal_of_ramp_tilts_against_gradient() {
        // Height rises 1 m per meter along +X.
        let field = Heightfield::from_fn(9, 9, 1.0, |i, _| i as f32).unwrap();
        let n = field.normal_at(0.0, 0.0);
        let expected = Vec3::new(-1.0, 1.0, 0.0).normalize();
        assert!((n - expected).length() < 1e-5, "got {n:?}");
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn grayscale_maps_brightness_to_height() {
        let field = Heightfield::from_grayscale(&[0, 255, 51, 102], 2, 2, 1.0, 5.0).unwrap();
        assert_eq!(field.sample(0, 0), 0.0);
        assert_eq!(field.sample(1, 0), 5.0);
        assert!((field.sample(0, 1) - 1.0).abs() < 1e-6);
        assert_eq!(field.half_extents(), (0.5, 0.5));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(
            Heightfield::new(1, 4, 1.0, vec![0.0; 4]),
            Err(TerrainError::TooSmall { width: 1, depth: 4 })
        );
        assert_eq!(
            Heightfield::new(2, 2, 1.0, vec![0.0; 3]),
            Err(TerrainError::SampleCount { expected: 4, actual: 3 })
        );
        assert_eq!(
            Heightfield::new(2, 2, 0.0, vec![0.0; 4]),
            Err(TerrainError::CellSize(0.0))
        );
        assert_eq!(
            Heightfield::new(2, 2, 1.0, vec![0.0, f32::NAN, 0.0, 0.0]),
            Err(TerrainError::NonFinite { index: 1 })
        );
    }

    #[test]
    fn load_or_flat_degrades() {
        let field = Heightfield::load_or_flat(&[1, 2, 3], 2, 2, 1.0, 5.0);
        assert!(field.is_degenerate());
        assert_eq!(field.height_at(0.0, 0.0), 0.0);
    }

    #[test]
    fn saved_field_roundtrips() {
        let field = small_field();
        let json = serde_json::to_string(&field).unwrap();
        let restored: Heightfield = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, field);

        let flat_json = serde_json::to_string(&Heightfield::flat()).unwrap();
        let restored: Heightfield = serde_json::from_str(&flat_json).unwrap();
        assert!(restored.is_degenerate());
    }

    #[test]
    fn tampered_saved_field_loads_flat() {
        let mut value = serde_json::to_value(small_field()).unwrap();
        value["heights"] = serde_json::json!([0.0, 1.0, 2.0, 3.0]);
        let restored: Heightfield = serde_json::from_value(value).unwrap();
        assert!(restored.is_degenerate());
        assert_eq!(restored.height_at(0.9, 0.9), 0.0);
        assert_eq!(restored.normal_at(0.9, 0.9), Vec3::Y);
    }

    #[test]
    fn flat_ground_is_constant() {
        let g = FlatGround { height: -0.5 };
        assert_eq!(g.height_at(10.0, 10.0), -0.5);
        assert_eq!(g.normal_at(0.0, 0.0), Vec3::Y);
    }
}
