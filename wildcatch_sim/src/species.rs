// Species data: data-driven creature descriptors.
//
// Everything that differs between kinds of creature (how big they draw, how
// hard they are to catch, their inventory color, which model the renderer
// uses) is data in `SpeciesData`, loaded from the game config. The sim has a
// single `Creature` type and looks species values up at runtime through a
// `SpeciesId` handle, so creatures never hold references into the table.
//
// See also: `config.rs` where the species list lives, `creature.rs` for the
// `Creature` type that carries a `SpeciesId`.

use crate::types::SpeciesId;
use serde::{Deserialize, Serialize};

/// Immutable descriptor shared by every creature of one species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesData {
    pub name: String,

    /// Uniform scale the renderer applies to the species model.
    pub display_scale: f32,

    /// Probability in [0, 1] that a capture roll succeeds.
    pub catch_rate: f32,

    /// RGB color used by the inventory overlay.
    pub display_color: [f32; 3],

    /// Opaque model handle resolved by the renderer. The sim never
    /// interprets it.
    pub render_handle: u32,
}

/// Catch rate used when a creature's species handle does not resolve.
pub const FALLBACK_CATCH_RATE: f32 = 0.5;

/// Arena of species descriptors, addressed by `SpeciesId` (the index).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpeciesTable {
    entries: Vec<SpeciesData>,
}

impl SpeciesTable {
    pub fn new(entries: Vec<SpeciesData>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: SpeciesId) -> Option<&SpeciesData> {
        self.entries.get(id.0 as usize)
    }

    /// Catch rate for `id`, or `FALLBACK_CATCH_RATE` for an unknown handle.
    pub fn catch_rate(&self, id: SpeciesId) -> f32 {
        self.get(id).map_or(FALLBACK_CATCH_RATE, |s| s.catch_rate)
    }

    /// Display scale for `id`, or 1.0 for an unknown handle.
    pub fn display_scale(&self, id: SpeciesId) -> f32 {
        self.get(id).map_or(1.0, |s| s.display_scale)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All handles in table order.
    pub fn ids(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        (0..self.entries.len()).map(|i| SpeciesId(i as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SpeciesTable {
        SpeciesTable::new(vec![
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
        ])
    }

    #[test]
    fn lookup_by_handle() {
        let t = table();
        assert_eq!(t.catch_rate(SpeciesId(1)), 0.3);
        assert_eq!(t.display_scale(SpeciesId(0)), 0.25);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn unknown_handle_falls_back() {
        let t = table();
        assert!(t.get(SpeciesId(9)).is_none());
        assert_eq!(t.catch_rate(SpeciesId(9)), FALLBACK_CATCH_RATE);
        assert_eq!(t.display_scale(SpeciesId(9)), 1.0);
    }

    #[test]
    fn ids_in_table_order() {
        let t = table();
        assert_eq!(t.ids().collect::<Vec<_>>(), vec![SpeciesId(0), SpeciesId(1)]);
    }
}
