// Creature registry: roster, inventory, and the single deployed companion.
//
// Owns every creature in the session:
// - `roster`: creatures live in the world (wild ones, plus the deployed
//   companion), keyed by `CreatureId` in a `BTreeMap` so iteration order is
//   the id order.
// - `inventory`: captured creatures in slot order. An inventory entry stays
//   in its slot while deployed; the roster holds a clone of it.
// - `out_slot`: which inventory slot, if any, is currently deployed. At most
//   one slot is out at a time.
// - `directory`: `CreatureId -> Placement` for every id ever handed out.
//   The capture protocol
//   finalizes by looking the projectile's pinned target id up here, so a
//   creature that moved container in the meantime is detected and skipped
//   instead of matched by position.
//
// Frame order (driven by `sim.rs`): projectile substeps each call
// `resolve_capture` for finished shake sequences, then
// `handle_capture_collisions`; after all substeps, `update_all` advances the
// roster and `update_inventory` stores anything newly captured.
//
// Inventory operations return `Result<_, InventoryError>`. A rejected request
// leaves the registry untouched.
//
// See also: `creature.rs` for the state machine driven from here,
// `projectile.rs` for the lock/shake protocol, `event.rs` for the events
// pushed here.
//
// **Critical constraint: determinism.** Ids are a counter starting at 1 and
// never reused. The catch roll is drawn from the caller's `RandomSource` in
// roster-id order, one draw per capture trigger.

use crate::config::WanderParams;
use crate::creature::{Creature, CreaturePose, CreatureTick};
use crate::error::{CaptureEvent, InventoryError};
use crate::event::SimEventKind;
use crate::projectile::{CaptureResolution, Projectile};
use crate::species::SpeciesTable;
use crate::terrain::Terrain;
use crate::types::{CaptureState, CreatureId, Placement, SpeciesId, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use wildcatch_prng::RandomSource;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreatureRegistry {
    roster: BTreeMap<CreatureId, Creature>,
    inventory: Vec<Creature>,
    out_slot: Option<usize>,
    directory: BTreeMap<CreatureId, Placement>,
    next_id: u32,
}

impl CreatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, id: CreatureId) -> Option<&Creature> {
        self.roster.get(&id)
    }

    pub fn get_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.roster.get_mut(&id)
    }

    /// Creatures in the world, in id order.
    pub fn roster(&self) -> impl Iterator<Item = &Creature> {
        self.roster.values()
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    pub fn inventory(&self) -> &[Creature] {
        &self.inventory
    }

    pub fn placement(&self, id: CreatureId) -> Option<Placement> {
        self.directory.get(&id).copied()
    }

    /// True for a deployed companion (an inventory creature in the roster).
    pub fn is_owned(&self, id: CreatureId) -> bool {
        matches!(self.placement(id), Some(Placement::Companion { .. }))
    }

    pub fn is_out(&self, slot: usize) -> bool {
        self.out_slot == Some(slot)
    }

    pub fn out_slot(&self) -> Option<usize> {
        self.out_slot
    }

    /// Wild creatures a projectile could currently start a capture on.
    pub fn capturable(&self) -> impl Iterator<Item = &Creature> {
        self.roster
            .values()
            .filter(|c| c.is_capturable() && !self.is_owned(c.id))
    }

    pub fn poses(&self, species: &SpeciesTable) -> Vec<CreaturePose> {
        self.roster.values().map(|c| c.pose(species)).collect()
    }

    // -----------------------------------------------------------------------
    // Roster lifecycle
    // -----------------------------------------------------------------------

    /// Add a wild creature to the roster. Ids start at 1.
    pub fn spawn_creature(
        &mut self,
        species: SpeciesId,
        position: Vec3,
        speed: f32,
        radius: f32,
        wander: &WanderParams,
        rng: &mut dyn RandomSource,
    ) -> CreatureId {
        self.next_id += 1;
        let id = CreatureId(self.next_id);
        let creature = Creature::new(id, species, position, speed, radius, wander, rng);
        self.roster.insert(id, creature);
        self.directory.insert(id, Placement::Wild);
        id
    }

    /// Advance every roster creature by one frame.
    pub fn update_all(
        &mut self,
        dt: f32,
        terrain: Option<&dyn Terrain>,
        obstacles: &[Vec3],
        wander: &WanderParams,
        rng: &mut dyn RandomSource,
        events: &mut Vec<SimEventKind>,
    ) {
        for creature in self.roster.values_mut() {
            if creature.update(dt, terrain, obstacles, wander, rng) == CreatureTick::Recovered {
                events.push(SimEventKind::BrokeFree {
                    creature_id: creature.id,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Capture protocol
    // -----------------------------------------------------------------------

    /// Start captures for every eligible creature that a free-flying
    /// projectile overlaps.
    ///
    /// Each creature takes the first flying projectile (in spawn order) that
    /// touches it and has not already targeted it. That projectile locks on
    /// and cannot capture anything else.
    pub fn handle_capture_collisions(
        &mut self,
        projectiles: &mut [Projectile],
        species: &SpeciesTable,
        rng: &mut dyn RandomSource,
        events: &mut Vec<SimEventKind>,
    ) {
        for (&id, creature) in &mut self.roster {
            if !creature.is_capturable()
                || matches!(self.directory.get(&id), Some(Placement::Companion { .. }))
            {
                continue;
            }

            let hit = projectiles.iter_mut().find(|p| {
                let reach = p.radius + creature.radius;
                p.is_active()
                    && p.target != Some(id)
                    && (p.position - creature.position).length_squared() <= reach * reach
            });
            let Some(projectile) = hit else {
                continue;
            };

            if let Err(err) = creature.apply(CaptureEvent::Hit) {
                debug!(%err, "capture trigger rejected");
                continue;
            }
            let roll = rng.next_unit();
            let success = roll <= species.catch_rate(creature.species);
            let anchor = creature.position + Vec3::new(0.0, creature.radius, 0.0);
            projectile.lock_onto(id, anchor, success);

            debug!(creature = %id, projectile = %projectile.id, roll, success, "capture started");
            events.push(SimEventKind::CaptureStarted {
                creature_id: id,
                projectile_id: projectile.id,
            });
        }
    }

    /// Apply the outcome of a finished shake sequence to its target.
    ///
    /// The target is found by id. If it is no longer a wild roster creature
    /// in the Capturing state the resolution is dropped.
    pub fn resolve_capture(&mut self, resolution: CaptureResolution, events: &mut Vec<SimEventKind>) {
        let target = resolution.target;
        let creature = match self.directory.get(&target) {
            Some(Placement::Wild) => self.roster.get_mut(&target),
            _ => None,
        };
        let Some(creature) = creature.filter(|c| c.state() == CaptureState::Capturing) else {
            debug!(creature = %target, "capture target gone, resolution dropped");
            return;
        };

        let event = if resolution.success {
            CaptureEvent::Secure
        } else {
            CaptureEvent::BreakFree
        };
        if let Err(err) = creature.apply(event) {
            debug!(%err, "capture resolution rejected");
            return;
        }

        if resolution.success {
            info!(creature = %target, "capture succeeded");
            events.push(SimEventKind::CaptureSucceeded { creature_id: target });
        } else {
            info!(creature = %target, "capture failed");
            events.push(SimEventKind::CaptureFailed { creature_id: target });
        }
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    /// Move every captured, hidden, wild creature from the roster into the
    /// inventory. Idempotent: a second call with nothing new changes nothing.
    pub fn update_inventory(&mut self, events: &mut Vec<SimEventKind>) {
        let ready: Vec<CreatureId> = self
            .roster
            .values()
            .filter(|c| {
                c.state() == CaptureState::Captured
                    && !c.visible
                    && !matches!(self.directory.get(&c.id), Some(Placement::Companion { .. }))
            })
            .map(|c| c.id)
            .collect();

        for id in ready {
            let Some(creature) = self.roster.remove(&id) else {
                continue;
            };
            let slot = self.inventory.len();
            self.inventory.push(creature);
            self.directory.insert(id, Placement::Stored { slot });
            info!(creature = %id, slot, "stored in inventory");
            events.push(SimEventKind::Stored { creature_id: id, slot });
        }
    }

    /// Deploy the creature in `slot` at `position` as a companion.
    pub fn send_out(
        &mut self,
        slot: usize,
        position: Vec3,
        events: &mut Vec<SimEventKind>,
    ) -> Result<CreatureId, InventoryError> {
        let len = self.inventory.len();
        let Some(stored) = self.inventory.get(slot) else {
            debug!(slot, len, "send out rejected: no such slot");
            return Err(InventoryError::SlotOutOfRange { slot, len });
        };
        if let Some(out) = self.out_slot {
            debug!(slot, out, "send out rejected: companion already out");
            return Err(InventoryError::CompanionAlreadyOut { out });
        }

        let mut companion = stored.clone();
        companion.position = position;
        if let Err(err) = companion.apply(CaptureEvent::Deploy) {
            warn!(%err, "stored creature was not in the Captured state");
        }
        let id = companion.id;
        self.roster.insert(id, companion);
        self.directory.insert(id, Placement::Companion { slot });
        self.out_slot = Some(slot);

        info!(creature = %id, slot, "sent out");
        events.push(SimEventKind::SentOut { creature_id: id, slot });
        Ok(id)
    }

    /// Withdraw the companion deployed from `slot`.
    pub fn recall(
        &mut self,
        slot: usize,
        events: &mut Vec<SimEventKind>,
    ) -> Result<CreatureId, InventoryError> {
        let len = self.inventory.len();
        let Some(stored) = self.inventory.get(slot) else {
            debug!(slot, len, "recall rejected: no such slot");
            return Err(InventoryError::SlotOutOfRange { slot, len });
        };
        if !self.is_out(slot) {
            debug!(slot, "recall rejected: slot is not out");
            return Err(InventoryError::NotOut { slot });
        }

        let id = stored.id;
        if self.roster.remove(&id).is_none() {
            warn!(creature = %id, slot, "companion missing from roster; clearing out slot");
        }
        self.directory.insert(id, Placement::Stored { slot });
        self.out_slot = None;

        info!(creature = %id, slot, "recalled");
        events.push(SimEventKind::Recalled { creature_id: id, slot });
        Ok(id)
    }
}
