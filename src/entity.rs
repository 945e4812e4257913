//! Entity identity and lifecycle
//!
//! Entities are numeric ids with a generation counter for safe reuse.
//! The manager owns the free list and, per entity, the bitset of attached
//! component type indices. Deletions are deferred: an id marked for
//! deletion stays structurally intact until the next synchronization pass
//! has notified every subscription, and only then returns to the free list.

use std::collections::HashSet;

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use crate::error::EcsError;

/// Entity identifier.
///
/// Packs a slot index (lower 32 bits) with a generation counter (upper 32
/// bits). The generation increments when a slot is recycled, so a stale id
/// held across a deletion never aliases the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index into the manager's tables.
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation of the slot when this id was issued.
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw packed form, for external serializers.
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
    pending_delete: bool,
}

/// Allocates and recycles entity ids and tracks per-entity component bits.
///
/// Source of truth for "does entity E currently have component type T".
/// Bits update synchronously on attach/detach; subscription-visible state
/// updates only at synchronization points.
pub struct EntityManager {
    slots: Vec<Slot>,
    bits: Vec<FixedBitSet>,
    free: Vec<u32>,
    alive: usize,
    bit_width: usize,
}

impl EntityManager {
    pub fn with_capacity(expected_entities: usize, expected_types: usize) -> Self {
        Self {
            slots: Vec::with_capacity(expected_entities),
            bits: Vec::with_capacity(expected_entities),
            free: Vec::new(),
            alive: 0,
            bit_width: expected_types,
        }
    }

    /// Allocates an id, reusing a recycled slot when one is available.
    ///
    /// A reused slot's bitset is guaranteed all-zero: it was cleared when
    /// the previous occupant was recycled.
    pub fn create(&mut self) -> EntityId {
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            EntityId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                alive: true,
                pending_delete: false,
            });
            self.bits.push(FixedBitSet::with_capacity(self.bit_width));
            EntityId::new(index, 0)
        };
        self.alive += 1;
        tracing::trace!(entity = id.raw(), "entity created");
        id
    }

    /// Marks an id for deletion at the next synchronization pass.
    ///
    /// The entity stays active (and mutable) until that boundary so that
    /// in-flight iteration never observes a half-torn-down entity.
    pub fn delete(&mut self, id: EntityId) -> Result<(), EcsError> {
        if !self.is_active(id) || self.is_pending_delete(id) {
            return Err(EcsError::InvalidEntity(id));
        }
        self.slots[id.index() as usize].pending_delete = true;
        tracing::trace!(entity = id.raw(), "entity marked for deletion");
        Ok(())
    }

    /// True if the id names a live slot of the matching generation.
    ///
    /// Ids pending deletion are still active until the sync boundary.
    pub fn is_active(&self, id: EntityId) -> bool {
        match self.slots.get(id.index() as usize) {
            Some(slot) => slot.alive && slot.generation == id.generation(),
            None => false,
        }
    }

    pub fn is_pending_delete(&self, id: EntityId) -> bool {
        self.is_active(id) && self.slots[id.index() as usize].pending_delete
    }

    /// Live component bits for an active id.
    pub fn bits(&self, id: EntityId) -> Option<&FixedBitSet> {
        if self.is_active(id) {
            Some(&self.bits[id.index() as usize])
        } else {
            None
        }
    }

    pub(crate) fn set_bit(&mut self, index: u32, bit: usize) {
        let bits = &mut self.bits[index as usize];
        bits.grow(bit + 1);
        bits.insert(bit);
    }

    pub(crate) fn clear_bit(&mut self, index: u32, bit: usize) {
        let bits = &mut self.bits[index as usize];
        if bit < bits.len() {
            bits.set(bit, false);
        }
    }

    /// Returns a deleted entity's slot to the free list.
    ///
    /// Must only run after every subscription holding the id has delivered
    /// its removal notification; the world's synchronization pass is the
    /// sole caller. A non-pending id here is a core bug.
    pub(crate) fn recycle(&mut self, id: EntityId) {
        let index = id.index() as usize;
        let slot = &mut self.slots[index];
        assert!(
            slot.alive && slot.pending_delete && slot.generation == id.generation(),
            "recycle of entity {:?} that was never marked for deletion",
            id
        );
        slot.alive = false;
        slot.pending_delete = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.bits[index].clear();
        self.free.push(index as u32);
        self.alive -= 1;
        tracing::trace!(entity = id.raw(), "entity recycled");
    }

    /// Active entities and their live bits, excluding ids pending deletion.
    ///
    /// Used to backfill subscriptions created mid-run; excluding doomed ids
    /// keeps the listener contract that a removal only ever follows an
    /// insertion.
    pub fn iter_active(&self) -> impl Iterator<Item = (EntityId, &FixedBitSet)> {
        self.slots
            .iter()
            .zip(self.bits.iter())
            .enumerate()
            .filter(|(_, (slot, _))| slot.alive && !slot.pending_delete)
            .map(|(index, (slot, bits))| (EntityId::new(index as u32, slot.generation), bits))
    }

    /// Count of active entities, including ids pending deletion.
    pub fn count(&self) -> usize {
        self.alive
    }
}

/// Buffered record of entities touched since the last synchronization.
///
/// Append-only during a tick, drained exactly once at the boundary. This
/// is what makes composition changes visible in batches rather than per
/// write.
#[derive(Default)]
pub(crate) struct ChangeBuffer {
    changed: Vec<EntityId>,
    changed_set: HashSet<u64>,
    deleted: Vec<EntityId>,
    deleted_set: HashSet<u64>,
}

impl ChangeBuffer {
    /// Records a composition change. Re-marking the same id in one tick is
    /// a no-op, so an entity touched many times is reindexed once.
    pub fn mark_changed(&mut self, id: EntityId) {
        if self.changed_set.insert(id.raw()) {
            self.changed.push(id);
        }
    }

    pub fn mark_deleted(&mut self, id: EntityId) {
        if self.deleted_set.insert(id.raw()) {
            self.deleted.push(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Takes both sets, leaving the buffer clear for the next tick.
    pub fn drain(&mut self) -> (Vec<EntityId>, Vec<EntityId>) {
        self.changed_set.clear();
        self.deleted_set.clear();
        (
            std::mem::take(&mut self.changed),
            std::mem::take(&mut self.deleted),
        )
    }
}
