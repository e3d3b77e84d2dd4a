//! Free-slot index
//!
//! Buckets of unused lockers keyed by size class. The map is ordered, so the
//! best-fit lookup is a range query starting at the requested class.
//!
//! ```text
//! FreeSlotIndex
//!   ├─→ S  → [1]
//!   ├─→ M  → [2, 3]     (front is handed out first)
//!   └─→ L  → [4]
//! ```
//!
//! Buckets are pruned as soon as they become empty, so every key present in
//! the map has at least one free slot.

use super::size_class::SizeClass;
use super::slot::{Slot, SlotId};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashSet, VecDeque};

#[derive(Debug, Default, Clone)]
pub struct FreeSlotIndex {
    buckets: BTreeMap<SizeClass, VecDeque<SlotId>>,
    len: usize,
}

impl FreeSlotIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-insert lockers given as parallel `sizes` / `ids` sequences
    ///
    /// All-or-nothing: the input is validated before anything is inserted.
    pub fn provision(&mut self, sizes: &[SizeClass], ids: &[SlotId]) -> Result<()> {
        if sizes.len() != ids.len() {
            return Err(Error::InvalidInput(format!(
                "Got {} sizes but {} locker ids",
                sizes.len(),
                ids.len()
            )));
        }

        self.provision_slots(
            sizes
                .iter()
                .zip(ids)
                .map(|(&class, &id)| Slot::new(id, class)),
        )
    }

    /// Bulk-insert lockers, in order, into the bucket of their class
    pub fn provision_slots<I>(&mut self, slots: I) -> Result<()>
    where
        I: IntoIterator<Item = Slot>,
    {
        let slots: Vec<Slot> = slots.into_iter().collect();

        let mut seen: HashSet<SlotId> = self.buckets.values().flatten().copied().collect();
        for slot in &slots {
            if !seen.insert(slot.id) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate locker id {}",
                    slot.id
                )));
            }
        }

        for slot in slots {
            self.push_back(slot);
        }

        Ok(())
    }

    /// Take the front slot of the smallest non-empty class `>= required`
    pub fn acquire_best_fit(&mut self, required: SizeClass) -> Result<Slot> {
        let class = self
            .best_fit_class(required)
            .ok_or(Error::NoCapacity { requested: required })?;

        let bucket = self
            .buckets
            .get_mut(&class)
            .ok_or(Error::NoCapacity { requested: required })?;
        let id = bucket
            .pop_front()
            .ok_or(Error::NoCapacity { requested: required })?;

        if bucket.is_empty() {
            self.buckets.remove(&class);
        }
        self.len -= 1;

        debug_assert!(class.can_fit(required));

        Ok(Slot::new(id, class))
    }

    /// Return a slot to the back of its class bucket
    ///
    /// The caller guarantees the slot is not already free. Debug builds
    /// only check the slot's own bucket.
    pub fn release(&mut self, id: SlotId, class: SizeClass) {
        debug_assert!(
            !self.buckets.get(&class).is_some_and(|bucket| bucket.contains(&id)),
            "releasing free locker {}",
            id
        );
        self.push_back(Slot::new(id, class));
    }

    /// Smallest class `>= required` that has a free slot, if any
    pub fn best_fit_class(&self, required: SizeClass) -> Option<SizeClass> {
        self.buckets.range(required..).next().map(|(&class, _)| class)
    }

    /// Number of free slots of exactly `class`
    pub fn free_count(&self, class: SizeClass) -> usize {
        self.buckets.get(&class).map_or(0, VecDeque::len)
    }

    /// Free slots of `class` in hand-out order
    pub fn free_slots(&self, class: SizeClass) -> Vec<SlotId> {
        self.buckets
            .get(&class)
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `id` is currently free (linear scan)
    pub fn contains(&self, id: SlotId) -> bool {
        self.buckets.values().any(|bucket| bucket.contains(&id))
    }

    /// Iterate non-empty buckets, smallest class first
    pub fn buckets(&self) -> impl Iterator<Item = (SizeClass, &VecDeque<SlotId>)> {
        self.buckets.iter().map(|(&class, bucket)| (class, bucket))
    }

    /// Total number of free slots
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push_back(&mut self, slot: Slot) {
        self.buckets.entry(slot.class).or_default().push_back(slot.id);
        self.len += 1;
    }
}
