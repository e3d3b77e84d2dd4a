//! Locker allocation engine
//!
//! Combines the free-slot index and the assignment table behind one mutex.
//! Every public operation runs as a single critical section, so concurrent
//! kiosks never receive the same locker and never observe a half-applied
//! store or retrieve.

use super::assignment::{Assignment, AssignmentTable};
use super::free_index::FreeSlotIndex;
use super::size_class::SizeClass;
use super::slot::{Slot, SlotId};
use super::snapshot::EngineSnapshot;
use crate::error::{Error, Result};
use crate::metrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// State guarded by the engine lock
#[derive(Debug, Default)]
struct StationState {
    index: FreeSlotIndex,
    assignments: AssignmentTable,
    /// Every provisioned locker and its class
    universe: HashMap<SlotId, SizeClass>,
}

impl StationState {
    fn publish_gauges(&self, station: &str) {
        for class in SizeClass::ALL {
            metrics::set_free_slots(station, class, self.index.free_count(class));
        }
        metrics::set_occupied_slots(station, self.assignments.len());
    }
}

/// Best-fit locker allocator for one station
///
/// Share it between callers with `Arc<LockerEngine>`; all methods take
/// `&self`.
pub struct LockerEngine {
    name: String,
    state: Mutex<StationState>,
}

impl LockerEngine {
    /// Create an engine with no lockers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(StationState::default()),
        }
    }

    /// Station name (labels logs and metrics)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bulk-load lockers given as parallel `sizes` / `ids` sequences
    ///
    /// Fails with [`Error::InvalidInput`] on mismatched lengths or on an id
    /// that is repeated or already known to this engine. Nothing is loaded
    /// on failure.
    #[instrument(skip(self, sizes, ids), fields(station = %self.name, count = ids.len()))]
    pub fn provision(&self, sizes: &[SizeClass], ids: &[SlotId]) -> Result<()> {
        if sizes.len() != ids.len() {
            return Err(Error::InvalidInput(format!(
                "Got {} sizes but {} locker ids",
                sizes.len(),
                ids.len()
            )));
        }

        let mut state = self.state.lock();

        if let Some(id) = ids.iter().find(|&id| state.universe.contains_key(id)) {
            return Err(Error::InvalidInput(format!(
                "Locker id {} is already provisioned",
                id
            )));
        }

        let slots: Vec<Slot> = sizes
            .iter()
            .zip(ids)
            .map(|(&class, &id)| Slot::new(id, class))
            .collect();
        state.index.provision_slots(slots.iter().copied())?;
        state
            .universe
            .extend(slots.iter().map(|slot| (slot.id, slot.class)));

        state.publish_gauges(&self.name);
        info!(
            lockers = slots.len(),
            total = state.universe.len(),
            "Provisioned lockers"
        );
        Ok(())
    }

    /// Put `item_id` into the smallest free locker that fits `size`
    ///
    /// Fails with [`Error::DuplicateItem`] if the item already holds a
    /// locker and with [`Error::NoCapacity`] if nothing of class `>= size`
    /// is free. Either failure leaves the engine untouched.
    #[instrument(skip(self), fields(station = %self.name))]
    pub fn store(&self, item_id: &str, size: SizeClass) -> Result<SlotId> {
        let mut state = self.state.lock();

        if state.assignments.contains(item_id) {
            metrics::record_store(&self.name, size, metrics::StoreOutcome::Duplicate);
            return Err(Error::DuplicateItem(item_id.to_string()));
        }

        let slot = match state.index.acquire_best_fit(size) {
            Ok(slot) => slot,
            Err(e) => {
                metrics::record_store(&self.name, size, metrics::StoreOutcome::NoCapacity);
                warn!(item = item_id, requested = %size, "No free locker fits package");
                return Err(e);
            }
        };

        state.assignments.insert(item_id, Assignment::new(slot))?;

        state.publish_gauges(&self.name);
        metrics::record_store(&self.name, size, metrics::StoreOutcome::Stored);
        debug!(item = item_id, requested = %size, slot = %slot, "Stored package");
        Ok(slot.id)
    }

    /// Release the locker held by `item_id` and return its id
    ///
    /// The locker goes back under the class recorded at store time.
    #[instrument(skip(self), fields(station = %self.name))]
    pub fn retrieve(&self, item_id: &str) -> Result<SlotId> {
        let mut state = self.state.lock();

        let assignment = match state.assignments.remove(item_id) {
            Ok(assignment) => assignment,
            Err(e) => {
                metrics::record_retrieve(&self.name, metrics::RetrieveOutcome::Unknown);
                return Err(e);
            }
        };
        state.index.release(assignment.slot, assignment.class);

        state.publish_gauges(&self.name);
        metrics::record_retrieve(&self.name, metrics::RetrieveOutcome::Retrieved);
        debug!(item = item_id, slot = %assignment.slot, class = %assignment.class, "Retrieved package");
        Ok(assignment.slot)
    }

    /// Where `item_id` is stored, if it is
    #[instrument(skip(self), fields(station = %self.name))]
    pub fn locate(&self, item_id: &str) -> Option<Assignment> {
        self.state.lock().assignments.get(item_id)
    }

    /// Per-class occupancy
    #[instrument(skip(self), fields(station = %self.name))]
    pub fn status(&self) -> StationStats {
        let state = self.state.lock();

        let mut totals: BTreeMap<SizeClass, usize> = BTreeMap::new();
        for &class in state.universe.values() {
            *totals.entry(class).or_default() += 1;
        }

        let classes = SizeClass::ALL
            .iter()
            .map(|&class| {
                let free = state.index.free_count(class);
                ClassStats {
                    class,
                    total: totals.get(&class).copied().unwrap_or(0),
                    free,
                    occupied: state.assignments.occupied_count(class),
                }
            })
            .collect();

        StationStats {
            station: self.name.clone(),
            classes,
            total_lockers: state.universe.len(),
            free_lockers: state.index.len(),
            outstanding_items: state.assignments.len(),
        }
    }

    /// Check that every locker is either free or assigned, exactly once,
    /// under its own class
    #[instrument(skip(self), fields(station = %self.name))]
    pub fn audit(&self) -> Result<()> {
        let state = self.state.lock();
        let mut seen: HashMap<SlotId, usize> = HashMap::with_capacity(state.universe.len());

        for (class, bucket) in state.index.buckets() {
            for &id in bucket {
                check_class(&state.universe, id, class)?;
                *seen.entry(id).or_default() += 1;
            }
        }

        for (item, assignment) in state.assignments.iter() {
            check_class(&state.universe, assignment.slot, assignment.class).map_err(|e| {
                Error::Corrupted(format!("Assignment of {:?}: {}", item, e))
            })?;
            *seen.entry(assignment.slot).or_default() += 1;
        }

        for &id in state.universe.keys() {
            match seen.get(&id).copied().unwrap_or(0) {
                1 => {}
                0 => {
                    return Err(Error::Corrupted(format!(
                        "Locker {} is neither free nor assigned",
                        id
                    )))
                }
                n => {
                    return Err(Error::Corrupted(format!(
                        "Locker {} appears {} times",
                        id, n
                    )))
                }
            }
        }

        Ok(())
    }

    /// Capture the free buckets (in hand-out order) and the assignments
    #[instrument(skip(self), fields(station = %self.name))]
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock();

        let free: BTreeMap<SizeClass, Vec<SlotId>> = state
            .index
            .buckets()
            .map(|(class, bucket)| (class, bucket.iter().copied().collect()))
            .collect();
        let assignments: BTreeMap<String, Assignment> = state
            .assignments
            .iter()
            .map(|(item, &assignment)| (item.to_string(), assignment))
            .collect();

        EngineSnapshot::new(self.name.clone(), free, assignments)
    }

    /// Rebuild the engine of station `name` from a snapshot
    ///
    /// Fails with [`Error::Corrupted`] if a locker appears more than once.
    #[instrument(skip(name, snapshot), fields(station = %name))]
    pub fn restore(name: &str, snapshot: EngineSnapshot) -> Result<Self> {
        if snapshot.station != name {
            warn!(snapshot_station = %snapshot.station, "Snapshot was taken under another station name");
        }

        let mut state = StationState::default();

        for (&class, ids) in &snapshot.free {
            for &id in ids {
                if state.universe.insert(id, class).is_some() {
                    return Err(Error::Corrupted(format!(
                        "Locker {} listed twice in snapshot",
                        id
                    )));
                }
            }
            state
                .index
                .provision_slots(ids.iter().map(|&id| Slot::new(id, class)))?;
        }

        for (item, &assignment) in &snapshot.assignments {
            if state
                .universe
                .insert(assignment.slot, assignment.class)
                .is_some()
            {
                return Err(Error::Corrupted(format!(
                    "Locker {} of {:?} is also listed elsewhere in snapshot",
                    assignment.slot, item
                )));
            }
            state.assignments.insert(item, assignment)?;
        }

        state.publish_gauges(name);
        info!(
            lockers = state.universe.len(),
            outstanding = state.assignments.len(),
            taken_at = %snapshot.taken_at,
            "Restored station from snapshot"
        );

        Ok(Self {
            name: name.to_string(),
            state: Mutex::new(state),
        })
    }
}

fn check_class(
    universe: &HashMap<SlotId, SizeClass>,
    id: SlotId,
    class: SizeClass,
) -> Result<()> {
    match universe.get(&id) {
        Some(&actual) if actual == class => Ok(()),
        Some(&actual) => Err(Error::Corrupted(format!(
            "Locker {} is class {} but tracked as {}",
            id, actual, class
        ))),
        None => Err(Error::Corrupted(format!(
            "Locker {} was never provisioned",
            id
        ))),
    }
}

impl fmt::Debug for LockerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockerEngine")
            .field("name", &self.name)
            .finish()
    }
}

/// Occupancy of one size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub class: SizeClass,
    pub total: usize,
    pub free: usize,
    pub occupied: usize,
}

/// Occupancy of a whole station
#[derive(Debug, Clone, Serialize)]
pub struct StationStats {
    pub station: String,
    pub classes: Vec<ClassStats>,
    pub total_lockers: usize,
    pub free_lockers: usize,
    pub outstanding_items: usize,
}

impl StationStats {
    /// Stats for one class
    pub fn class(&self, class: SizeClass) -> ClassStats {
        self.classes[class.rank()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<SlotId> {
        raw.iter().copied().map(SlotId::new).collect()
    }

    /// S:[1], M:[2,3], L:[4]
    fn sample_engine() -> Result<LockerEngine> {
        let engine = LockerEngine::new("test");
        engine.provision(
            &[SizeClass::S, SizeClass::M, SizeClass::M, SizeClass::L],
            &ids(&[1, 2, 3, 4]),
        )?;
        Ok(engine)
    }

    #[test]
    fn test_store_best_fit() -> Result<()> {
        let engine = sample_engine()?;

        assert_eq!(engine.store("A", SizeClass::M)?, SlotId::new(2));
        assert_eq!(engine.store("B", SizeClass::M)?, SlotId::new(3));
        assert_eq!(engine.store("C", SizeClass::M)?, SlotId::new(4));
        assert!(matches!(
            engine.store("D", SizeClass::M),
            Err(Error::NoCapacity { requested: SizeClass::M })
        ));

        engine.audit()?;
        Ok(())
    }

    #[test]
    fn test_store_duplicate_is_noop() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::S)?;

        let before = engine.status();
        assert!(matches!(
            engine.store("A", SizeClass::M),
            Err(Error::DuplicateItem(_))
        ));
        let after = engine.status();

        assert_eq!(before.classes, after.classes);
        assert_eq!(engine.locate("A").map(|a| a.slot), Some(SlotId::new(1)));
        Ok(())
    }

    #[test]
    fn test_no_capacity_is_noop() -> Result<()> {
        let engine = LockerEngine::new("tiny");
        engine.provision(&[SizeClass::S], &ids(&[1]))?;

        assert!(matches!(
            engine.store("X", SizeClass::M),
            Err(Error::NoCapacity { .. })
        ));
        assert!(engine.locate("X").is_none());
        assert_eq!(engine.status().free_lockers, 1);
        Ok(())
    }

    #[test]
    fn test_retrieve_returns_locker_to_its_class() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::M)?;
        engine.store("B", SizeClass::M)?;
        // Escalated into L
        engine.store("C", SizeClass::S)?;
        engine.store("D", SizeClass::S)?;
        assert_eq!(engine.locate("D").map(|a| a.class), Some(SizeClass::L));

        assert_eq!(engine.retrieve("D")?, SlotId::new(4));

        let stats = engine.status();
        assert_eq!(stats.class(SizeClass::L).free, 1);
        assert_eq!(stats.class(SizeClass::S).free, 0);
        engine.audit()?;
        Ok(())
    }

    #[test]
    fn test_retrieve_twice() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::S)?;

        engine.retrieve("A")?;
        assert!(matches!(engine.retrieve("A"), Err(Error::UnknownItem(_))));
        Ok(())
    }

    #[test]
    fn test_reuse_after_retrieve() -> Result<()> {
        let engine = sample_engine()?;
        let first = engine.store("A", SizeClass::S)?;
        engine.retrieve("A")?;

        assert_eq!(engine.store("B", SizeClass::S)?, first);
        Ok(())
    }

    #[test]
    fn test_provision_rejects_known_ids() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::S)?;

        // Locker 1 is occupied, not free, but still known
        let result = engine.provision(&[SizeClass::XL], &ids(&[1]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        engine.provision(&[SizeClass::XL], &ids(&[5]))?;
        assert_eq!(engine.status().total_lockers, 5);
        engine.audit()?;
        Ok(())
    }

    #[test]
    fn test_provision_length_mismatch() {
        let engine = LockerEngine::new("test");
        let result = engine.provision(&[SizeClass::S], &[]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(engine.status().total_lockers, 0);
    }

    #[test]
    fn test_status_counts() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::M)?;

        let stats = engine.status();
        assert_eq!(stats.total_lockers, 4);
        assert_eq!(stats.free_lockers, 3);
        assert_eq!(stats.outstanding_items, 1);
        assert_eq!(
            stats.class(SizeClass::M),
            ClassStats {
                class: SizeClass::M,
                total: 2,
                free: 1,
                occupied: 1,
            }
        );
        assert_eq!(stats.class(SizeClass::XS).total, 0);
        Ok(())
    }

    #[test]
    fn test_snapshot_restore_keeps_fifo_order() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::M)?;
        engine.retrieve("A")?; // M bucket is now [3, 2]
        engine.store("B", SizeClass::L)?;

        let restored = LockerEngine::restore("test", engine.snapshot())?;
        assert_eq!(restored.name(), "test");
        restored.audit()?;

        assert_eq!(restored.store("C", SizeClass::M)?, SlotId::new(3));
        assert_eq!(restored.store("D", SizeClass::M)?, SlotId::new(2));
        assert_eq!(restored.retrieve("B")?, SlotId::new(4));
        Ok(())
    }

    #[test]
    fn test_restore_rejects_double_listed_locker() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::S)?;

        let mut snapshot = engine.snapshot();
        snapshot
            .free
            .entry(SizeClass::S)
            .or_default()
            .push(SlotId::new(1));

        assert!(matches!(
            LockerEngine::restore("test", snapshot),
            Err(Error::Corrupted(_))
        ));
        Ok(())
    }

    #[test]
    fn test_restore_uses_given_station_name() -> Result<()> {
        let engine = sample_engine()?;
        engine.store("A", SizeClass::S)?;

        let mut snapshot = engine.snapshot();
        snapshot.station = "renamed-on-disk".to_string();

        let restored = LockerEngine::restore("test", snapshot)?;
        assert_eq!(restored.name(), "test");
        assert_eq!(restored.status().station, "test");
        assert_eq!(restored.snapshot().station, "test");
        assert_eq!(restored.locate("A").map(|a| a.slot), Some(SlotId::new(1)));
        Ok(())
    }
}
