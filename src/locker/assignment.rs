//! Assignment table: package id → locker holding it
//!
//! Each entry records the locker's class alongside its id, so reclamation
//! never depends on the caller resupplying a size.

use super::size_class::SizeClass;
use super::slot::{Slot, SlotId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Live association between a stored package and its locker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub slot: SlotId,
    pub class: SizeClass,
}

impl Assignment {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot: slot.id,
            class: slot.class,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct AssignmentTable {
    entries: HashMap<String, Assignment>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new assignment; an item may hold at most one locker
    pub fn insert(&mut self, item_id: &str, assignment: Assignment) -> Result<()> {
        if self.entries.contains_key(item_id) {
            return Err(Error::DuplicateItem(item_id.to_string()));
        }
        self.entries.insert(item_id.to_string(), assignment);
        Ok(())
    }

    /// Remove and return the assignment of `item_id`
    pub fn remove(&mut self, item_id: &str) -> Result<Assignment> {
        self.entries
            .remove(item_id)
            .ok_or_else(|| Error::UnknownItem(item_id.to_string()))
    }

    pub fn get(&self, item_id: &str) -> Option<Assignment> {
        self.entries.get(item_id).copied()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.entries.iter().map(|(item, a)| (item.as_str(), a))
    }

    /// Number of occupied lockers of `class`
    pub fn occupied_count(&self, class: SizeClass) -> usize {
        self.entries.values().filter(|a| a.class == class).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(id: u64, class: SizeClass) -> Assignment {
        Assignment::new(Slot::new(SlotId::new(id), class))
    }

    #[test]
    fn test_insert_and_remove() -> Result<()> {
        let mut table = AssignmentTable::new();
        table.insert("A123", assignment(2, SizeClass::M))?;

        assert!(table.contains("A123"));
        assert_eq!(table.get("A123"), Some(assignment(2, SizeClass::M)));
        assert_eq!(table.len(), 1);

        let removed = table.remove("A123")?;
        assert_eq!(removed.slot, SlotId::new(2));
        assert_eq!(removed.class, SizeClass::M);
        assert!(table.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_item_rejected() -> Result<()> {
        let mut table = AssignmentTable::new();
        table.insert("A123", assignment(2, SizeClass::M))?;

        let result = table.insert("A123", assignment(3, SizeClass::M));
        assert!(matches!(result, Err(Error::DuplicateItem(ref id)) if id == "A123"));

        // First assignment untouched
        assert_eq!(table.get("A123"), Some(assignment(2, SizeClass::M)));
        Ok(())
    }

    #[test]
    fn test_remove_unknown_item() {
        let mut table = AssignmentTable::new();
        assert!(matches!(table.remove("ghost"), Err(Error::UnknownItem(_))));
    }

    #[test]
    fn test_occupied_count() -> Result<()> {
        let mut table = AssignmentTable::new();
        table.insert("a", assignment(1, SizeClass::S))?;
        table.insert("b", assignment(2, SizeClass::M))?;
        table.insert("c", assignment(3, SizeClass::M))?;

        assert_eq!(table.occupied_count(SizeClass::M), 2);
        assert_eq!(table.occupied_count(SizeClass::S), 1);
        assert_eq!(table.occupied_count(SizeClass::XL), 0);
        Ok(())
    }
}
