//! Locker allocation engine
//!
//! Hands out the smallest free locker that fits each incoming package and
//! takes lockers back when packages are picked up.
//!
//! # Architecture
//!
//! ```text
//! LockerEngine (one mutex)
//!   ├─→ FreeSlotIndex
//!   │     ├─→ S → [1]
//!   │     ├─→ M → [2, 3]
//!   │     └─→ L → [4]
//!   └─→ AssignmentTable
//!         └─→ "A123" → (slot 5, XL)
//! ```
//!
//! Every provisioned locker is in exactly one place: a free bucket of its
//! own class, or one assignment entry.

pub mod assignment;
pub mod engine;
pub mod free_index;
pub mod size_class;
pub mod slot;
pub mod snapshot;

pub use assignment::{Assignment, AssignmentTable};
pub use engine::{ClassStats, LockerEngine, StationStats};
pub use free_index::FreeSlotIndex;
pub use size_class::SizeClass;
pub use slot::{Slot, SlotId};
pub use snapshot::EngineSnapshot;
