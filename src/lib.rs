// Locker Station - best-fit locker allocation
// Assigns packages to the smallest free locker that fits them

#![warn(rust_2018_idioms)]

pub mod config;
pub mod locker;
pub mod metrics;

// Re-exports for convenience
pub use crate::config::{LockerSpec, StationConfig};
pub use crate::locker::{Assignment, EngineSnapshot, LockerEngine, SizeClass, SlotId, StationStats};

/// Locker station error types
pub mod error {
    use crate::locker::SizeClass;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("No free locker of size {requested} or larger")]
        NoCapacity { requested: SizeClass },

        #[error("Package already stored: {0}")]
        DuplicateItem(String),

        #[error("Unknown package: {0}")]
        UnknownItem(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("I/O error: {0}")]
        Io(String),

        #[error("Serialization error: {0}")]
        Serialization(String),

        #[error("Corrupted state: {0}")]
        Corrupted(String),
    }

    impl Error {
        /// Whether retrying later can succeed without a caller fix
        pub fn is_recoverable(&self) -> bool {
            matches!(self, Error::NoCapacity { .. })
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::Error;
    use super::*;

    #[test]
    fn test_version_format() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_only_no_capacity_is_recoverable() {
        assert!(Error::NoCapacity {
            requested: SizeClass::M
        }
        .is_recoverable());
        assert!(!Error::DuplicateItem("a".into()).is_recoverable());
        assert!(!Error::UnknownItem("a".into()).is_recoverable());
        assert!(!Error::InvalidInput("a".into()).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::NoCapacity {
            requested: SizeClass::L,
        };
        assert_eq!(err.to_string(), "No free locker of size L or larger");
    }
}
