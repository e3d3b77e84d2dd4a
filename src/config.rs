//! Station configuration
//!
//! Loaded from an optional TOML file, then overridden by `LOCKER_*`
//! environment variables (`__` separates nested keys).
//!
//! ```toml
//! name = "north-entrance"
//! data_dir = "data/locker"
//!
//! [[lockers]]
//! id = 1
//! size = "S"
//!
//! [[lockers]]
//! id = 2
//! size = "M"
//!
//! [counts]
//! XL = 2   # ids 3 and 4
//! ```

use crate::error::{Error, Result};
use crate::locker::{SizeClass, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One explicitly numbered locker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerSpec {
    pub id: u64,
    pub size: SizeClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Station name, used in logs and metric labels
    pub name: String,
    /// Directory holding the station snapshot
    pub data_dir: PathBuf,
    /// Explicitly numbered lockers, handed out in this order within a class
    pub lockers: Vec<LockerSpec>,
    /// Extra lockers per class, numbered after the highest explicit id
    pub counts: BTreeMap<SizeClass, usize>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            data_dir: PathBuf::from("data/locker"),
            lockers: Vec::new(),
            counts: BTreeMap::new(),
        }
    }
}

impl StationConfig {
    /// Load from `path` (if given) layered with the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path = ?path, "Loading station config");
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("LOCKER")
                .prefix_separator("_")
                .separator("__"),
        );

        Self::build(builder)
    }

    /// Parse a TOML document (no environment overrides)
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Where the CLI keeps the station snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("station.json")
    }

    /// Parallel `(sizes, ids)` sequences for [`LockerEngine::provision`]
    ///
    /// [`LockerEngine::provision`]: crate::locker::LockerEngine::provision
    pub fn provisioning(&self) -> (Vec<SizeClass>, Vec<SlotId>) {
        let generated: usize = self.counts.values().sum();
        let mut sizes = Vec::with_capacity(self.lockers.len() + generated);
        let mut ids = Vec::with_capacity(self.lockers.len() + generated);

        for spec in &self.lockers {
            sizes.push(spec.size);
            ids.push(SlotId::new(spec.id));
        }

        let mut next_id = self.lockers.iter().map(|spec| spec.id).max().unwrap_or(0) + 1;
        for (&class, &count) in &self.counts {
            for _ in 0..count {
                sizes.push(class);
                ids.push(SlotId::new(next_id));
                next_id += 1;
            }
        }

        (sizes, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "north"
data_dir = "/tmp/north"

[[lockers]]
id = 1
size = "S"

[[lockers]]
id = 5
size = "m"

[counts]
XL = 2
"#;

    #[test]
    fn test_parse_toml() -> Result<()> {
        let config = StationConfig::from_toml_str(SAMPLE)?;

        assert_eq!(config.name, "north");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/north"));
        assert_eq!(
            config.lockers,
            vec![
                LockerSpec { id: 1, size: SizeClass::S },
                LockerSpec { id: 5, size: SizeClass::M },
            ]
        );
        assert_eq!(config.counts.get(&SizeClass::XL), Some(&2));
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = StationConfig::from_toml_str("")?;
        assert_eq!(config, StationConfig::default());
        assert_eq!(config.snapshot_path(), PathBuf::from("data/locker/station.json"));
        Ok(())
    }

    #[test]
    fn test_invalid_size() {
        let result = StationConfig::from_toml_str("[[lockers]]\nid = 1\nsize = \"XXL\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_provisioning_generates_ids_after_explicit() -> Result<()> {
        let config = StationConfig::from_toml_str(SAMPLE)?;
        let (sizes, ids) = config.provisioning();

        assert_eq!(
            sizes,
            vec![SizeClass::S, SizeClass::M, SizeClass::XL, SizeClass::XL]
        );
        assert_eq!(
            ids,
            vec![SlotId::new(1), SlotId::new(5), SlotId::new(6), SlotId::new(7)]
        );
        Ok(())
    }

    #[test]
    fn test_to_toml_reparses() -> Result<()> {
        let config = StationConfig::from_toml_str(SAMPLE)?;
        let rendered = config.to_toml()?;
        assert_eq!(StationConfig::from_toml_str(&rendered)?, config);
        Ok(())
    }

    #[test]
    fn test_env_overrides_file() -> Result<()> {
        let temp_dir = std::env::temp_dir().join(format!("locker_config_env_{}", std::process::id()));
        std::fs::create_dir_all(&temp_dir).map_err(|e| Error::Io(e.to_string()))?;
        let path = temp_dir.join("station.toml");
        std::fs::write(&path, SAMPLE).map_err(|e| Error::Io(e.to_string()))?;

        // Only this test touches the LOCKER_ environment
        let name = format!("env-station-{}", std::process::id());
        let data_dir = temp_dir.join("env-data");
        std::env::set_var("LOCKER_NAME", &name);
        std::env::set_var("LOCKER_DATA_DIR", &data_dir);

        let loaded = StationConfig::load(Some(&path));

        std::env::remove_var("LOCKER_NAME");
        std::env::remove_var("LOCKER_DATA_DIR");
        std::fs::remove_dir_all(&temp_dir).ok();

        let config = loaded?;
        assert_eq!(config.name, name);
        assert_eq!(config.data_dir, data_dir);
        // Keys the environment does not set still come from the file
        assert_eq!(config.lockers.len(), 2);
        assert_eq!(config.counts.get(&SizeClass::XL), Some(&2));
        Ok(())
    }
}
