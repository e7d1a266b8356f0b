use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    json::read_json,
};

pub const DEFAULT_STEP: usize = 2;
pub const DEFAULT_DEPTH: usize = 1;

/// How a store lays out payload files under its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Characters of the filename consumed per shard directory.
    #[serde(default = "default_step")]
    pub step: usize,
    /// Maximum number of shard directories between the root and a file.
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_step() -> usize {
    DEFAULT_STEP
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            depth: DEFAULT_DEPTH,
        }
    }
}

impl StoreConfig {
    pub fn validate(self) -> Result<Self> {
        if self.step < 1 {
            return Err(Error::InvalidConfiguration {
                step: self.step,
                depth: self.depth,
            });
        }
        Ok(self)
    }

    /// Loads a config from a JSON file; a missing file gives the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Option<StoreConfig> = read_json(path)?;
        match config {
            Some(config) => {
                log::debug!("loaded store config {:?} from {:?}", config, path);
                config.validate()
            }
            None => Ok(Self::default()),
        }
    }
}

#[test]
fn test_partial_config_takes_defaults() {
    let config: StoreConfig = serde_json::from_str(r#"{"depth": 3}"#).unwrap();
    assert_eq!(config, StoreConfig { step: 2, depth: 3 });
}

#[test]
fn test_zero_step_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("config.json");
    std::fs::write(&path, r#"{"step": 0}"#).unwrap();
    assert!(matches!(
        StoreConfig::from_file(&path),
        Err(Error::InvalidConfiguration { step: 0, depth: 1 })
    ));
}

#[test]
fn test_negative_depth_does_not_decode() {
    assert!(serde_json::from_str::<StoreConfig>(r#"{"depth": -1}"#).is_err());
}

#[test]
fn test_missing_file_gives_defaults() {
    let tempdir = tempfile::tempdir().unwrap();
    let config = StoreConfig::from_file(&tempdir.path().join("absent.json")).unwrap();
    assert_eq!(config, StoreConfig::default());
}
