use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{NotFound, Result},
    json::{read_json, write_json},
    revision_id::RevisionId,
};

pub const CURRENT_FILE: &str = "current.json";

/// One line of `current.json`.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct CurrentEntry {
    pub name: String,
    pub id: RevisionId,
}

/// The head revision of every name, persisted as a whole to one file.
///
/// Nothing is read until [`CurrentIndex::load`]; every [`CurrentIndex::add`]
/// writes the full map back with [`CurrentIndex::flush`].
#[derive(Debug, Clone)]
pub struct CurrentIndex {
    path: PathBuf,
    heads: IndexMap<String, RevisionId>,
}

impl CurrentIndex {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            heads: IndexMap::new(),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CURRENT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory map with the contents of the index file.
    pub fn load(&mut self) -> Result<()> {
        let entries: Vec<CurrentEntry> = read_json(&self.path)?.unwrap_or_default();
        log::debug!("loaded {} names from {:?}", entries.len(), self.path);
        self.heads = entries.into_iter().map(|e| (e.name, e.id)).collect();
        Ok(())
    }

    /// Writes the whole in-memory map to the index file.
    pub fn flush(&self) -> Result<()> {
        let entries: Vec<CurrentEntry> = self
            .heads
            .iter()
            .map(|(name, id)| CurrentEntry {
                name: name.clone(),
                id: id.clone(),
            })
            .collect();
        log::info!("writing {} names to {:?}", entries.len(), self.path);
        write_json(&entries, &self.path)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.heads.contains_key(name)
    }

    pub fn get_id(&self, name: &str) -> Result<&RevisionId> {
        self.heads
            .get(name)
            .ok_or_else(|| NotFound::Name(String::from(name)).into())
    }

    /// Names in the order they were first added.
    pub fn name_list(&self) -> impl Iterator<Item = &str> {
        self.heads.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Points `entry.name` at `entry.id`, keeping the name's position if it
    /// was already present, and persists the result. If the write fails the
    /// previous mapping is restored.
    pub fn add(&mut self, entry: CurrentEntry) -> Result<()> {
        let previous = self.heads.insert(entry.name.clone(), entry.id);
        if let Err(err) = self.flush() {
            log::warn!("restoring head of {:?} after failed write: {}", entry.name, err);
            match previous {
                Some(id) => {
                    self.heads.insert(entry.name, id);
                }
                None => {
                    self.heads.shift_remove(&entry.name);
                }
            }
            return Err(err);
        }
        Ok(())
    }
}

#[test]
fn test_upsert_keeps_insertion_order() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut index = CurrentIndex::in_dir(tempdir.path());
    index.load().unwrap();
    for (name, id) in [("b", "1"), ("a", "2"), ("b", "3")] {
        index
            .add(CurrentEntry {
                name: String::from(name),
                id: RevisionId::from(id),
            })
            .unwrap();
    }
    assert_eq!(index.name_list().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(index.get_id("b").unwrap(), &RevisionId::from("3"));
    assert_eq!(index.len(), 2);
}

#[test]
fn test_unknown_name_is_not_found() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut index = CurrentIndex::in_dir(tempdir.path());
    index.load().unwrap();
    assert!(index.is_empty());
    assert!(!index.has_name("nope"));
    assert!(index.get_id("nope").unwrap_err().is_not_found());
}

#[test]
fn test_flush_then_load_in_fresh_instance() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut index = CurrentIndex::in_dir(tempdir.path());
    index
        .add(CurrentEntry {
            name: String::from("Home"),
            id: RevisionId::from("x"),
        })
        .unwrap();

    let mut reopened = CurrentIndex::in_dir(tempdir.path());
    assert!(!reopened.has_name("Home"));
    reopened.load().unwrap();
    assert_eq!(reopened.get_id("Home").unwrap(), &RevisionId::from("x"));

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(tempdir.path().join(CURRENT_FILE)).unwrap())
            .unwrap();
    assert_eq!(raw, serde_json::json!([{"name": "Home", "id": "x"}]));
}

#[test]
fn test_failed_write_restores_mapping() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut index = CurrentIndex::in_dir(tempdir.path());
    index
        .add(CurrentEntry {
            name: String::from("Home"),
            id: RevisionId::from("1"),
        })
        .unwrap();
    std::fs::remove_file(index.path()).unwrap();
    std::fs::create_dir(index.path()).unwrap();

    for (name, id) in [("Home", "2"), ("About", "3")] {
        assert!(index
            .add(CurrentEntry {
                name: String::from(name),
                id: RevisionId::from(id),
            })
            .is_err());
    }
    assert_eq!(index.get_id("Home").unwrap(), &RevisionId::from("1"));
    assert!(!index.has_name("About"));
    assert_eq!(index.len(), 1);
}
