use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{
    error::{Error, NotFound, Result},
    json::{read_json, write_json},
    revision::Revision,
    revision_id::RevisionId,
};

pub const HISTORY_FILE: &str = "history.json";

/// Every revision the store has produced, keyed by id and persisted as a
/// whole to one file.
///
/// Records are only ever inserted, except that inserting a successor sets
/// its predecessor's `next`. Nothing is read until [`RevisionLog::load`].
#[derive(Debug, Clone)]
pub struct RevisionLog {
    path: PathBuf,
    revisions: IndexMap<RevisionId, Revision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

impl RevisionLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            revisions: IndexMap::new(),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory log with the contents of the history file.
    pub fn load(&mut self) -> Result<()> {
        let records: Vec<Revision> = read_json(&self.path)?.unwrap_or_default();
        log::debug!("loaded {} revisions from {:?}", records.len(), self.path);
        self.revisions = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Ok(())
    }

    /// Writes the whole in-memory log to the history file.
    pub fn flush(&self) -> Result<()> {
        let records: Vec<&Revision> = self.revisions.values().collect();
        log::info!("writing {} revisions to {:?}", records.len(), self.path);
        write_json(&records, &self.path)
    }

    pub fn has_id(&self, id: &RevisionId) -> bool {
        self.revisions.contains_key(id)
    }

    pub fn get_data(&self, id: &RevisionId) -> Result<&Revision> {
        self.revisions
            .get(id)
            .ok_or_else(|| NotFound::Id(id.clone()).into())
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Revision> {
        self.revisions.values()
    }

    /// Inserts `revision`, links its predecessor forward to it, and persists
    /// the log. If the write fails the in-memory log is left as it was.
    pub fn add(&mut self, revision: Revision) -> Result<()> {
        if self.revisions.contains_key(&revision.id) {
            return Err(Error::DuplicateId(revision.id));
        }
        let mut patched = None;
        if let Some(prev) = &revision.prev {
            let id = revision.id.clone();
            match self.revisions.get_mut(prev) {
                Some(prev) => patched = Some((prev.id.clone(), prev.next.replace(id))),
                None => {
                    return Err(Error::BrokenChain {
                        id,
                        missing: prev.clone(),
                    })
                }
            }
        }
        log::info!(
            "appending revision {} (version {} of {:?})",
            revision.id,
            revision.version,
            revision.name
        );
        let id = revision.id.clone();
        self.revisions.insert(id.clone(), revision);
        if let Err(err) = self.flush() {
            log::warn!("dropping revision {} after failed write: {}", id, err);
            self.unlink(&id, patched);
            return Err(err);
        }
        Ok(())
    }

    /// Takes back an [`RevisionLog::add`] of `id` whose successors were
    /// never written, clearing its predecessor's `next`, and persists the log.
    pub(crate) fn undo_add(&mut self, id: &RevisionId) -> Result<()> {
        let patched = self.get_data(id)?.prev.clone().map(|prev| (prev, None));
        log::info!("removing revision {}", id);
        self.unlink(id, patched);
        self.flush()
    }

    fn unlink(&mut self, id: &RevisionId, patched: Option<(RevisionId, Option<RevisionId>)>) {
        self.revisions.shift_remove(id);
        if let Some((prev, next)) = patched {
            if let Some(prev) = self.revisions.get_mut(&prev) {
                prev.next = next;
            }
        }
    }

    /// `start` followed by its predecessors, newest first, stopping at the
    /// root or after `max_size` records.
    pub fn prev_of(&self, start: &RevisionId, max_size: Option<usize>) -> Result<Vec<Revision>> {
        self.walk(start, max_size, Direction::Backward)
    }

    /// `start` followed by its successors, oldest first, stopping at the head
    /// or after `max_size` records.
    pub fn next_of(&self, start: &RevisionId, max_size: Option<usize>) -> Result<Vec<Revision>> {
        self.walk(start, max_size, Direction::Forward)
    }

    fn walk(
        &self,
        start: &RevisionId,
        max_size: Option<usize>,
        direction: Direction,
    ) -> Result<Vec<Revision>> {
        let limit = max_size.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        let mut current = self.get_data(start)?;
        while out.len() < limit {
            out.push(current.clone());
            let link = match direction {
                Direction::Backward => &current.prev,
                Direction::Forward => &current.next,
            };
            let Some(link) = link else { break };
            current = self
                .revisions
                .get(link)
                .ok_or_else(|| Error::BrokenChain {
                    id: current.id.clone(),
                    missing: link.clone(),
                })?;
        }
        Ok(out)
    }
}

#[cfg(test)]
fn revision(id: &str, version: u64, prev: Option<&str>) -> Revision {
    Revision {
        id: RevisionId::from(id),
        name: String::from("page"),
        version,
        next: None,
        prev: prev.map(RevisionId::from),
        created: crate::revision::now(),
        comment: String::new(),
        filename: format!("file-{}", id),
        filepath: PathBuf::new(),
    }
}

#[cfg(test)]
fn chain_of_four(dir: &Path) -> RevisionLog {
    let mut log = RevisionLog::in_dir(dir);
    log.load().unwrap();
    log.add(revision("a", 1, None)).unwrap();
    log.add(revision("b", 2, Some("a"))).unwrap();
    log.add(revision("c", 3, Some("b"))).unwrap();
    log.add(revision("d", 4, Some("c"))).unwrap();
    log
}

#[cfg(test)]
fn versions(revisions: &[Revision]) -> Vec<u64> {
    revisions.iter().map(|r| r.version).collect()
}

#[test]
fn test_add_links_predecessor_forward() {
    let tempdir = tempfile::tempdir().unwrap();
    let log = chain_of_four(tempdir.path());
    let a = log.get_data(&RevisionId::from("a")).unwrap();
    assert_eq!(a.next, Some(RevisionId::from("b")));
    assert!(log.get_data(&RevisionId::from("d")).unwrap().is_head());
    assert_eq!(log.len(), 4);
}

#[test]
fn test_add_with_missing_predecessor_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut log = RevisionLog::in_dir(tempdir.path());
    assert!(matches!(
        log.add(revision("b", 2, Some("ghost"))),
        Err(Error::BrokenChain { .. })
    ));
    assert!(log.is_empty());
    assert!(!log.path().exists());
}

#[test]
fn test_prev_of_bounded_and_unbounded() {
    let tempdir = tempfile::tempdir().unwrap();
    let log = chain_of_four(tempdir.path());
    let d = RevisionId::from("d");
    assert_eq!(versions(&log.prev_of(&d, None).unwrap()), vec![4, 3, 2, 1]);
    assert_eq!(versions(&log.prev_of(&d, Some(2)).unwrap()), vec![4, 3]);
    assert_eq!(versions(&log.prev_of(&d, Some(10)).unwrap()), vec![4, 3, 2, 1]);
    assert!(log.prev_of(&d, Some(0)).unwrap().is_empty());
}

#[test]
fn test_next_of_walks_forward() {
    let tempdir = tempfile::tempdir().unwrap();
    let log = chain_of_four(tempdir.path());
    let b = RevisionId::from("b");
    assert_eq!(versions(&log.next_of(&b, None).unwrap()), vec![2, 3, 4]);
    assert_eq!(versions(&log.next_of(&b, Some(1)).unwrap()), vec![2]);
}

#[test]
fn test_traversal_from_unknown_id() {
    let tempdir = tempfile::tempdir().unwrap();
    let log = chain_of_four(tempdir.path());
    let err = log.prev_of(&RevisionId::from("zz"), None).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_reload_restores_links_and_timestamps() {
    let tempdir = tempfile::tempdir().unwrap();
    let log = chain_of_four(tempdir.path());
    let mut reopened = RevisionLog::in_dir(tempdir.path());
    reopened.load().unwrap();
    assert_eq!(
        reopened.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c", "d"]
    );
    for original in log.iter() {
        assert_eq!(reopened.get_data(&original.id).unwrap(), original);
    }
}

#[test]
fn test_failed_write_leaves_log_unchanged() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut log = RevisionLog::in_dir(tempdir.path());
    log.add(revision("a", 1, None)).unwrap();
    std::fs::remove_file(log.path()).unwrap();
    std::fs::create_dir(log.path()).unwrap();

    assert!(matches!(
        log.add(revision("b", 2, Some("a"))),
        Err(Error::IO(_))
    ));
    assert!(!log.has_id(&RevisionId::from("b")));
    assert!(log.get_data(&RevisionId::from("a")).unwrap().is_head());

    std::fs::remove_dir(log.path()).unwrap();
    log.add(revision("c", 2, Some("a"))).unwrap();
    let mut reopened = RevisionLog::in_dir(tempdir.path());
    reopened.load().unwrap();
    let heads: Vec<_> = reopened.iter().filter(|r| r.is_head()).collect();
    assert_eq!(heads.len(), 1);
    assert_eq!(heads[0].id, RevisionId::from("c"));
    assert_eq!(reopened.len(), 2);
}

#[test]
fn test_duplicate_id_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut log = chain_of_four(tempdir.path());
    let before = log.get_data(&RevisionId::from("b")).unwrap().clone();
    assert!(matches!(
        log.add(revision("b", 9, None)),
        Err(Error::DuplicateId(_))
    ));
    assert_eq!(log.get_data(&RevisionId::from("b")).unwrap(), &before);
    assert_eq!(log.len(), 4);
}

#[test]
fn test_undo_add_restores_previous_head() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut log = chain_of_four(tempdir.path());
    log.undo_add(&RevisionId::from("d")).unwrap();
    assert!(log.get_data(&RevisionId::from("c")).unwrap().is_head());
    let mut reopened = RevisionLog::in_dir(tempdir.path());
    reopened.load().unwrap();
    assert_eq!(reopened.len(), 3);
    assert!(reopened.get_data(&RevisionId::from("c")).unwrap().is_head());
}
