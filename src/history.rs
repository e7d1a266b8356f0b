use std::path::{Path, PathBuf};

use crate::{
    config::StoreConfig,
    current_index::{CurrentEntry, CurrentIndex},
    error::{NotFound, Result},
    payload::directory::DirectoryPayloadStore,
    revision::{self, NewRevision, Revision},
    revision_id::RevisionId,
    revision_log::RevisionLog,
    sharder::PathSharder,
};

/// The version history of every name stored under one root directory.
///
/// Layout of the root:
///
/// - `current.json`: the head revision id of each name.
/// - `history.json`: every revision ever written.
/// - shard directories holding payload files, named by filename prefix.
///
/// The store owns its root. Two instances writing to the same root will
/// overwrite each other's index files.
#[derive(Debug)]
pub struct HistoryStore {
    sharder: PathSharder,
    current: CurrentIndex,
    log: RevisionLog,
}

impl HistoryStore {
    /// Opens (creating if necessary) the store rooted at `root` and loads
    /// both indices.
    pub fn open(root: PathBuf, config: StoreConfig) -> Result<Self> {
        if !root.try_exists()? {
            log::info!("creating history store root: {:?}", root);
            std::fs::create_dir_all(&root)?;
        }
        let mut store = Self {
            current: CurrentIndex::in_dir(&root),
            log: RevisionLog::in_dir(&root),
            sharder: PathSharder::with_config(root, config)?,
        };
        store.reload()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        self.sharder.root()
    }

    pub fn sharder(&self) -> &PathSharder {
        &self.sharder
    }

    /// Discards the in-memory indices and reads both files again.
    pub fn reload(&mut self) -> Result<()> {
        self.log.load()?;
        self.current.load()?;
        log::debug!(
            "{:?}: {} names, {} revisions",
            self.root(),
            self.current.len(),
            self.log.len()
        );
        Ok(())
    }

    /// Where the payload called `filename` lives, creating its shard
    /// directories.
    pub fn resolve_path(&self, filename: &str) -> Result<PathBuf> {
        self.sharder.resolve(filename, true)
    }

    /// A payload store writing into this store's shard directories.
    pub fn payloads(&self) -> DirectoryPayloadStore {
        DirectoryPayloadStore::new(self.sharder.clone())
    }

    pub fn has_id(&self, id: &RevisionId) -> bool {
        self.log.has_id(id)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.current.has_name(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.current.name_list().map(String::from).collect()
    }

    /// The head revision of every name.
    pub fn get_current_list(&self) -> Result<Vec<Revision>> {
        self.current
            .name_list()
            .map(|name| self.get_by_name(name))
            .collect()
    }

    pub fn get_by_id(&self, id: &RevisionId) -> Result<Revision> {
        let revision = self.log.get_data(id)?;
        Ok(self.with_path(revision.clone()))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Revision> {
        let id = self.current.get_id(name)?;
        self.get_by_id(id)
    }

    /// Walks back from the head of `name` to the revision numbered `version`.
    pub fn get_by_version(&self, name: &str, version: u64) -> Result<Revision> {
        let not_found = || NotFound::Version {
            name: String::from(name),
            version,
        };
        let head = self.current.get_id(name).map_err(|_| not_found())?;
        let mut current = self.log.get_data(head)?;
        loop {
            if current.version == version {
                return Ok(self.with_path(current.clone()));
            }
            if current.version < version {
                return Err(not_found().into());
            }
            match &current.prev {
                Some(prev) => current = self.log.get_data(prev)?,
                None => return Err(not_found().into()),
            }
        }
    }

    /// Follows `next` links from `id` to the head of its chain.
    pub fn head_of(&self, id: &RevisionId) -> Result<Revision> {
        let mut current = self.log.get_data(id)?;
        while let Some(next) = &current.next {
            current = self.log.get_data(next)?;
        }
        Ok(self.with_path(current.clone()))
    }

    /// Appends a revision to the chain of `new.name`, starting the chain if
    /// the name is unknown, and makes it the head.
    pub fn add(&mut self, new: NewRevision) -> Result<Revision> {
        let filepath = self.resolve_path(&new.filename)?;
        let (version, prev) = match self.current.get_id(&new.name) {
            Ok(head_id) => {
                let head = self.log.get_data(head_id)?;
                (head.version + 1, Some(head.id.clone()))
            }
            Err(_) => (1, None),
        };
        let revision = Revision {
            id: RevisionId::fresh(),
            name: new.name,
            version,
            next: None,
            prev,
            created: new.created.map(revision::truncate).unwrap_or_else(revision::now),
            comment: new.comment,
            filename: new.filename,
            filepath,
        };
        log::info!(
            "adding version {} of {:?} as {}",
            revision.version,
            revision.name,
            revision.id
        );
        self.log.add(revision.clone())?;
        let head = CurrentEntry {
            name: revision.name.clone(),
            id: revision.id.clone(),
        };
        if let Err(err) = self.current.add(head) {
            if let Err(undo) = self.log.undo_add(&revision.id) {
                log::warn!("could not take back revision {}: {}", revision.id, undo);
            }
            return Err(err);
        }
        Ok(revision)
    }

    /// Appends a new head to the chain `id` belongs to, carrying the payload
    /// of `id`. Nothing already written changes apart from the old head's
    /// `next`.
    pub fn revert(&mut self, id: &RevisionId) -> Result<Revision> {
        let target = self.log.get_data(id)?.clone();
        let head = self.head_of(id)?;
        log::info!(
            "reverting {:?} from version {} to version {}",
            target.name,
            head.version,
            target.version
        );
        self.add(NewRevision {
            name: target.name,
            comment: format!("revert to version {}", target.version),
            filename: target.filename,
            created: None,
        })
    }

    pub fn get_prev_of(&self, id: &RevisionId, max_size: Option<usize>) -> Result<Vec<Revision>> {
        let revisions = self.log.prev_of(id, max_size)?;
        Ok(revisions.into_iter().map(|r| self.with_path(r)).collect())
    }

    pub fn get_next_of(&self, id: &RevisionId, max_size: Option<usize>) -> Result<Vec<Revision>> {
        let revisions = self.log.next_of(id, max_size)?;
        Ok(revisions.into_iter().map(|r| self.with_path(r)).collect())
    }

    fn with_path(&self, mut revision: Revision) -> Revision {
        revision.filepath = self.sharder.path_of(&revision.filename);
        revision
    }
}

#[cfg(test)]
fn open(dir: &Path) -> HistoryStore {
    HistoryStore::open(dir.into(), StoreConfig::default()).unwrap()
}

#[test]
fn test_example_scenario() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());

    let v1 = store.add(NewRevision::new("h1", "a")).unwrap();
    assert_eq!((v1.version, &v1.prev, &v1.next), (1, &None, &None));

    let other = store.add(NewRevision::new("h2", "other")).unwrap();
    assert_eq!((other.version, &other.prev), (1, &None));

    let v2 = store.add(NewRevision::new("h1", "b")).unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.prev.as_ref(), Some(&v1.id));
    assert_eq!(store.get_by_id(&v1.id).unwrap().next.as_ref(), Some(&v2.id));

    let v3 = store.revert(&v1.id).unwrap();
    assert_eq!(v3.version, 3);
    assert_eq!(v3.filename, "a");
    assert_eq!(v3.prev.as_ref(), Some(&v2.id));

    let first = store.get_by_version("h1", 1).unwrap();
    assert_eq!(first.id, v1.id);
    assert_eq!(first.filename, v1.filename);
    assert_eq!(first.created, v1.created);
    assert_eq!(store.get_by_name("h1").unwrap().id, v3.id);
    assert_eq!(store.get_by_name("h2").unwrap(), other);
}

#[test]
fn test_chain_monotonicity_and_single_head() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    for i in 0..6 {
        store
            .add(NewRevision::new("Home", format!("home{}", i)))
            .unwrap();
        store
            .add(NewRevision::new("About", format!("about{}", i)))
            .unwrap();
    }
    let head = store.get_by_name("Home").unwrap();
    assert_eq!(head.version, 6);
    let chain = store.get_prev_of(&head.id, None).unwrap();
    assert_eq!(
        chain.iter().map(|r| r.version).collect::<Vec<_>>(),
        vec![6, 5, 4, 3, 2, 1]
    );
    assert!(chain.iter().all(|r| r.name == "Home"));
    let heads: Vec<_> = chain.iter().filter(|r| r.is_head()).collect();
    assert_eq!(heads.len(), 1);
    assert_eq!(heads[0].id, head.id);
    assert!(chain.last().unwrap().is_root());
}

#[test]
fn test_revert_leaves_history_untouched() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let mut written = Vec::new();
    for i in 0..7 {
        written.push(
            store
                .add(NewRevision::new("p", format!("payload{}", i)).comment(format!("edit {}", i)))
                .unwrap(),
        );
    }
    let third = &written[2];
    let reverted = store.revert(&third.id).unwrap();
    assert_eq!(reverted.version, 8);
    assert_eq!(reverted.filename, third.filename);
    assert_eq!(reverted.comment, "revert to version 3");

    for before in &written {
        let after = store.get_by_id(&before.id).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.version, before.version);
        assert_eq!(after.prev, before.prev);
        assert_eq!(after.created, before.created);
        assert_eq!(after.filename, before.filename);
        assert_eq!(after.comment, before.comment);
    }
    assert_eq!(store.get_by_id(&third.id).unwrap().next, Some(written[3].id.clone()));
}

#[test]
fn test_revert_targets_the_head_of_the_chain() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let v1 = store.add(NewRevision::new("p", "one")).unwrap();
    store.add(NewRevision::new("p", "two")).unwrap();
    store.revert(&v1.id).unwrap();
    let again = store.revert(&v1.id).unwrap();
    assert_eq!(again.version, 4);
    assert_eq!(store.head_of(&v1.id).unwrap().id, again.id);
}

#[test]
fn test_lookups_of_missing_things() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    store.add(NewRevision::new("h1", "a")).unwrap();
    store.add(NewRevision::new("h1", "b")).unwrap();

    assert!(!store.has_name("nope"));
    assert!(!store.has_id(&RevisionId::from("nope")));
    assert!(store.get_by_name("nope").unwrap_err().is_not_found());
    assert!(store.get_by_id(&RevisionId::from("nope")).unwrap_err().is_not_found());
    assert!(store.revert(&RevisionId::from("nope")).unwrap_err().is_not_found());

    let err = store.get_by_version("h1", 3).unwrap_err();
    assert_eq!(format!("{}", err), "Not found version 3 of h1");
    let err = store.get_by_version("h1", 0).unwrap_err();
    assert_eq!(format!("{}", err), "Not found version 0 of h1");
    let err = store.get_by_version("ghost", 1).unwrap_err();
    assert_eq!(format!("{}", err), "Not found version 1 of ghost");
}

#[test]
fn test_filepath_is_sharded_and_directory_created() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = HistoryStore::open(
        tempdir.path().into(),
        StoreConfig { step: 2, depth: 3 },
    )
    .unwrap();
    let added = store.add(NewRevision::new("p", "abcdefg")).unwrap();
    let expected = tempdir.path().join("ab").join("cd").join("ef").join("abcdefg");
    assert_eq!(added.filepath, expected);
    assert!(expected.parent().unwrap().is_dir());
    assert_eq!(store.get_by_name("p").unwrap().filepath, expected);
}

#[test]
fn test_explicit_created_is_kept() {
    use chrono::NaiveDate;
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let when = NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    let added = store
        .add(NewRevision::new("p", "file").created(when))
        .unwrap();
    assert_eq!(added.created, when);
}

#[test]
fn test_round_trip_across_instances() {
    let tempdir = tempfile::tempdir().unwrap();
    let (list, versions) = {
        let mut store = open(tempdir.path());
        for name in ["c", "a", "b"] {
            for i in 0..3 {
                store
                    .add(NewRevision::new(name, format!("{}{}", name, i)).comment("x"))
                    .unwrap();
            }
        }
        let first_a = store.get_by_version("a", 1).unwrap();
        store.revert(&first_a.id).unwrap();
        let versions: Vec<Revision> = (1..=4)
            .map(|v| store.get_by_version("a", v).unwrap())
            .collect();
        (store.get_current_list().unwrap(), versions)
    };

    let mut reopened = open(tempdir.path());
    assert_eq!(reopened.get_current_list().unwrap(), list);
    assert_eq!(
        list.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["c", "a", "b"]
    );
    for expected in &versions {
        assert_eq!(
            &reopened.get_by_version("a", expected.version).unwrap(),
            expected
        );
    }

    let next = reopened.add(NewRevision::new("a", "a-after")).unwrap();
    assert_eq!(next.version, 5);
    assert_eq!(next.prev.as_ref(), Some(&versions[3].id));
}

#[test]
fn test_bounded_forward_walk() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let first = store.add(NewRevision::new("p", "p0")).unwrap();
    for i in 1..5 {
        store.add(NewRevision::new("p", format!("p{}", i))).unwrap();
    }
    let page = store.get_next_of(&first.id, Some(3)).unwrap();
    assert_eq!(
        page.iter().map(|r| r.version).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(page.iter().all(|r| r.filepath.starts_with(tempdir.path())));
}

#[test]
fn test_payloads_follow_revisions() {
    use crate::payload::PayloadStore;
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let mut payloads = store.payloads();
    let first = payloads.insert(b"# Home\n").unwrap();
    let v1 = store.add(NewRevision::new("Home", first)).unwrap();
    let second = payloads.insert(b"# Home, edited\n").unwrap();
    store.add(NewRevision::new("Home", second)).unwrap();
    let v3 = store.revert(&v1.id).unwrap();

    assert_eq!(std::fs::read(&v3.filepath).unwrap(), b"# Home\n");
    assert_eq!(
        payloads.read(&store.get_by_version("Home", 2).unwrap().filename).unwrap(),
        Some(Vec::from(&b"# Home, edited\n"[..]))
    );
}

#[test]
fn test_failed_history_write_leaves_one_head() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let v1 = store.add(NewRevision::new("p", "one")).unwrap();
    let history = tempdir.path().join(crate::revision_log::HISTORY_FILE);
    std::fs::remove_file(&history).unwrap();
    std::fs::create_dir(&history).unwrap();
    assert!(store.add(NewRevision::new("p", "two")).is_err());
    std::fs::remove_dir(&history).unwrap();

    let v2 = store.add(NewRevision::new("p", "three")).unwrap();
    assert_eq!(v2.version, 2);
    let reopened = open(tempdir.path());
    let chain = reopened.get_prev_of(&v2.id, None).unwrap();
    assert_eq!(
        chain.iter().map(|r| r.filename.as_str()).collect::<Vec<_>>(),
        vec!["three", "one"]
    );
    assert_eq!(reopened.get_by_id(&v1.id).unwrap().next, Some(v2.id.clone()));
    assert!(!reopened.get_current_list().unwrap().is_empty());
}

#[test]
fn test_failed_current_write_takes_back_revision() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let v1 = store.add(NewRevision::new("p", "one")).unwrap();
    let current = tempdir.path().join(crate::current_index::CURRENT_FILE);
    std::fs::remove_file(&current).unwrap();
    std::fs::create_dir(&current).unwrap();
    assert!(store.add(NewRevision::new("p", "two")).is_err());
    assert!(store.get_by_id(&v1.id).unwrap().is_head());
    assert_eq!(store.get_prev_of(&v1.id, None).unwrap().len(), 1);
    std::fs::remove_dir(&current).unwrap();

    let v2 = store.add(NewRevision::new("p", "three")).unwrap();
    assert_eq!(v2.prev.as_ref(), Some(&v1.id));
    let reopened = open(tempdir.path());
    assert_eq!(reopened.get_by_name("p").unwrap().id, v2.id);
    assert_eq!(reopened.get_next_of(&v1.id, None).unwrap().len(), 2);
}

#[test]
fn test_revert_brings_back_payload_bytes() {
    use crate::payload::{in_memory::InMemoryPayloadStore, PayloadStore};
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = open(tempdir.path());
    let mut payloads = InMemoryPayloadStore::new();
    let mut ids = Vec::new();
    for body in ["draft", "final", "oops"] {
        let filename = payloads.insert(body.as_bytes()).unwrap();
        ids.push(store.add(NewRevision::new("Notes", filename)).unwrap().id);
    }
    let reverted = store.revert(&ids[1]).unwrap();
    assert_eq!(
        payloads.read(&reverted.filename).unwrap(),
        Some(Vec::from(&b"final"[..]))
    );
    let oops = store.get_by_version("Notes", 3).unwrap();
    assert_eq!(payloads.read(&oops.filename).unwrap(), Some(Vec::from(&b"oops"[..])));
}
