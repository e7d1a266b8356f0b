use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt::Display,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    config::StoreConfig,
    error::{Error, Result},
    history::HistoryStore,
};

/// The kinds of content a wiki namespace versions independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Page,
    File,
    Template,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Page, ContentKind::File, ContentKind::Template];

    /// Directory under the namespace root holding this kind's store.
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentKind::Page => "page",
            ContentKind::File => "file",
            ContentKind::Template => "template",
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.dir_name() == s)
            .ok_or_else(|| format!("unknown content kind {:?}", s))
    }
}

/// Owns one [`HistoryStore`] per namespace and content kind, opening each on
/// first use at `<root>/<namespace>/<kind>`.
///
/// Construct one at startup and hand it to whatever serves requests.
#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    config: StoreConfig,
    stores: BTreeMap<(String, ContentKind), HistoryStore>,
}

impl Registry {
    pub fn new(root: PathBuf, config: StoreConfig) -> Result<Self> {
        Ok(Self {
            root,
            config: config.validate()?,
            stores: BTreeMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<namespace>/<kind>`. The namespace must be one plain
    /// directory name, so a store never lands outside the root.
    pub fn store_root(&self, namespace: &str, kind: ContentKind) -> Result<PathBuf> {
        let mut components = Path::new(namespace).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {
                Ok(self.root.join(namespace).join(kind.dir_name()))
            }
            _ => Err(Error::InvalidNamespace(String::from(namespace))),
        }
    }

    pub fn store(&mut self, namespace: &str, kind: ContentKind) -> Result<&mut HistoryStore> {
        let root = self.store_root(namespace, kind)?;
        match self.stores.entry((String::from(namespace), kind)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                log::info!("opening {} store for namespace {:?}", kind, namespace);
                let store = HistoryStore::open(root, self.config)?;
                Ok(entry.insert(store))
            }
        }
    }

    /// Namespaces with at least one store opened through this registry.
    pub fn open_namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.stores.keys().map(|(ns, _)| ns.as_str()).collect();
        namespaces.dedup();
        namespaces
    }

    /// Drops the cached store, so the next access reads it from disk again.
    pub fn close(&mut self, namespace: &str, kind: ContentKind) -> Option<HistoryStore> {
        self.stores.remove(&(String::from(namespace), kind))
    }
}

#[test]
fn test_kinds_are_kept_apart() {
    use crate::revision::NewRevision;
    let tempdir = tempfile::tempdir().unwrap();
    let mut registry = Registry::new(tempdir.path().into(), StoreConfig::default()).unwrap();
    registry
        .store("main", ContentKind::Page)
        .unwrap()
        .add(NewRevision::new("Home", "aaaa"))
        .unwrap();
    registry
        .store("main", ContentKind::Template)
        .unwrap()
        .add(NewRevision::new("Nav", "bbbb"))
        .unwrap();

    let pages = registry.store("main", ContentKind::Page).unwrap();
    assert!(pages.has_name("Home"));
    assert!(!pages.has_name("Nav"));
    assert!(tempdir
        .path()
        .join("main")
        .join("template")
        .join("current.json")
        .is_file());
    assert_eq!(registry.open_namespaces(), vec!["main"]);
}

#[test]
fn test_store_is_reused_until_closed() {
    use crate::revision::NewRevision;
    let tempdir = tempfile::tempdir().unwrap();
    let mut registry = Registry::new(tempdir.path().into(), StoreConfig::default()).unwrap();
    registry
        .store("ns", ContentKind::File)
        .unwrap()
        .add(NewRevision::new("logo.png", "cccc"))
        .unwrap();
    assert!(registry.close("ns", ContentKind::File).is_some());
    assert!(registry.close("ns", ContentKind::File).is_none());
    let reopened = registry.store("ns", ContentKind::File).unwrap();
    assert_eq!(reopened.get_by_name("logo.png").unwrap().version, 1);
}

#[test]
fn test_content_kind_parses() {
    assert_eq!("template".parse::<ContentKind>(), Ok(ContentKind::Template));
    assert!("pages".parse::<ContentKind>().is_err());
}

#[test]
fn test_invalid_config_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    assert!(Registry::new(tempdir.path().into(), StoreConfig { step: 0, depth: 1 }).is_err());
}

#[test]
fn test_namespace_stays_under_root() {
    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path().join("wiki");
    let mut registry = Registry::new(root.clone(), StoreConfig::default()).unwrap();
    let outside = tempdir.path().join("elsewhere");
    for namespace in ["", ".", "..", "../..", "a/b", "/", outside.to_str().unwrap()] {
        assert!(
            matches!(
                registry.store_root(namespace, ContentKind::Page),
                Err(Error::InvalidNamespace(_))
            ),
            "{:?} accepted",
            namespace
        );
        assert!(registry.store(namespace, ContentKind::Page).is_err());
    }
    assert!(!outside.exists());
    assert_eq!(
        registry.store_root("main", ContentKind::File).unwrap(),
        root.join("main").join("file")
    );
}
