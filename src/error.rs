use std::fmt::Display;

use derive_more::From;

use crate::revision_id::RevisionId;

pub type Result<T> = std::result::Result<T, Error>;

/// A lookup that matched nothing in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Id(RevisionId),
    Name(String),
    Version { name: String, version: u64 },
}

impl Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFound::Id(id) => write!(f, "Not found id {}", id),
            NotFound::Name(name) => write!(f, "Not found name {}", name),
            NotFound::Version { name, version } => {
                write!(f, "Not found version {} of {}", version, name)
            }
        }
    }
}

#[derive(Debug, From)]
pub enum Error {
    #[from]
    IO(std::io::Error),
    #[from]
    Serde(serde_json::Error),
    #[from]
    NotFound(NotFound),
    /// The sharder was asked for a zero-width directory segment.
    InvalidConfiguration { step: usize, depth: usize },
    /// `id` links to `missing`, which is not in the log.
    BrokenChain { id: RevisionId, missing: RevisionId },
    /// A revision with this id is already in the log.
    DuplicateId(RevisionId),
    /// A namespace that is not a single plain directory name.
    InvalidNamespace(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IO(err) => write!(f, "io error: {}", err),
            Error::Serde(err) => write!(f, "json error: {}", err),
            Error::NotFound(nf) => write!(f, "{}", nf),
            Error::InvalidConfiguration { step, depth } => write!(
                f,
                "invalid sharder configuration: step {} depth {} (step must be at least 1)",
                step, depth
            ),
            Error::BrokenChain { id, missing } => {
                write!(f, "revision {} links to missing revision {}", id, missing)
            }
            Error::DuplicateId(id) => write!(f, "revision {} already exists", id),
            Error::InvalidNamespace(ns) => write!(f, "invalid namespace {:?}", ns),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IO(err) => Some(err),
            Error::Serde(err) => Some(err),
            _ => None,
        }
    }
}

#[test]
fn test_not_found_version_message() {
    let err: Error = NotFound::Version {
        name: String::from("h1"),
        version: 4,
    }
    .into();
    assert!(err.is_not_found());
    assert_eq!(format!("{}", err), "Not found version 4 of h1");
}

#[test]
fn test_io_error_converts() {
    fn open_missing() -> Result<std::fs::File> {
        Ok(std::fs::File::open("/definitely/not/here/wiki-history")?)
    }
    match open_missing() {
        Err(Error::IO(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected io error, got {:?}", other),
    }
}
