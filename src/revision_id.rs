use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque identifier for a single revision.
///
/// Fresh identifiers are random (UUID v4, rendered without hyphens), so they
/// are unique across every chain in a store. Identifiers read back from disk
/// are taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn fresh() -> Self {
        RevisionId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RevisionId {
    fn from(s: String) -> Self {
        RevisionId(s)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        RevisionId(String::from(s))
    }
}

#[test]
fn test_fresh_ids_differ() {
    let a = RevisionId::fresh();
    let b = RevisionId::fresh();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 32);
}

#[test]
fn test_serializes_as_bare_string() {
    let id = RevisionId::from("abc123");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    let back: RevisionId = serde_json::from_str("\"abc123\"").unwrap();
    assert_eq!(back, id);
}
