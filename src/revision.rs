use std::path::PathBuf;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::revision_id::RevisionId;

/// Format of `created` in the persisted log.
pub const CREATED_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// A single entry in a name's version chain.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    /// The content name this revision belongs to, shared by the whole chain.
    pub name: String,
    /// 1 for the root of the chain, one more than `prev` otherwise.
    pub version: u64,
    /// The following revision, `None` while this is the head.
    pub next: Option<RevisionId>,
    /// The preceding revision, `None` for the root.
    pub prev: Option<RevisionId>,
    #[serde(with = "created_format")]
    pub created: NaiveDateTime,
    pub comment: String,
    /// Where the payload lives, relative to the sharded root.
    pub filename: String,
    /// Full path of the payload, derived from `filename` and never persisted.
    #[serde(skip)]
    pub filepath: PathBuf,
}

impl Revision {
    pub fn is_head(&self) -> bool {
        self.next.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.prev.is_none()
    }
}

/// What a writer supplies when appending to a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRevision {
    pub name: String,
    pub comment: String,
    pub filename: String,
    /// Defaults to now when `None`.
    pub created: Option<NaiveDateTime>,
}

impl NewRevision {
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            filename: filename.into(),
            created: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn created(mut self, created: NaiveDateTime) -> Self {
        self.created = Some(created);
        self
    }
}

/// The current local time at the precision the log keeps.
pub fn now() -> NaiveDateTime {
    truncate(Local::now().naive_local())
}

/// Drops sub-second precision, which the persisted format cannot hold.
pub fn truncate(t: NaiveDateTime) -> NaiveDateTime {
    t.with_nanosecond(0).unwrap_or(t)
}

mod created_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::CREATED_FORMAT;

    pub fn serialize<S>(created: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&created.format(CREATED_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, CREATED_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
fn sample() -> Revision {
    use chrono::NaiveDate;
    Revision {
        id: RevisionId::from("r1"),
        name: String::from("Home"),
        version: 1,
        next: None,
        prev: None,
        created: NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 30)
            .unwrap(),
        comment: String::from("first"),
        filename: String::from("abcdef"),
        filepath: PathBuf::from("/somewhere/ab/abcdef"),
    }
}

#[test]
fn test_persisted_shape() {
    let json = serde_json::to_value(sample()).unwrap();
    assert_eq!(json["created"], "2024/03/09 07:05:30");
    assert_eq!(json["next"], serde_json::Value::Null);
    assert_eq!(json["prev"], serde_json::Value::Null);
    assert!(json.get("filepath").is_none());
}

#[test]
fn test_created_parses_back() {
    let original = sample();
    let bytes = serde_json::to_vec(&original).unwrap();
    let back: Revision = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(back.created, original.created);
    assert_eq!(back.filepath, PathBuf::new());
}

#[test]
fn test_rejects_malformed_created() {
    let json = r#"{"id":"r1","name":"Home","version":1,"next":null,"prev":null,
        "created":"2024-03-09T07:05:30","comment":"","filename":"ab"}"#;
    assert!(serde_json::from_str::<Revision>(json).is_err());
}

#[test]
fn test_now_has_no_subseconds() {
    assert_eq!(now().nanosecond(), 0);
}
