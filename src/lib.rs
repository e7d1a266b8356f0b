//! # Wiki History
//!
//! Per-name revision history for wiki content, kept on local disk as two
//! JSON index files plus a sharded tree of payload files.

mod json;

/// Sharding and index settings.
pub mod config;
/// Persisted map from each name to its head revision.
pub mod current_index;
/// Error type shared by the whole crate.
pub mod error;
/// The [`history::HistoryStore`] facade.
pub mod history;
/// Payload byte storage addressed by filename.
pub mod payload;
/// One store per namespace and content kind.
pub mod registry;
/// The revision record.
pub mod revision;
/// Opaque revision identifiers.
pub mod revision_id;
/// Persisted log of every revision.
pub mod revision_log;
/// Filename to sharded path resolution.
pub mod sharder;

pub use config::StoreConfig;
pub use error::{Error, NotFound, Result};
pub use history::HistoryStore;
pub use registry::{ContentKind, Registry};
pub use revision::{NewRevision, Revision};
pub use revision_id::RevisionId;
