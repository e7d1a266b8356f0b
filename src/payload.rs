use crate::error::Result;

pub mod directory;
pub mod in_memory;

/// Storage for revision payload bytes, addressed by filename.
///
/// The history store only records filenames; a payload store is what turns
/// them into bytes.
pub trait PayloadStore {
    fn has(&self, filename: &str) -> Result<bool>;

    fn read(&self, filename: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `payload` under a filename no other payload has used and
    /// returns that filename.
    fn insert(&mut self, payload: &[u8]) -> Result<String>;
}

/// A filename derived from `payload` and a fresh random nonce, so the same
/// bytes stored twice still land in two files.
pub fn fresh_filename(payload: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(payload);
    hasher.finalize().to_hex().to_string()
}

#[test]
fn test_fresh_filenames_are_unique_hex() {
    let a = fresh_filename(b"same");
    let b = fresh_filename(b"same");
    assert_ne!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}
