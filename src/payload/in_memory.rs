use std::collections::BTreeMap;

use crate::error::Result;

use super::{fresh_filename, PayloadStore};

#[derive(Debug, Default)]
pub struct InMemoryPayloadStore {
    payloads: BTreeMap<String, Vec<u8>>,
}

impl InMemoryPayloadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayloadStore for InMemoryPayloadStore {
    fn has(&self, filename: &str) -> Result<bool> {
        Ok(self.payloads.contains_key(filename))
    }

    fn read(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.payloads.get(filename).cloned())
    }

    fn insert(&mut self, payload: &[u8]) -> Result<String> {
        let filename = fresh_filename(payload);
        self.payloads.insert(filename.clone(), Vec::from(payload));
        Ok(filename)
    }
}

#[test]
fn test_in_memory_payload_store() {
    let mut store = InMemoryPayloadStore::new();
    let filename = store.insert(b"hello, world").unwrap();
    assert!(store.has(&filename).unwrap());
    assert_eq!(
        store.read(&filename).unwrap(),
        Some(Vec::from(&b"hello, world"[..]))
    );
    assert_eq!(store.read("missing").unwrap(), None);
}
