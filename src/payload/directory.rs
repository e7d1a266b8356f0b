use std::{
    fs::File,
    io::{ErrorKind, Read, Write},
};

use crate::{error::Result, sharder::PathSharder};

use super::{fresh_filename, PayloadStore};

/// A persistent [`PayloadStore`] that keeps each payload in its own file,
/// placed by a [`PathSharder`] exactly where a history store resolves it.
#[derive(Debug, Clone)]
pub struct DirectoryPayloadStore {
    sharder: PathSharder,
}

impl DirectoryPayloadStore {
    pub fn new(sharder: PathSharder) -> Self {
        Self { sharder }
    }
}

impl PayloadStore for DirectoryPayloadStore {
    fn has(&self, filename: &str) -> Result<bool> {
        let path = self.sharder.path_of(filename);
        log::debug!("checking whether {:?} exists", path);
        Ok(path.try_exists()?)
    }

    fn read(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let path = self.sharder.path_of(filename);
        log::debug!("reading payload {:?}", path);
        match File::options().read(true).open(&path) {
            Ok(mut f) => {
                let mut v = Vec::new();
                f.read_to_end(&mut v)?;
                Ok(Some(v))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn insert(&mut self, payload: &[u8]) -> Result<String> {
        let filename = fresh_filename(payload);
        let path = self.sharder.resolve(&filename, true)?;
        log::info!("writing {} byte payload to {:?}", payload.len(), path);
        let mut f = File::options().create_new(true).write(true).open(path)?;
        f.write_all(payload)?;
        f.sync_all()?;
        Ok(filename)
    }
}

#[test]
fn test_directory_payload_store() {
    let tempdir = tempfile::tempdir().unwrap();
    let sharder = PathSharder::new(tempdir.path().into(), 2, 1).unwrap();
    let mut store = DirectoryPayloadStore::new(sharder);
    let filename = store.insert(b"hello, world").unwrap();
    assert!(store.has(&filename).unwrap());
    assert_eq!(
        store.read(&filename).unwrap(),
        Some(Vec::from(&b"hello, world"[..]))
    );
    assert!(tempdir.path().join(&filename[0..2]).join(&filename).is_file());
    assert!(!store.has("0000").unwrap());
    assert_eq!(store.read("0000").unwrap(), None);
}
