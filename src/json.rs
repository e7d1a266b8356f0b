use std::{
    fs::{remove_file, rename, File},
    io::{BufReader, ErrorKind, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reads a JSON encoded thing from `path`, or `None` if there is no such file.
pub fn read_json<A: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<A>> {
    match File::options().read(true).open(path) {
        Ok(f) => Ok(Some(serde_json::from_reader(BufReader::new(f))?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replaces the contents of `path` with the pretty JSON encoding of `thing`.
///
/// The encoding goes to a sibling `.tmp` file first and is renamed into
/// place, so a reader never sees a half-written file.
pub fn write_json<A: Serialize>(thing: &A, path: &Path) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);
    let mut f = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)?;
    serde_json::to_writer_pretty(&mut f, thing)?;
    f.write_all(b"\n")?;
    f.sync_all()?;
    if let Err(err) = rename(tmp, path) {
        let _ = remove_file(tmp);
        return Err(err.into());
    }
    Ok(())
}

#[test]
fn test_missing_file_reads_as_none() {
    let tempdir = tempfile::tempdir().unwrap();
    let got: Option<Vec<u32>> = read_json(&tempdir.path().join("nothing.json")).unwrap();
    assert_eq!(got, None);
}

#[test]
fn test_write_replaces_longer_contents() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("list.json");
    write_json(&vec![1u32, 2, 3, 4, 5, 6, 7, 8], &path).unwrap();
    write_json(&vec![9u32], &path).unwrap();
    let got: Option<Vec<u32>> = read_json(&path).unwrap();
    assert_eq!(got, Some(vec![9]));
    assert!(!tempdir.path().join("list.json.tmp").exists());
}

#[test]
fn test_failed_rename_cleans_up() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("blocked.json");
    std::fs::create_dir(&path).unwrap();
    assert!(write_json(&vec![1u32], &path).is_err());
    assert!(!tempdir.path().join("blocked.json.tmp").exists());
}
