use std::path::{Path, PathBuf};

use crate::{
    config::StoreConfig,
    error::{Error, Result},
};

/// Maps a filename to a path under `root`, placing it below up to `depth`
/// directories named after successive `step`-character prefixes of the
/// filename, so no single directory collects the whole corpus.
///
/// With `step = 2` and `depth = 3`, `abcdefg` lands at
/// `root/ab/cd/ef/abcdefg`. A segment is only split off while more than
/// `step` characters remain, and the filename itself is never altered.
#[derive(Debug, Clone)]
pub struct PathSharder {
    root: PathBuf,
    step: usize,
    depth: usize,
}

impl PathSharder {
    pub fn new(root: PathBuf, step: usize, depth: usize) -> Result<Self> {
        if step < 1 {
            return Err(Error::InvalidConfiguration { step, depth });
        }
        Ok(Self { root, step, depth })
    }

    pub fn with_config(root: PathBuf, config: StoreConfig) -> Result<Self> {
        Self::new(root, config.step, config.depth)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shard directory names for `filename`, outermost first.
    pub fn segments(&self, filename: &str) -> Vec<String> {
        let chars: Vec<char> = filename.chars().collect();
        let mut segments = Vec::new();
        let mut rest: &[char] = &chars;
        while rest.len() > self.step && segments.len() < self.depth {
            let (segment, tail) = rest.split_at(self.step);
            segments.push(segment.iter().collect());
            rest = tail;
        }
        segments
    }

    /// The full path of `filename`, without touching the filesystem.
    pub fn path_of(&self, filename: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in self.segments(filename) {
            path.push(segment);
        }
        path.push(filename);
        path
    }

    /// The full path of `filename`, creating missing shard directories when
    /// `create_dirs` is set.
    pub fn resolve(&self, filename: &str, create_dirs: bool) -> Result<PathBuf> {
        let path = self.path_of(filename);
        if create_dirs {
            if let Some(parent) = path.parent() {
                if !parent.try_exists()? {
                    log::info!("creating shard directory {:?}", parent);
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(path)
    }
}

#[test]
fn test_three_levels() {
    let sharder = PathSharder::new(PathBuf::from("/root"), 2, 3).unwrap();
    assert_eq!(
        sharder.path_of("abcdefg"),
        PathBuf::from("/root/ab/cd/ef/abcdefg")
    );
}

#[test]
fn test_defaults_use_one_two_char_level() {
    let sharder = PathSharder::with_config(PathBuf::from("/w"), StoreConfig::default()).unwrap();
    assert_eq!(sharder.path_of("abcdefg"), PathBuf::from("/w/ab/abcdefg"));
}

#[test]
fn test_short_filenames_are_not_sharded() {
    let sharder = PathSharder::new(PathBuf::from("/w"), 2, 3).unwrap();
    assert_eq!(sharder.path_of("ab"), PathBuf::from("/w/ab"));
    assert_eq!(sharder.path_of("abc"), PathBuf::from("/w/ab/abc"));
    assert_eq!(sharder.path_of("abcd"), PathBuf::from("/w/ab/abcd"));
    assert_eq!(sharder.path_of("abcde"), PathBuf::from("/w/ab/cd/abcde"));
}

#[test]
fn test_zero_depth_disables_sharding() {
    let sharder = PathSharder::new(PathBuf::from("/w"), 2, 0).unwrap();
    assert_eq!(sharder.path_of("abcdefg"), PathBuf::from("/w/abcdefg"));
}

#[test]
fn test_multibyte_filenames_split_on_chars() {
    let sharder = PathSharder::new(PathBuf::from("/w"), 1, 2).unwrap();
    assert_eq!(sharder.path_of("äöü"), PathBuf::from("/w/ä/ö/äöü"));
}

#[test]
fn test_zero_step_is_invalid() {
    assert!(matches!(
        PathSharder::new(PathBuf::from("/w"), 0, 1),
        Err(Error::InvalidConfiguration { step: 0, depth: 1 })
    ));
}

#[test]
fn test_resolve_creates_directories_idempotently() {
    let tempdir = tempfile::tempdir().unwrap();
    let sharder = PathSharder::new(tempdir.path().into(), 2, 2).unwrap();
    let path = sharder.resolve("abcdef", true).unwrap();
    assert_eq!(path, tempdir.path().join("ab").join("cd").join("abcdef"));
    assert!(tempdir.path().join("ab").join("cd").is_dir());
    assert_eq!(sharder.resolve("abcdef", true).unwrap(), path);

    let untouched = sharder.resolve("zzzzzz", false).unwrap();
    assert!(!untouched.parent().unwrap().exists());
}
