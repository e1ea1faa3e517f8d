//! File-backed JSON cache with corruption recovery.

use crate::error::CacheError;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Stores one pretty-printed JSON document per key under a root directory.
///
/// Writes go to `<key>.json.tmp` and are renamed over `<key>.json`, so a
/// reader never sees a half-written file. Unreadable documents are moved to
/// `<key>.corrupt-<timestamp>.json` and the caller gets its default.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("file cache ready (root={})", root.display());
        Ok(Self { root })
    }

    /// Directory holding the cache files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `value` under `key`. Failures are logged, never returned.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(err) = self.try_save(key, value) {
            warn!("cache save failed (key={}, error={})", key, err);
        }
    }

    /// Persist `value` under `key`, reporting failures.
    pub fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        let temp_path = self.root.join(format!("{key}.json.tmp"));
        let body = serde_json::to_vec_pretty(value)?;
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        debug!("cache saved (key={}, bytes={})", key, body.len());
        Ok(())
    }

    /// Load the document stored under `key`, or `default` when it was never
    /// saved, is blank, or cannot be decoded.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = match self.entry_path(key) {
            Ok(path) => path,
            Err(err) => {
                warn!("cache load rejected (key={}, error={})", key, err);
                return default;
            }
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("cache miss (key={})", key);
                return default;
            }
            Err(err) => {
                warn!("cache read failed (key={}, error={})", key, err);
                return default;
            }
        };
        if contents.trim().is_empty() {
            debug!("cache entry empty (key={})", key);
            return default;
        }
        match serde_json::from_str(&contents) {
            Ok(value) => {
                debug!("cache loaded (key={}, bytes={})", key, contents.len());
                value
            }
            Err(err) => {
                warn!("cache entry corrupt (key={}, error={})", key, err);
                self.quarantine(key, &path);
                default
            }
        }
    }

    /// Move a corrupt document aside so the next save starts clean.
    fn quarantine(&self, key: &str, path: &Path) {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f");
        let backup = self.root.join(format!("{key}.corrupt-{stamp}.json"));
        match preserve(path, &backup, |from, to| fs::rename(from, to)) {
            Ok(()) => info!(
                "corrupt cache entry backed up (key={}, backup={})",
                key,
                backup.display()
            ),
            Err(err) => warn!(
                "failed to back up corrupt cache entry, next save overwrites it (key={}, error={})",
                key, err
            ),
        }
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

/// Move `from` to `to`, copying when the move fails. The source stays in
/// place after a copy.
fn preserve(
    from: &Path,
    to: &Path,
    rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
) -> io::Result<()> {
    rename(from, to).or_else(|err| {
        debug!("rename failed, copying instead (error={})", err);
        fs::copy(from, to).map(|_| ())
    })
}

#[cfg(test)]
mod tests {
    use super::{FileCache, preserve};
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn backups(root: &std::path::Path, key: &str) -> Vec<String> {
        fs::read_dir(root)
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(&format!("{key}.corrupt-")))
            .collect()
    }

    #[test]
    fn save_then_load_returns_value() {
        let root = tempdir().expect("root");
        let cache = FileCache::new(root.path()).expect("cache");
        let value = Sample {
            name: "a".to_string(),
            count: 3,
        };
        cache.save("sample", &value);
        assert_eq!(cache.load("sample", Sample::default()), value);
        assert!(!root.path().join("sample.json.tmp").exists());
    }

    #[test]
    fn never_saved_key_returns_default() {
        let root = tempdir().expect("root");
        let cache = FileCache::new(root.path()).expect("cache");
        let loaded: BTreeMap<String, u32> = cache.load("missing", BTreeMap::new());
        assert!(loaded.is_empty());
    }

    #[test]
    fn whitespace_file_returns_default_without_backup() {
        let root = tempdir().expect("root");
        let cache = FileCache::new(root.path()).expect("cache");
        fs::write(root.path().join("blank.json"), "  \n").expect("write");
        assert_eq!(cache.load("blank", Sample::default()), Sample::default());
        assert!(backups(root.path(), "blank").is_empty());
    }

    #[test]
    fn corrupt_file_returns_default_and_leaves_one_backup() {
        let root = tempdir().expect("root");
        let cache = FileCache::new(root.path()).expect("cache");
        fs::write(root.path().join("broken.json"), "{\"name\": ").expect("write");

        let loaded = cache.load(
            "broken",
            Sample {
                name: "fallback".to_string(),
                count: 0,
            },
        );

        assert_eq!(loaded.name, "fallback");
        assert_eq!(backups(root.path(), "broken").len(), 1);
        assert!(!root.path().join("broken.json").exists());
    }

    #[test]
    fn failed_move_falls_back_to_copy() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("sessions.json");
        let backup = dir.path().join("sessions.corrupt.json");
        fs::write(&source, "{ not json").expect("write");

        preserve(&source, &backup, |_, _| {
            Err(std::io::Error::other("cross-device link"))
        })
        .expect("copy");

        assert_eq!(fs::read_to_string(&backup).expect("backup"), "{ not json");
    }

    #[test]
    fn save_overwrites_previous_document() {
        let root = tempdir().expect("root");
        let cache = FileCache::new(root.path()).expect("cache");
        cache.save("counter", &1u32);
        cache.save("counter", &2u32);
        assert_eq!(cache.load("counter", 0u32), 2);
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let root = tempdir().expect("root");
        let cache = FileCache::new(root.path()).expect("cache");
        assert!(cache.try_save("../escape", &1u32).is_err());
        assert_eq!(cache.load("../escape", 7u32), 7);
    }
}
