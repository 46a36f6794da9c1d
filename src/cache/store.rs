//! JSON cache entries in a results directory.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::Fingerprint;
use crate::error::{Error, Result};

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    hash: Fingerprint,
    payload: T,
}

/// A directory of `<key>.json` cache entries.
///
/// At most one writer per key is assumed; concurrent writers of the same key
/// race, with the last rename winning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Cache entries under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read the payload stored under `key` if its fingerprint matches.
    ///
    /// An absent entry, an unreadable or corrupt file, and a fingerprint
    /// mismatch all count as a miss.
    pub fn load<T: DeserializeOwned>(&self, key: &str, fingerprint: &Fingerprint) -> Option<T> {
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "cache miss: no entry");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry unreadable");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry corrupt");
                return None;
            }
        };

        if &entry.hash != fingerprint {
            info!(path = %path.display(), "cache miss: inputs changed");
            return None;
        }

        debug!(path = %path.display(), "cache hit");
        Some(entry.payload)
    }

    /// Write `payload` under `key` together with its fingerprint.
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed over the entry, so readers see either the old or the new
    /// entry.
    pub fn store<T: Serialize>(&self, key: &str, payload: &T, fingerprint: &Fingerprint) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let path = self.path(key);
        let tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(
                &mut writer,
                &CacheEntry {
                    hash: fingerprint.clone(),
                    payload,
                },
            )?;
            writer.flush().map_err(|e| Error::io(tmp.path(), e))?;
        }
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    /// Serve `key` from the cache or compute, store and return it.
    ///
    /// Nothing is written when `compute` fails.
    pub fn get_or_compute<T, F>(&self, key: &str, fingerprint: &Fingerprint, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(cached) = self.load(key, fingerprint) {
            return Ok(cached);
        }
        let value = compute()?;
        self.store(key, &value, fingerprint)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FingerprintBuilder;

    fn key(n: i64) -> Fingerprint {
        FingerprintBuilder::new("store").int("n", n).finish()
    }

    #[test]
    fn test_roundtrip_and_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested/results"));
        let payload = vec![0.1_f64, 1.0 / 3.0, -2.5e-300];

        store.store("scores", &payload, &key(1)).unwrap();
        let back: Vec<f64> = store.load("scores", &key(1)).unwrap();
        assert_eq!(back, payload);
        assert!(store.load::<Vec<f64>>("scores", &key(2)).is_none());
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.load::<u32>("absent", &key(0)).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        fs::write(store.path("broken"), b"{\"hash\": \"abc\", \"payl").unwrap();
        assert!(store.load::<u32>("broken", &key(0)).is_none());
    }

    #[test]
    fn test_overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store.store("x", &1_u32, &key(1)).unwrap();
        store.store("x", &2_u32, &key(2)).unwrap();
        assert_eq!(store.load::<u32>("x", &key(2)), Some(2));
        assert!(store.load::<u32>("x", &key(1)).is_none());
        // Only the entry remains, no stray temporaries
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_get_or_compute_skips_work_on_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let mut calls = 0;
        let first: u32 = store
            .get_or_compute("v", &key(1), || {
                calls += 1;
                Ok(7)
            })
            .unwrap();
        let second: u32 = store
            .get_or_compute("v", &key(1), || {
                calls += 1;
                Ok(8)
            })
            .unwrap();
        assert_eq!((first, second, calls), (7, 7, 1));
    }

    #[test]
    fn test_failed_compute_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let result: Result<u32> = store.get_or_compute("v", &key(1), || Err(Error::EmptySchedule));
        assert!(result.is_err());
        assert!(!store.path("v").exists());
    }
}
