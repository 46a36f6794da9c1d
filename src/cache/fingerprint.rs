//! SHA3-256 fingerprints over named call parameters and file timestamps.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::error::{Error, Result};
use crate::types::Matrix;

/// Hex digest identifying one set of inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The digest as lowercase hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental fingerprint construction.
///
/// Every value is fed together with its name and a type tag, so reordering or
/// renaming parameters changes the digest and adjacent values cannot run
/// into each other.
///
/// ```ignore
/// let key = FingerprintBuilder::new("dataset")
///     .param("mask", "ifs")
///     .ints("frames", &[0, 1, 2])
///     .mtime("events", &events_path)?
///     .finish();
/// ```
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    hasher: Sha3_256,
}

impl FingerprintBuilder {
    /// Start a fingerprint in the namespace `domain`.
    pub fn new(domain: &str) -> Self {
        let mut builder = Self {
            hasher: Sha3_256::new(),
        };
        builder.field(domain, b'D');
        builder
    }

    fn field(&mut self, name: &str, tag: u8) {
        self.hasher.update((name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update([tag]);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Add a string parameter.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.field(name, b's');
        self.bytes(value.as_bytes());
        self
    }

    /// Add an optional string parameter; `None` is distinct from every value.
    pub fn opt_param(mut self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => {
                self.field(name, b'n');
                self
            }
        }
    }

    /// Add a list of strings.
    pub fn strings<S: AsRef<str>>(mut self, name: &str, values: &[S]) -> Self {
        self.field(name, b'S');
        self.hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.bytes(v.as_ref().as_bytes());
        }
        self
    }

    /// Add a boolean flag.
    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.field(name, b'b');
        self.hasher.update([u8::from(value)]);
        self
    }

    /// Add an integer.
    pub fn int(mut self, name: &str, value: i64) -> Self {
        self.field(name, b'i');
        self.hasher.update(value.to_le_bytes());
        self
    }

    /// Add a list of integers.
    pub fn ints(mut self, name: &str, values: &[i64]) -> Self {
        self.field(name, b'I');
        self.hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.hasher.update(v.to_le_bytes());
        }
        self
    }

    /// Add a list of indices or counts.
    pub fn usizes(mut self, name: &str, values: &[usize]) -> Self {
        self.field(name, b'U');
        self.hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.hasher.update((*v as u64).to_le_bytes());
        }
        self
    }

    /// Add a float by its exact bit pattern.
    pub fn float(mut self, name: &str, value: f64) -> Self {
        self.field(name, b'f');
        self.hasher.update(value.to_bits().to_le_bytes());
        self
    }

    /// Add a list of floats.
    pub fn floats(mut self, name: &str, values: &[f64]) -> Self {
        self.field(name, b'F');
        self.hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.hasher.update(v.to_bits().to_le_bytes());
        }
        self
    }

    /// Add a matrix: shape, then column-major values.
    pub fn matrix(mut self, name: &str, value: &Matrix) -> Self {
        self.field(name, b'M');
        self.hasher.update((value.nrows() as u64).to_le_bytes());
        self.hasher.update((value.ncols() as u64).to_le_bytes());
        for v in value.iter() {
            self.hasher.update(v.to_bits().to_le_bytes());
        }
        self
    }

    /// Add the modification time of the file at `path`.
    ///
    /// # Errors
    ///
    /// The file must exist and report a modification time.
    pub fn mtime(mut self, name: &str, path: &Path) -> Result<Self> {
        let nanos = file_mtime(path)?;
        self.field(name, b't');
        self.hasher.update(nanos.to_le_bytes());
        Ok(self)
    }

    /// Finalize into a hex digest.
    pub fn finish(self) -> Fingerprint {
        let digest = self.hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            hex.push_str(&format!("{byte:02x}"));
        }
        Fingerprint(hex)
    }
}

/// Modification time of `path` in nanoseconds relative to the Unix epoch.
pub fn file_mtime(path: &Path) -> Result<i128> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(path, e))?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn base() -> FingerprintBuilder {
        FingerprintBuilder::new("test")
            .param("mask", "ifs")
            .ints("frames", &[0, 1])
            .flag("upsample", false)
    }

    #[test]
    fn test_deterministic() {
        let a = base().finish();
        let b = base().finish();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_any_parameter_change_differs() {
        let a = base().finish();
        assert_ne!(a, base().float("tr", 2.0).finish());
        let b = FingerprintBuilder::new("test")
            .param("mask", "ifs")
            .ints("frames", &[0, 2])
            .flag("upsample", false)
            .finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_names_are_part_of_the_key() {
        let a = FingerprintBuilder::new("t").param("a", "x").finish();
        let b = FingerprintBuilder::new("t").param("b", "x").finish();
        assert_ne!(a, b);
        let c = FingerprintBuilder::new("t").param("ab", "").finish();
        let d = FingerprintBuilder::new("t").param("a", "b").finish();
        assert_ne!(c, d);
    }

    #[test]
    fn test_none_differs_from_empty() {
        let a = FingerprintBuilder::new("t").opt_param("split", None).finish();
        let b = FingerprintBuilder::new("t").opt_param("split", Some("")).finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_touched_file_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        fs::write(&path, "a").unwrap();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        fs::File::options().write(true).open(&path).unwrap().set_modified(t0).unwrap();
        let before = base().mtime("events", &path).unwrap().finish();

        let t1 = t0 + Duration::from_secs(5);
        fs::File::options().write(true).open(&path).unwrap().set_modified(t1).unwrap();
        let after = base().mtime("events", &path).unwrap().finish();
        assert_ne!(before, after);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = base().mtime("events", &dir.path().join("absent"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
