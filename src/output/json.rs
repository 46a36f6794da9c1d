//! JSON serialization for decoding results.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize a result to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for result types).
pub fn to_json<T: Serialize + ?Sized>(result: &T) -> Result<String> {
    Ok(serde_json::to_string(result)?)
}

/// Serialize a result to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for result types).
pub fn to_json_pretty<T: Serialize + ?Sized>(result: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Write a result as pretty-printed JSON, replacing any existing file.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, result: &T) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush().map_err(|e| Error::io(path, e))
}
