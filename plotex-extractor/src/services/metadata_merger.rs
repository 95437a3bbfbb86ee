//! Metadata merging
//!
//! Loads JSON sidecar files and merges them into one bundle. Merge strategy:
//! shallow top-level overwrite, files later in the input order win.
//!
//! A corrupt or unreadable file is skipped with a warning. A metadata directory
//! that cannot be listed aborts the run.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExtractorError, ExtractorResult};

/// Merged metadata, keyed by top-level JSON key
pub type MetadataBundle = Map<String, Value>;

/// Merge every metadata file in `paths`
///
/// Directories contribute their `.json` entries in file-name order.
pub fn merge_metadata(paths: &[PathBuf]) -> ExtractorResult<MetadataBundle> {
    let mut merged = MetadataBundle::new();

    for path in paths {
        if path.is_dir() {
            for file in list_metadata_dir(path)? {
                merge_file(&mut merged, &file);
            }
        } else {
            merge_file(&mut merged, path);
        }
    }

    tracing::debug!(keys = merged.len(), files = paths.len(), "Metadata merged");
    Ok(merged)
}

fn list_metadata_dir(dir: &Path) -> ExtractorResult<Vec<PathBuf>> {
    let read_err = |e: std::io::Error| {
        tracing::error!("An error was caught listing metadata folder {}: {}", dir.display(), e);
        ExtractorError::MetadataDirectory(format!("{}: {}", dir.display(), e))
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn merge_file(merged: &mut MetadataBundle, path: &Path) {
    match load_file(path) {
        Ok(Some(map)) => {
            merged.extend(map);
        }
        Ok(None) => {
            tracing::debug!(path = %path.display(), "Metadata file is empty");
        }
        Err(reason) => {
            tracing::warn!("Unable to load json from file '{}' due to exception", path.display());
            tracing::warn!("    Exception: {}", reason);
        }
    }
}

fn load_file(path: &Path) -> Result<Option<MetadataBundle>, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&content).map_err(|e| e.to_string())?;

    match value {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(format!(
            "expected a JSON object at the top level, found {}",
            json_type_name(&other)
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
