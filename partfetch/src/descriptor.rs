//! Resource descriptor persistence.
//!
//! One descriptor is written per working directory, immediately after
//! planning. The reconciler reads it back to learn the authoritative content
//! length without re-probing the server.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Filename suffix of a descriptor file.
pub const DESCRIPTOR_SUFFIX: &str = ".dmeta";

/// Errors raised while persisting or discovering a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// No single descriptor file is discoverable at the given location.
    #[error("no resource descriptor found at {0}")]
    NotFound(PathBuf),

    /// Reading or writing the descriptor failed.
    #[error("failed to access descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The descriptor file is not valid JSON.
    #[error("failed to parse descriptor {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Persistent record of one transfer attempt.
///
/// Created once per run, written immediately after planning and read-only
/// afterward. The recorded `content_length` is authoritative for gap
/// detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub url: String,
    pub path: Option<String>,
    pub name: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub data: Option<String>,
    pub content_length: u64,
    pub start_time: f64,
    pub dparts: bool,
}

impl ResourceDescriptor {
    /// Create a descriptor stamped with the current time.
    pub fn new(url: &str, dir: &Path, name: Option<String>, content_length: u64, dparts: bool) -> Self {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            url: url.to_string(),
            path: Some(dir.to_string_lossy().into_owned()),
            name,
            headers: None,
            data: None,
            content_length,
            start_time,
            dparts,
        }
    }

    /// Write the descriptor into `dir` and return the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, DescriptorError> {
        let path = dir.join(DESCRIPTOR_SUFFIX);
        let json = serde_json::to_string(self).map_err(|e| DescriptorError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| DescriptorError::Io {
            path: path.clone(),
            source: e,
        })?;
        info!(path = %path.display(), url = %self.url, "descriptor saved");
        Ok(path)
    }

    /// Load a descriptor from a file, or discover exactly one inside a
    /// directory.
    pub fn load(source: &Path) -> Result<Self, DescriptorError> {
        let path = if source.is_dir() {
            discover_descriptor(source)?
        } else if source.is_file() {
            source.to_path_buf()
        } else {
            return Err(DescriptorError::NotFound(source.to_path_buf()));
        };

        let json = fs::read_to_string(&path).map_err(|e| DescriptorError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| DescriptorError::Parse {
            path,
            reason: e.to_string(),
        })
    }
}

fn discover_descriptor(dir: &Path) -> Result<PathBuf, DescriptorError> {
    let entries = dir.read_dir().map_err(|e| DescriptorError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().ends_with(DESCRIPTOR_SUFFIX) {
            candidates.push(entry.path());
        }
    }

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        _ => Err(DescriptorError::NotFound(dir.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let descriptor = ResourceDescriptor::new(
            "http://example.com/archive.bin",
            temp.path(),
            Some("archive.bin".to_string()),
            3_000_000,
            false,
        );
        descriptor.save(temp.path()).unwrap();

        let loaded = ResourceDescriptor::load(temp.path()).unwrap();
        assert_eq!(loaded.url, "http://example.com/archive.bin");
        assert_eq!(loaded.content_length, 3_000_000);
        assert!(!loaded.dparts);
        assert!(loaded.start_time > 0.0);
    }

    #[test]
    fn test_missing_descriptor_is_not_found() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ResourceDescriptor::load(temp.path()),
            Err(DescriptorError::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_descriptor_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DESCRIPTOR_SUFFIX);
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            ResourceDescriptor::load(temp.path()),
            Err(DescriptorError::Parse { .. })
        ));
    }
}
