//! Durable checklist of completed ranges.
//!
//! Maps a Range identifier (`bytes=<low>-<high>`) to the fragment filename
//! that satisfied it. The file is rewritten atomically after every
//! successful fetch, so a reloaded checklist contains exactly the entries
//! flushed before a crash, never a partial one.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Filename suffix of a checklist file.
pub const CHECKLIST_SUFFIX: &str = ".ok";

/// Durable map of Range identifiers to fragment filenames.
#[derive(Debug)]
pub struct Checklist {
    entries: HashMap<String, String>,
    path: PathBuf,
}

impl Checklist {
    /// Open the checklist at `path`, loading prior entries when present.
    ///
    /// A truncated or otherwise unreadable file never fails the run: the
    /// checklist starts empty instead.
    pub fn open(path: PathBuf) -> Self {
        let entries = match File::open(&path) {
            Ok(file) => match bincode::deserialize_from(BufReader::new(file)) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load checklist, starting empty; the file might be edited"
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { entries, path }
    }

    /// Whether a Range identifier is already satisfied.
    pub fn contains(&self, range_id: &str) -> bool {
        self.entries.contains_key(range_id)
    }

    /// Record the fragment that satisfied a range. Not durable until
    /// [`Checklist::flush`] succeeds.
    pub fn insert(&mut self, range_id: String, fragment: String) {
        self.entries.insert(range_id, fragment);
    }

    /// Fragment filename recorded for a range, if any.
    pub fn get(&self, range_id: &str) -> Option<&str> {
        self.entries.get(range_id).map(String::as_str)
    }

    /// Number of satisfied ranges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no range is satisfied yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries.
    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    /// The file backing this checklist.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the backing file atomically (temp file, then rename).
    pub fn flush(&self) -> io::Result<()> {
        let temp_path = self.path.with_extension("ok.tmp");
        let file = File::create(&temp_path)?;
        bincode::serialize_into(BufWriter::new(file), &self.entries)
            .map_err(|e| io::Error::other(format!("failed to serialize checklist: {}", e)))?;
        std::fs::rename(&temp_path, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let checklist = Checklist::open(temp.path().join("archive.ok"));
        assert!(checklist.is_empty());
    }

    #[test]
    fn test_flush_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("archive.ok");

        let mut checklist = Checklist::open(path.clone());
        checklist.insert("bytes=0-99".to_string(), "archive@bytes=0-99".to_string());
        checklist.flush().unwrap();
        checklist.insert("bytes=100-199".to_string(), "archive@bytes=100-199".to_string());
        checklist.flush().unwrap();

        let reloaded = Checklist::open(path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("bytes=0-99"));
        assert_eq!(reloaded.get("bytes=0-99"), Some("archive@bytes=0-99"));
    }

    #[test]
    fn test_crash_before_flush_loses_only_unflushed_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("archive.ok");

        let mut checklist = Checklist::open(path.clone());
        checklist.insert("bytes=0-99".to_string(), "a".to_string());
        checklist.flush().unwrap();
        // Simulated crash: the second entry is inserted but never flushed.
        checklist.insert("bytes=100-199".to_string(), "b".to_string());
        drop(checklist);

        let reloaded = Checklist::open(path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("bytes=0-99"));
        assert!(!reloaded.contains("bytes=100-199"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("archive.ok");
        std::fs::write(&path, b"\x01garbage").unwrap();

        let checklist = Checklist::open(path);
        assert!(checklist.is_empty());
    }
}
