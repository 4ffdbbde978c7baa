//! Persisted record of outstanding byte spans.
//!
//! A parts list is written by the reconciler when a fragment directory has
//! corrupt or never-attempted spans. A later run loads it to re-slice only
//! the missing data instead of probing the whole resource again.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// Filename suffix of a parts list.
pub const PARTS_SUFFIX: &str = ".dparts";

/// Errors raised while loading or saving a parts list.
#[derive(Debug, Error)]
pub enum PartsError {
    /// No single parts list is discoverable at the given location.
    #[error("no parts list found at {0}")]
    NotFound(PathBuf),

    /// Reading or writing the parts list failed.
    #[error("failed to access parts list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The parts list file could not be decoded.
    #[error("failed to decode parts list {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// A set of range strings recording spans that are still outstanding.
///
/// Range strings are inclusive `<low>-<high>` pairs, the same encoding used
/// in fragment filenames.
#[derive(Debug, Clone)]
pub struct PartsIndex {
    ranges: Vec<String>,
    dir: PathBuf,
}

impl PartsIndex {
    /// Load a parts list from a file, or discover exactly one inside a
    /// directory.
    ///
    /// Records the directory it was found in so a downstream run can anchor
    /// its output there.
    pub fn load(source: &Path) -> Result<Self, PartsError> {
        let path = if source.is_dir() {
            discover_parts_file(source)?
        } else if source.is_file() {
            source.to_path_buf()
        } else {
            return Err(PartsError::NotFound(source.to_path_buf()));
        };

        let file = File::open(&path).map_err(|e| PartsError::Io {
            path: path.clone(),
            source: e,
        })?;
        let ranges: Vec<String> =
            bincode::deserialize_from(BufReader::new(file)).map_err(|e| PartsError::Decode {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { ranges, dir })
    }

    /// Build an index from in-memory range strings anchored at `dir`.
    pub fn from_ranges(ranges: Vec<String>, dir: PathBuf) -> Self {
        Self { ranges, dir }
    }

    /// Write range strings to `path` as a parts list.
    pub fn save(ranges: &[String], path: &Path) -> Result<(), PartsError> {
        let file = File::create(path).map_err(|e| PartsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        bincode::serialize_into(BufWriter::new(file), &ranges.to_vec()).map_err(|e| {
            PartsError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    /// Number of original range entries.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Exact-match lookup of a range string.
    pub fn contains(&self, range: &str) -> bool {
        self.ranges.iter().any(|r| r == range)
    }

    /// The directory the parts list was discovered in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compile the entries into a sorted, deduplicated boundary list.
    ///
    /// Spans wider than `unit` are re-cut: `l, l+unit, l+2*unit, ...` up to
    /// `h`, with the plain endpoints always included. The result is suitable
    /// for direct-mode request conversion.
    pub fn boundaries(&self, unit: u64) -> Vec<u64> {
        let mut seen = BTreeSet::new();
        for range in &self.ranges {
            let Some((low, high)) = parse_range(range) else {
                warn!(range = %range, "skipping malformed parts entry");
                continue;
            };
            if high - low > unit {
                let mut cursor = low;
                while cursor < high {
                    seen.insert(cursor);
                    cursor += unit;
                }
            }
            seen.insert(low);
            seen.insert(high);
        }
        seen.into_iter().collect()
    }
}

fn parse_range(range: &str) -> Option<(u64, u64)> {
    let (low, high) = range.rsplit_once('-')?;
    let low = low.parse().ok()?;
    let high = high.parse().ok()?;
    if low > high {
        return None;
    }
    Some((low, high))
}

fn discover_parts_file(dir: &Path) -> Result<PathBuf, PartsError> {
    let entries = dir.read_dir().map_err(|e| PartsError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(PARTS_SUFFIX) {
            candidates.push(entry.path());
        }
    }

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        _ => Err(PartsError::NotFound(dir.to_path_buf())),
    }
}
