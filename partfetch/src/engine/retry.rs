//! Retry queue and the totally-failed record.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Filename suffix of the failed-items file.
pub const FAILED_SUFFIX: &str = ".failed";

/// One failed fetch awaiting another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryItem {
    pub url: String,

    /// Path of the fragment file the retry should produce.
    pub fragment_path: String,

    /// Request headers, including the `Range` header.
    pub headers: HashMap<String, String>,

    /// Optional request body.
    pub data: Option<String>,

    /// Range identifier, doubling as the checklist key on success.
    pub range_id: String,
}

/// FIFO queue of retry items.
#[derive(Debug, Default)]
pub struct RetryQueue {
    items: VecDeque<RetryItem>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: RetryItem) {
        self.items.push_back(item);
    }

    /// Put an item back at the front, preserving its turn.
    pub fn push_front(&mut self, item: RetryItem) {
        self.items.push_front(item);
    }

    pub fn pop(&mut self) -> Option<RetryItem> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Drain whatever remains into a vector.
    pub fn drain(&mut self) -> Vec<RetryItem> {
        self.items.drain(..).collect()
    }
}

/// Persist unresolved retry items at run end.
pub fn write_failed(path: &Path, items: &[RetryItem]) -> io::Result<()> {
    let file = File::create(path)?;
    bincode::serialize_into(BufWriter::new(file), &items.to_vec())
        .map_err(|e| io::Error::other(format!("failed to serialize failed items: {}", e)))
}

/// Load a failed-items file.
pub fn load_failed(path: &Path) -> io::Result<Vec<RetryItem>> {
    let file = File::open(path)?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| io::Error::other(format!("failed to deserialize failed items: {}", e)))
}
