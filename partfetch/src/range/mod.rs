//! Byte-range planning for sliced downloads.
//!
//! This module decides which byte spans a transfer will request:
//! - `slicer` computes boundary lists and turns them into request pairs
//! - `selector` compiles the block-selection grammar into an epoch predicate
//! - `fragment` encodes and decodes fragment filenames

mod fragment;
mod selector;
mod slicer;

pub use fragment::{fragment_name, parse_fragment_name, strip_fragment_marker, FRAGMENT_MARKER};
pub use selector::{BlockSelector, SelectorParseError};
pub use slicer::{range_header, RangeSlicer};
