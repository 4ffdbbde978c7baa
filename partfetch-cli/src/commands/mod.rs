//! CLI command implementations.

pub mod concat;
pub mod download;
