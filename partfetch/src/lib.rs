//! partfetch - resumable byte-range downloads
//!
//! This library fetches large HTTP resources as fixed-size byte-range
//! fragments that can be retried, resumed, and reconciled offline. A run
//! slices the resource into a boundary plan, fetches each span into its own
//! fragment file, and records progress in a durable checklist. A separate
//! reconciliation pass audits a fragment directory and either concatenates
//! it into the final artifact or emits a parts list describing what a
//! follow-up run still has to fetch.

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod parts;
pub mod range;
pub mod reconcile;
pub mod transport;

pub use config::EngineConfig;
pub use descriptor::ResourceDescriptor;
pub use engine::{DownloadEngine, DownloadOptions, DownloadOutcome, EngineError};
pub use parts::PartsIndex;
pub use range::{BlockSelector, RangeSlicer};
pub use reconcile::{Reconciler, Reconciliation};
pub use transport::HttpTransport;
