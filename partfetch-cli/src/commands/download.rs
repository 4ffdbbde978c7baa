//! Download command - fetch a resource as range fragments.

use std::collections::HashMap;
use std::path::PathBuf;

use partfetch::config::EngineConfig;
use partfetch::engine::{DownloadEngine, DownloadOptions};
use partfetch::parts::PartsIndex;
use partfetch::range::BlockSelector;
use partfetch::transport::HttpTransport;

use crate::error::CliError;

/// Arguments for the download command.
pub struct DownloadArgs {
    pub url: String,
    pub dir: Option<PathBuf>,
    pub name: Option<String>,
    pub parts: Option<PathBuf>,
    pub blocks: Option<String>,
    pub header: Vec<String>,
    pub data: Option<String>,
    pub unit: Option<u64>,
    pub no_slicing: bool,
}

/// Run the download command.
pub fn run(args: DownloadArgs) -> Result<(), CliError> {
    let selector = args
        .blocks
        .as_deref()
        .map(BlockSelector::parse)
        .transpose()?;
    let parts = args.parts.as_deref().map(PartsIndex::load).transpose()?;

    let mut config = EngineConfig::new().with_slicing(!args.no_slicing);
    if let Some(unit) = args.unit {
        config = config.with_unit(unit);
    }

    let transport = HttpTransport::new(config.timeout)?;
    let engine = DownloadEngine::new(transport, config);
    let options = DownloadOptions {
        dir: args.dir,
        name: args.name,
        headers: parse_headers(&args.header),
        data: args.data,
        parts,
        selector,
    };

    let outcome = engine.run(&args.url, options)?;
    println!("{} range(s) fetched", outcome.checklist.len());
    if !outcome.failed.is_empty() {
        return Err(CliError::Unresolved {
            count: outcome.failed.len(),
        });
    }
    Ok(())
}

/// Split repeated `Name: value` flags into a header map.
fn parse_headers(raw: &[String]) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|h| h.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}
