//! CLI error type.

use thiserror::Error;

use partfetch::engine::EngineError;
use partfetch::parts::PartsError;
use partfetch::range::SelectorParseError;
use partfetch::reconcile::ReconcileError;
use partfetch::transport::TransportError;

/// Errors surfaced to the terminal, each mapped to a nonzero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid block selector: {0}")]
    Selector(#[from] SelectorParseError),

    #[error("could not load parts list: {0}")]
    Parts(#[from] PartsError),

    #[error("could not set up HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("download failed: {0}")]
    Engine(#[from] EngineError),

    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("{count} range(s) could not be fetched; see the .failed file")]
    Unresolved { count: usize },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Selector(_) => 2,
            CliError::Parts(_) => 3,
            CliError::Transport(_) => 4,
            CliError::Engine(_) => 5,
            CliError::Reconcile(_) => 6,
            CliError::Unresolved { .. } => 7,
        }
    }
}
