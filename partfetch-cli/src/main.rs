//! partfetch CLI - resumable byte-range downloads from the terminal.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::concat::ConcatArgs;
use commands::download::DownloadArgs;

#[derive(Parser)]
#[command(name = "partfetch", version, about = "Resumable byte-range downloader")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a resource as range fragments
    Download {
        /// Resource URL
        url: String,

        /// Working directory for fragments and bookkeeping files
        #[arg(short = 'p', long)]
        dir: Option<PathBuf>,

        /// Logical resource name (defaults to the URL basename)
        #[arg(short, long)]
        name: Option<String>,

        /// Parts list of outstanding spans from an earlier reconciliation
        #[arg(short = 'c', long = "parts")]
        parts: Option<PathBuf>,

        /// Block selector, e.g. "2:5-7:>10"
        #[arg(short, long)]
        blocks: Option<String>,

        /// Extra request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        header: Vec<String>,

        /// Request body to send with every request
        #[arg(short, long)]
        data: Option<String>,

        /// Maximum bytes per requested span
        #[arg(long)]
        unit: Option<u64>,

        /// Fetch the whole resource in a single request
        #[arg(long)]
        no_slicing: bool,
    },

    /// Audit a fragment directory and concatenate it when complete
    Concat {
        /// Directory holding the fragments
        dir: PathBuf,

        /// Proceed without a resource descriptor (skips the tail-gap check)
        #[arg(long)]
        allow_missing_descriptor: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Download {
            url,
            dir,
            name,
            parts,
            blocks,
            header,
            data,
            unit,
            no_slicing,
        } => commands::download::run(DownloadArgs {
            url,
            dir,
            name,
            parts,
            blocks,
            header,
            data,
            unit,
            no_slicing,
        }),
        Command::Concat {
            dir,
            allow_missing_descriptor,
        } => commands::concat::run(ConcatArgs {
            dir,
            allow_missing_descriptor,
        }),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}
