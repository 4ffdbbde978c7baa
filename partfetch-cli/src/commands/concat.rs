//! Concat command - reconcile a fragment directory.

use std::path::PathBuf;

use partfetch::reconcile::{Reconciler, Reconciliation};

use crate::error::CliError;

/// Arguments for the concat command.
pub struct ConcatArgs {
    pub dir: PathBuf,
    pub allow_missing_descriptor: bool,
}

/// Run the concat command.
pub fn run(args: ConcatArgs) -> Result<(), CliError> {
    let reconciler =
        Reconciler::new().with_allow_missing_descriptor(args.allow_missing_descriptor);

    match reconciler.reconcile(&args.dir)? {
        Reconciliation::Complete(path) => {
            println!("complete: {}", path.display());
        }
        Reconciliation::Incomplete(parts_file) => {
            println!(
                "incomplete: outstanding spans recorded in {}",
                parts_file.display()
            );
            println!("re-run the download with -c {}", parts_file.display());
        }
        Reconciliation::Empty => {
            println!("no fragments found in {}", args.dir.display());
        }
    }
    Ok(())
}
