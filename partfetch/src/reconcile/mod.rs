//! Fragment directory reconciliation.
//!
//! Audits a directory of fetched fragments against the recorded resource
//! descriptor: undersized fragments are corrupt, uncovered byte spans are
//! coverage gaps. A clean directory is concatenated into the final artifact;
//! anything else quarantines the healthy fragments and emits a parts list
//! for a follow-up run.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::descriptor::{DescriptorError, ResourceDescriptor};
use crate::parts::{PartsError, PartsIndex, PARTS_SUFFIX};
use crate::range::{parse_fragment_name, strip_fragment_marker, FRAGMENT_MARKER};

/// Name of the quarantine subdirectory.
pub const QUARANTINE_DIR: &str = "_quarantine";

/// Filename suffix of the quarantine archive.
pub const ARCHIVE_SUFFIX: &str = ".dparts.tgz";

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The given path is not a directory.
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    /// No resource descriptor was found and the caller did not opt out.
    #[error("no resource descriptor found in {0}; enable allow_missing_descriptor to proceed")]
    DescriptorMissing(PathBuf),

    /// The descriptor exists but could not be read.
    #[error("unusable resource descriptor: {0}")]
    DescriptorInvalid(String),

    /// Filesystem operation failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the parts list failed.
    #[error(transparent)]
    Parts(#[from] PartsError),
}

/// One fragment discovered in the directory.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub path: PathBuf,
    pub name: String,
    pub low: u64,
    pub high: u64,
    pub size: u64,
}

impl Fragment {
    /// Inclusive width of the span encoded in the name.
    pub fn span(&self) -> u64 {
        self.high - self.low + 1
    }

    /// Range string as used in parts lists.
    pub fn range(&self) -> String {
        format!("{}-{}", self.low, self.high)
    }
}

/// Result of auditing a fragment directory.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    /// Total bytes lost to corrupt fragments.
    pub corrupt_bytes: u64,

    /// Corrupt fragment files, slated for deletion.
    pub corrupt: Vec<PathBuf>,

    /// Spans with no fragment at all, as range strings.
    pub undiscovered: Vec<String>,
}

impl CoverageReport {
    /// Whether the directory has full, healthy coverage.
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty() && self.undiscovered.is_empty()
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug)]
pub enum Reconciliation {
    /// Full coverage; the final artifact was written here.
    Complete(PathBuf),

    /// Gaps remain; a parts list for the outstanding spans was written here.
    Incomplete(PathBuf),

    /// The directory holds no fragments.
    Empty,
}

/// Audits and finishes fragment directories.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    allow_missing_descriptor: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proceed without a descriptor, skipping the checks that need the
    /// authoritative content length.
    pub fn with_allow_missing_descriptor(mut self, allow: bool) -> Self {
        self.allow_missing_descriptor = allow;
        self
    }

    /// Reconcile a fragment directory.
    pub fn reconcile(&self, dir: &Path) -> Result<Reconciliation, ReconcileError> {
        if !dir.is_dir() {
            return Err(ReconcileError::NotADirectory(dir.to_path_buf()));
        }

        let fragments = scan_fragments(dir)?;
        if fragments.is_empty() {
            info!(dir = %dir.display(), "no fragments found, nothing to reconcile");
            return Ok(Reconciliation::Empty);
        }

        let content_length = match ResourceDescriptor::load(dir) {
            Ok(descriptor) => Some(descriptor.content_length),
            Err(DescriptorError::NotFound(path)) => {
                if self.allow_missing_descriptor {
                    warn!(
                        dir = %dir.display(),
                        "no descriptor; skipping checks that need the content length"
                    );
                    None
                } else {
                    return Err(ReconcileError::DescriptorMissing(path));
                }
            }
            Err(e) => return Err(ReconcileError::DescriptorInvalid(e.to_string())),
        };

        let report = self.audit(&fragments, content_length);
        if report.is_clean() {
            let final_path = concatenate(dir, &fragments)?;
            info!(path = %final_path.display(), "coverage complete, artifact written");
            return Ok(Reconciliation::Complete(final_path));
        }

        warn!(
            corrupt_bytes = report.corrupt_bytes,
            corrupt = report.corrupt.len(),
            undiscovered = report.undiscovered.len(),
            "coverage incomplete, quarantining healthy fragments"
        );
        let parts_file = self.quarantine(dir, &fragments, &report)?;
        Ok(Reconciliation::Incomplete(parts_file))
    }

    /// Classify fragments and detect coverage gaps.
    ///
    /// Fragments must be sorted by upper bound: the last one is presumed
    /// healthy because only the descriptor knows how short it may be.
    pub fn audit(&self, fragments: &[Fragment], content_length: Option<u64>) -> CoverageReport {
        let mut report = CoverageReport::default();

        for fragment in fragments.iter().take(fragments.len().saturating_sub(1)) {
            // A healthy fragment holds exactly the span its name encodes;
            // for aligned fragments that span equals the unit.
            if fragment.size != fragment.span() {
                debug!(
                    name = %fragment.name,
                    size = fragment.size,
                    expected = fragment.span(),
                    "corrupt fragment"
                );
                report.corrupt_bytes += fragment.span();
                report.corrupt.push(fragment.path.clone());
            }
        }

        if let Some(first) = fragments.first() {
            if first.low != 0 {
                report.undiscovered.push(format!("0-{}", first.low - 1));
            }
        }
        for pair in fragments.windows(2) {
            if pair[0].high + 1 < pair[1].low {
                report
                    .undiscovered
                    .push(format!("{}-{}", pair[0].high + 1, pair[1].low - 1));
            }
        }
        if let (Some(last), Some(length)) = (fragments.last(), content_length) {
            if last.high + 1 < length {
                report
                    .undiscovered
                    .push(format!("{}-{}", last.high + 1, length - 1));
            }
        }

        report
    }

    /// Delete corrupt fragments, move healthy ones aside, and write the
    /// parts list for everything still outstanding.
    fn quarantine(
        &self,
        dir: &Path,
        fragments: &[Fragment],
        report: &CoverageReport,
    ) -> Result<PathBuf, ReconcileError> {
        let quarantine_dir = dir.join(QUARANTINE_DIR);
        fs::create_dir_all(&quarantine_dir).map_err(|e| ReconcileError::Io {
            path: quarantine_dir.clone(),
            source: e,
        })?;

        let basename = strip_fragment_marker(&fragments[0].name).to_string();
        let mut outstanding = Vec::new();

        for fragment in fragments {
            if report.corrupt.contains(&fragment.path) {
                outstanding.push(fragment.range());
                fs::remove_file(&fragment.path).map_err(|e| ReconcileError::Io {
                    path: fragment.path.clone(),
                    source: e,
                })?;
                info!(name = %fragment.name, "corrupt fragment deleted");
            } else {
                let target = quarantine_dir.join(&fragment.name);
                fs::rename(&fragment.path, &target).map_err(|e| ReconcileError::Io {
                    path: fragment.path.clone(),
                    source: e,
                })?;
                debug!(name = %fragment.name, "healthy fragment quarantined");
            }
        }
        outstanding.extend(report.undiscovered.iter().cloned());

        let parts_file = quarantine_dir.join(format!("{}{}", basename, PARTS_SUFFIX));
        PartsIndex::save(&outstanding, &parts_file)?;
        info!(
            path = %parts_file.display(),
            spans = outstanding.len(),
            "outstanding parts list written"
        );

        archive_quarantine(dir, &basename);
        Ok(parts_file)
    }
}

fn scan_fragments(dir: &Path) -> Result<Vec<Fragment>, ReconcileError> {
    let entries = dir.read_dir().map_err(|e| ReconcileError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut fragments = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.contains(FRAGMENT_MARKER) {
            continue;
        }
        let Some((_, low, high)) = parse_fragment_name(&name) else {
            warn!(name = %name, "ignoring file with malformed fragment name");
            continue;
        };
        let size = entry
            .metadata()
            .map_err(|e| ReconcileError::Io {
                path: entry.path(),
                source: e,
            })?
            .len();
        fragments.push(Fragment {
            path: entry.path(),
            name,
            low,
            high,
            size,
        });
    }

    // Directory-listing order is arbitrary; the last-fragment heuristic and
    // gap walking both need numeric order.
    fragments.sort_by_key(|f| f.high);
    Ok(fragments)
}

/// Stream-copy fragments, in ascending upper-bound order, into the final
/// artifact named by stripping the fragment marker.
fn concatenate(dir: &Path, fragments: &[Fragment]) -> Result<PathBuf, ReconcileError> {
    let basename = strip_fragment_marker(&fragments[0].name).to_string();
    let final_path = dir.join(&basename);

    let output = File::create(&final_path).map_err(|e| ReconcileError::Io {
        path: final_path.clone(),
        source: e,
    })?;
    let mut writer = BufWriter::new(output);
    for fragment in fragments {
        let input = File::open(&fragment.path).map_err(|e| ReconcileError::Io {
            path: fragment.path.clone(),
            source: e,
        })?;
        io::copy(&mut BufReader::new(input), &mut writer).map_err(|e| ReconcileError::Io {
            path: fragment.path.clone(),
            source: e,
        })?;
    }

    Ok(final_path)
}

/// Package the quarantine subdirectory with the external `tar` utility.
///
/// Archiving is best-effort: the parts list and quarantined fragments are
/// already durable, so a missing `tar` only costs the transport convenience.
fn archive_quarantine(dir: &Path, basename: &str) {
    let archive_name = format!("{}{}", basename, ARCHIVE_SUFFIX);
    let result = Command::new("tar")
        .arg("-czf")
        .arg(&archive_name)
        .arg(QUARANTINE_DIR)
        .current_dir(dir)
        .output();

    match result {
        Ok(output) if output.status.success() => {
            info!(archive = %archive_name, "quarantine archived");
        }
        Ok(output) => {
            warn!(
                archive = %archive_name,
                status = %output.status,
                "tar failed, quarantine left unarchived"
            );
        }
        Err(e) => {
            warn!(error = %e, "tar not available, quarantine left unarchived");
        }
    }
}
