//! Resumable sliced download engine.
//!
//! One run walks the state machine `PLAN -> FETCH(per epoch) -> RETRY-DRAIN
//! -> DONE`:
//!
//! - `PLAN` probes the server (or consumes a parts index) and turns the
//!   boundary list into request pairs, persisting a resource descriptor.
//! - `FETCH` issues each ranged request sequentially, fast-forwarding over
//!   ranges already in the checklist and flushing the checklist after every
//!   success, before the next epoch begins.
//! - `RETRY-DRAIN` re-attempts failed items until the queue empties or the
//!   wall-clock retry budget runs out.
//! - `DONE` persists whatever is still unresolved as the totally-failed list.
//!
//! Fetches are strictly sequential within a run; the only external
//! concurrency is independent runs on different directories.

mod checklist;
mod retry;
mod throughput;

pub use checklist::{Checklist, CHECKLIST_SUFFIX};
pub use retry::{load_failed, write_failed, RetryItem, RetryQueue, FAILED_SUFFIX};
pub use throughput::{RateSample, ThroughputMeter};

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::descriptor::{DescriptorError, ResourceDescriptor};
use crate::parts::{PartsError, PartsIndex};
use crate::range::{fragment_name, range_header, BlockSelector, RangeSlicer};
use crate::transport::{Transport, TransportError};

/// Errors that abort a download run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The HEAD probe could not be completed; nothing was fetched.
    #[error("planning failed for {url}: {reason}")]
    Planning { url: String, reason: String },

    /// Loading the parts index failed.
    #[error(transparent)]
    Parts(#[from] PartsError),

    /// Persisting the resource descriptor failed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Flushing the checklist failed; continuing would break resumability.
    #[error("failed to flush checklist {path}: {source}")]
    ChecklistFlush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the totally-failed list failed.
    #[error("failed to write failed-items file {path}: {source}")]
    FailedList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-run inputs besides the URL.
#[derive(Default)]
pub struct DownloadOptions {
    /// Working directory; defaults to the parts index directory when one is
    /// supplied, else the current directory.
    pub dir: Option<PathBuf>,

    /// Logical resource name; defaults to the URL basename.
    pub name: Option<String>,

    /// Extra request headers.
    pub headers: HashMap<String, String>,

    /// Optional request body.
    pub data: Option<String>,

    /// Restrict the run to previously recorded outstanding spans.
    pub parts: Option<PartsIndex>,

    /// Restrict the run to selected epochs.
    pub selector: Option<BlockSelector>,
}

/// What a finished run hands back to the caller.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// The checklist as of run end.
    pub checklist: Checklist,

    /// Items that never succeeded within the retry budget.
    pub failed: Vec<RetryItem>,
}

/// Sequential ranged-download engine.
pub struct DownloadEngine<T: Transport> {
    transport: T,
    config: EngineConfig,
}

impl<T: Transport> DownloadEngine<T> {
    /// Create an engine over the given transport.
    pub fn new(transport: T, config: EngineConfig) -> Self {
        Self { transport, config }
    }

    /// Run one full transfer attempt.
    pub fn run(&self, url: &str, options: DownloadOptions) -> Result<DownloadOutcome, EngineError> {
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| basename_from_url(url));
        let dir = working_dir(&options);

        // PLAN
        let (boundaries, direct, content_length) = self.plan(url, &options)?;
        let requests = RangeSlicer::to_requests(&boundaries, direct);
        let total = requests.len();
        info!(url, total, direct, content_length, "plan ready");

        let descriptor =
            ResourceDescriptor::new(url, &dir, Some(name.clone()), content_length, direct);
        descriptor.save(&dir)?;

        let mut checklist = Checklist::open(dir.join(format!("{}{}", name, CHECKLIST_SUFFIX)));
        if !checklist.is_empty() {
            info!(entries = checklist.len(), "resuming from existing checklist");
        }
        checklist.flush().map_err(|e| EngineError::ChecklistFlush {
            path: checklist.path().to_path_buf(),
            source: e,
        })?;

        let mut queue = RetryQueue::new();
        let mut meter = ThroughputMeter::new(self.config.report_interval);

        // FETCH
        for (index, (low, high)) in requests.iter().enumerate() {
            let epoch = (index + 1) as u64;
            if let Some(selector) = &options.selector {
                if !selector.contains(epoch) {
                    debug!(epoch, total, "epoch not selected, skipping");
                    continue;
                }
            }

            let range_id = range_header(*low, *high);
            if checklist.contains(&range_id) {
                info!(epoch, total, range = %range_id, "fast-forward: range already fetched");
                continue;
            }

            let mut headers = options.headers.clone();
            headers.insert("Range".to_string(), range_id.clone());
            let fragment_path = dir.join(fragment_name(&name, *low, *high));

            info!(epoch, total, url, fragment = %fragment_path.display(), "fetching range");
            let started = Instant::now();
            let result = self.fetch_one(
                url,
                &headers,
                options.data.as_deref(),
                &fragment_path,
                &mut meter,
            );
            let duration = started.elapsed();

            match result {
                Ok(bytes) => {
                    info!(
                        epoch,
                        total,
                        bytes,
                        secs = duration.as_secs_f64(),
                        "range fetched"
                    );
                    checklist.insert(
                        range_id,
                        fragment_path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    );
                    checklist.flush().map_err(|e| EngineError::ChecklistFlush {
                        path: checklist.path().to_path_buf(),
                        source: e,
                    })?;
                }
                Err(error) => {
                    warn!(epoch, total, %error, "range fetch failed, queued for retry");
                    queue.push(RetryItem {
                        url: url.to_string(),
                        fragment_path: fragment_path.to_string_lossy().into_owned(),
                        headers,
                        data: options.data.clone(),
                        range_id,
                    });
                }
            }
        }

        // RETRY-DRAIN
        self.drain_retries(&mut queue, &mut checklist, &mut meter)?;

        // DONE
        let failed = queue.drain();
        let failed_path = dir.join(format!("{}{}", name, FAILED_SUFFIX));
        write_failed(&failed_path, &failed).map_err(|e| EngineError::FailedList {
            path: failed_path.clone(),
            source: e,
        })?;
        if !failed.is_empty() {
            warn!(
                count = failed.len(),
                path = %failed_path.display(),
                "run finished with unresolved items"
            );
        }

        Ok(DownloadOutcome { checklist, failed })
    }

    /// PLAN: decide boundaries, slicing mode, and content length.
    fn plan(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<(Vec<u64>, bool, u64), EngineError> {
        let probe = self
            .transport
            .probe(url)
            .map_err(|e| EngineError::Planning {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(parts) = &options.parts {
            info!(entries = parts.len(), "direct slicing from parts index");
            let boundaries = parts.boundaries(self.config.unit);
            return Ok((boundaries, true, probe.content_length));
        }

        let slicer = RangeSlicer::new(self.config.unit);
        let boundaries = slicer.plan(
            probe.content_length,
            probe.range_supported,
            !self.config.slicing,
        );
        Ok((boundaries, false, probe.content_length))
    }

    fn drain_retries(
        &self,
        queue: &mut RetryQueue,
        checklist: &mut Checklist,
        meter: &mut ThroughputMeter,
    ) -> Result<(), EngineError> {
        if queue.is_empty() {
            return Ok(());
        }

        info!(pending = queue.len(), "draining retry queue");
        let checkpoint = Instant::now();
        while let Some(item) = queue.pop() {
            // The budget is checked before each item, never mid-item.
            if checkpoint.elapsed() > self.config.retry_budget {
                warn!(pending = queue.len() + 1, "retry budget exhausted");
                queue.push_front(item);
                break;
            }

            let fragment_path = PathBuf::from(&item.fragment_path);
            match self.fetch_one(
                &item.url,
                &item.headers,
                item.data.as_deref(),
                &fragment_path,
                meter,
            ) {
                Ok(bytes) => {
                    info!(range = %item.range_id, bytes, "retry succeeded");
                    checklist.insert(
                        item.range_id,
                        fragment_path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    );
                    checklist.flush().map_err(|e| EngineError::ChecklistFlush {
                        path: checklist.path().to_path_buf(),
                        source: e,
                    })?;
                }
                Err(error) => {
                    debug!(range = %item.range_id, %error, "retry failed, requeued");
                    queue.push(item);
                }
            }
        }
        Ok(())
    }

    /// Stream one ranged request into a buffer, then write the fragment.
    fn fetch_one(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        data: Option<&str>,
        dest: &Path,
        meter: &mut ThroughputMeter,
    ) -> Result<u64, TransportError> {
        let mut body = self.transport.fetch(url, headers, data)?;

        let mut buffer = Vec::new();
        let mut chunk = vec![0u8; self.config.buffer_size];
        let mut chunk_started = Instant::now();
        loop {
            let read = body.read(&mut chunk).map_err(|e| classify_read(url, e))?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);

            let now = Instant::now();
            if let Some(sample) = meter.record(read as u64, now - chunk_started) {
                debug!(kb_per_sec = sample.kb_per_sec(), "throughput");
            }
            chunk_started = now;
        }

        fs::write(dest, &buffer).map_err(|e| TransportError::Io {
            url: url.to_string(),
            reason: format!("failed to save {}: {}", dest.display(), e),
        })?;
        Ok(buffer.len() as u64)
    }
}

fn classify_read(url: &str, error: io::Error) -> TransportError {
    if error.kind() == io::ErrorKind::TimedOut {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Io {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

/// User-specified name wins; otherwise the URL basename.
fn basename_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Anchor the run: explicit directory, else the parts index location, else
/// the current directory.
fn working_dir(options: &DownloadOptions) -> PathBuf {
    if let Some(dir) = &options.dir {
        if dir.is_dir() {
            return dir.clone();
        }
    }
    if let Some(parts) = &options.parts {
        if parts.dir().is_dir() {
            return parts.dir().to_path_buf();
        }
    }
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::transport::tests::MockTransport;
    use std::time::Duration;
    use tempfile::TempDir;

    fn engine(transport: MockTransport, unit: u64) -> DownloadEngine<MockTransport> {
        let config = EngineConfig::new()
            .with_unit(unit)
            .with_retry_budget(Duration::from_secs(5));
        DownloadEngine::new(transport, config)
    }

    fn options(dir: &TempDir) -> DownloadOptions {
        DownloadOptions {
            dir: Some(dir.path().to_path_buf()),
            name: Some("archive.bin".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_run_writes_all_fragments() {
        let temp = TempDir::new().unwrap();
        let body: Vec<u8> = (0..100u32).map(|i| (i % 251) as u8).collect();
        let engine = engine(MockTransport::new(body.clone(), true), 30);

        let outcome = engine
            .run("http://example.com/archive.bin", options(&temp))
            .unwrap();

        assert!(outcome.failed.is_empty());
        // Boundaries 0,30,60,90,100 -> four requests.
        assert_eq!(outcome.checklist.len(), 4);
        assert!(outcome.checklist.contains("bytes=0-30"));
        assert!(outcome.checklist.contains("bytes=91-100"));
        assert!(temp.path().join("archive.bin@bytes=0-30").exists());
        assert!(temp.path().join("archive.bin@bytes=91-100").exists());
        assert!(temp.path().join("archive.bin.ok").exists());
        assert!(temp.path().join("archive.bin.failed").exists());
        assert!(temp.path().join(".dmeta").exists());
    }

    #[test]
    fn test_range_incapable_server_single_request() {
        let temp = TempDir::new().unwrap();
        let engine = engine(MockTransport::new(vec![7u8; 500], false), 100);

        let outcome = engine
            .run("http://example.com/name", options_named(&temp, "name"))
            .unwrap();

        assert_eq!(outcome.checklist.len(), 1);
        assert!(outcome.checklist.contains("bytes=0-500"));
        assert!(temp.path().join("name@bytes=0-500").exists());
    }

    fn options_named(dir: &TempDir, name: &str) -> DownloadOptions {
        DownloadOptions {
            dir: Some(dir.path().to_path_buf()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fast_forward_skips_completed_ranges() {
        let temp = TempDir::new().unwrap();
        let body = vec![1u8; 100];

        let engine1 = engine(MockTransport::new(body.clone(), true), 50);
        engine1
            .run("http://example.com/archive.bin", options(&temp))
            .unwrap();

        // A second run against the same directory only fast-forwards; a
        // transport that fails every range proves nothing is re-fetched.
        let failing = MockTransport::new(body, true)
            .fail_range("bytes=0-50", 99)
            .fail_range("bytes=51-100", 99);
        let engine2 = engine(failing, 50);
        let outcome = engine2
            .run("http://example.com/archive.bin", options(&temp))
            .unwrap();

        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.checklist.len(), 2);
    }

    #[test]
    fn test_selector_skips_epochs_without_retry_entries() {
        let temp = TempDir::new().unwrap();
        let engine = engine(MockTransport::new(vec![2u8; 100], true), 25);

        let mut opts = options(&temp);
        opts.selector = Some(BlockSelector::parse("1:3").unwrap());
        let outcome = engine
            .run("http://example.com/archive.bin", opts)
            .unwrap();

        // Epochs 2, 4, and 5 are skipped entirely: no fetch, no retry entry.
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.checklist.len(), 2);
        assert!(outcome.checklist.contains("bytes=0-25"));
        assert!(outcome.checklist.contains("bytes=51-75"));
        assert!(!temp.path().join("archive.bin@bytes=26-50").exists());
    }

    #[test]
    fn test_failed_range_retried_until_success() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new(vec![3u8; 100], true).fail_range("bytes=0-50", 2);
        let engine = engine(transport, 50);

        let outcome = engine
            .run("http://example.com/archive.bin", options(&temp))
            .unwrap();

        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.checklist.len(), 2);
        assert!(temp.path().join("archive.bin@bytes=0-50").exists());
    }

    #[test]
    fn test_exhausted_budget_persists_failed_items() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new(vec![4u8; 100], true).fail_range("bytes=0-50", 10_000);
        let config = EngineConfig::new()
            .with_unit(50)
            .with_retry_budget(Duration::ZERO);
        let engine = DownloadEngine::new(transport, config);

        let outcome = engine
            .run("http://example.com/archive.bin", options(&temp))
            .unwrap();

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].range_id, "bytes=0-50");
        let persisted = load_failed(&temp.path().join("archive.bin.failed")).unwrap();
        assert_eq!(persisted, outcome.failed);
        // The other range still succeeded.
        assert!(outcome.checklist.contains("bytes=51-100"));
    }

    #[test]
    fn test_unusable_probe_is_planning_failure() {
        let temp = TempDir::new().unwrap();
        let mut transport = MockTransport::new(vec![], true);
        transport.probe_error = Some(TransportError::Unclassified {
            url: "http://example.com/x".to_string(),
            reason: "connection refused".to_string(),
        });
        let engine = engine(transport, 50);

        let result = engine.run("http://example.com/x", options(&temp));
        assert!(matches!(result, Err(EngineError::Planning { .. })));
        // Fatal before any fetch: no descriptor, no checklist.
        assert!(!temp.path().join(".dmeta").exists());
    }

    #[test]
    fn test_parts_guided_run_fetches_only_outstanding_spans() {
        let temp = TempDir::new().unwrap();
        let body: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
        let engine = engine(MockTransport::new(body.clone(), true), 1_000);

        let mut opts = options(&temp);
        opts.parts = Some(PartsIndex::from_ranges(
            vec!["50-99".to_string(), "150-199".to_string()],
            temp.path().to_path_buf(),
        ));
        let outcome = engine
            .run("http://example.com/archive.bin", opts)
            .unwrap();

        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.checklist.len(), 2);
        assert!(outcome.checklist.contains("bytes=50-99"));
        assert!(outcome.checklist.contains("bytes=150-199"));

        let fragment = fs::read(temp.path().join("archive.bin@bytes=50-99")).unwrap();
        assert_eq!(fragment, body[50..=99].to_vec());
        let descriptor = ResourceDescriptor::load(temp.path()).unwrap();
        assert!(descriptor.dparts);
        assert_eq!(descriptor.content_length, 200);
    }

    #[test]
    fn test_fragment_bytes_match_requested_span() {
        let temp = TempDir::new().unwrap();
        let body: Vec<u8> = (0..100u32).map(|i| i as u8).collect();
        let engine = engine(MockTransport::new(body.clone(), true), 40);

        engine
            .run("http://example.com/archive.bin", options(&temp))
            .unwrap();

        // Non-first fragments start one byte past the previous boundary.
        let fragment = fs::read(temp.path().join("archive.bin@bytes=41-80")).unwrap();
        assert_eq!(fragment, body[41..=80].to_vec());
    }
}
