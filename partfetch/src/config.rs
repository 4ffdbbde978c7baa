//! Configuration for a download run.

use std::time::Duration;

/// One kibibyte.
pub const KB: u64 = 1 << 10;

/// One mebibyte.
pub const MB: u64 = 1 << 20;

/// Default maximum size of one requested byte span.
pub const DEFAULT_UNIT: u64 = 6 * MB;

/// Default per-request timeout.
///
/// Sized so that a full unit transferring at 5 KB/s still completes:
/// 6 MiB / 5 KiB per second, plus one second of slack.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1229);

/// Default wall-clock budget for the retry-drain loop.
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(3600);

/// Minimum interval between two throughput report emissions.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Buffer size for reading response bodies (64KB).
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for the download engine and the reconciler.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum byte size of one requested span.
    pub unit: u64,

    /// Whether to slice range-capable resources at all.
    ///
    /// When disabled, every transfer is a single whole-resource request.
    pub slicing: bool,

    /// Timeout applied to every HTTP request.
    pub timeout: Duration,

    /// Wall-clock budget for draining the retry queue.
    pub retry_budget: Duration,

    /// Minimum interval between throughput report emissions.
    pub report_interval: Duration,

    /// Buffer size used when streaming response bodies.
    pub buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unit: DEFAULT_UNIT,
            slicing: true,
            timeout: DEFAULT_TIMEOUT,
            retry_budget: DEFAULT_RETRY_BUDGET,
            report_interval: REPORT_INTERVAL,
            buffer_size: STREAM_BUFFER_SIZE,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unit size.
    pub fn with_unit(mut self, unit: u64) -> Self {
        self.unit = unit;
        self
    }

    /// Enable or disable slicing.
    pub fn with_slicing(mut self, slicing: bool) -> Self {
        self.slicing = slicing;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry wall-clock budget.
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Set the throughput report interval.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.unit, 6 * MB);
        assert!(config.slicing);
        assert_eq!(config.timeout.as_secs(), 1229);
        assert_eq!(config.retry_budget.as_secs(), 3600);
        assert_eq!(config.report_interval.as_millis(), 500);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_unit(MB)
            .with_slicing(false)
            .with_retry_budget(Duration::from_secs(60));

        assert_eq!(config.unit, MB);
        assert!(!config.slicing);
        assert_eq!(config.retry_budget.as_secs(), 60);
    }
}
