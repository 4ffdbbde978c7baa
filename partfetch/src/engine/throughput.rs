//! Interval-gated throughput accounting.
//!
//! The meter accumulates bytes and elapsed transfer time per chunk and hands
//! back one aggregated sample only when the report interval has passed since
//! the previous emission. Reporting frequency is therefore bounded no matter
//! how small individual network chunks are.

use std::time::{Duration, Instant};

/// One aggregated throughput sample.
#[derive(Debug, Clone, Copy)]
pub struct RateSample {
    /// Bytes transferred since the previous emission.
    pub bytes: u64,

    /// Transfer time accumulated since the previous emission.
    pub elapsed: Duration,
}

impl RateSample {
    /// Aggregated rate in kilobytes per second.
    pub fn kb_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs / 1000.0
    }
}

/// Per-run throughput accumulator.
///
/// Held by the run that owns it; never process-wide state.
#[derive(Debug)]
pub struct ThroughputMeter {
    interval: Duration,
    last_emit: Option<Instant>,
    bytes: u64,
    elapsed: Duration,
}

impl ThroughputMeter {
    /// Create a meter emitting at most once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Record one transferred chunk.
    ///
    /// Returns a sample when the interval has elapsed since the previous
    /// emission; both counters reset to zero afterward. The first call only
    /// arms the emission window.
    pub fn record(&mut self, bytes: u64, elapsed: Duration) -> Option<RateSample> {
        let now = Instant::now();
        let last = match self.last_emit {
            Some(last) => last,
            None => {
                self.last_emit = Some(now);
                self.bytes = bytes;
                self.elapsed = elapsed;
                return None;
            }
        };

        self.bytes += bytes;
        self.elapsed += elapsed;

        if now.duration_since(last) < self.interval {
            return None;
        }

        let sample = RateSample {
            bytes: self.bytes,
            elapsed: self.elapsed,
        };
        self.bytes = 0;
        self.elapsed = Duration::ZERO;
        self.last_emit = Some(now);
        Some(sample)
    }

    /// Clear all accumulated state, disarming the emission window.
    pub fn reset(&mut self) {
        self.last_emit = None;
        self.bytes = 0;
        self.elapsed = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_record_arms_window() {
        let mut meter = ThroughputMeter::new(Duration::from_millis(500));
        assert!(meter.record(100, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_emission_respects_interval() {
        let mut meter = ThroughputMeter::new(Duration::from_millis(20));

        assert!(meter.record(100, Duration::from_millis(1)).is_none());
        // Immediately after arming, still inside the window.
        assert!(meter.record(100, Duration::from_millis(1)).is_none());

        std::thread::sleep(Duration::from_millis(25));
        let sample = meter.record(100, Duration::from_millis(1)).unwrap();
        assert_eq!(sample.bytes, 300);

        // Counters reset after emission.
        assert!(meter.record(50, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_reset_disarms_window() {
        let mut meter = ThroughputMeter::new(Duration::from_millis(20));
        meter.record(100, Duration::from_millis(1));
        meter.reset();

        std::thread::sleep(Duration::from_millis(25));
        // The window was disarmed, so this call arms it again instead of
        // emitting.
        assert!(meter.record(100, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_rate_sample_kb_per_sec() {
        let sample = RateSample {
            bytes: 500_000,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(sample.kb_per_sec(), 500.0);

        let zero = RateSample {
            bytes: 100,
            elapsed: Duration::ZERO,
        };
        assert_eq!(zero.kb_per_sec(), 0.0);
    }
}
