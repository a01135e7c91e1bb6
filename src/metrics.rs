//! Per-operation latency collection
//!
//! One HDR histogram per case. Workers report raw per-operation
//! latencies in microseconds; the parent folds them in here.

use anyhow::{Context, Result};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest trackable latency: one hour in microseconds
const MAX_TRACKABLE_US: u64 = 3_600_000_000;

#[derive(Debug, Clone)]
pub struct OpHistogram {
    hist: Histogram<u64>,
}

impl OpHistogram {
    pub fn new() -> Result<Self> {
        let hist = Histogram::<u64>::new_with_bounds(1, MAX_TRACKABLE_US, 3)
            .context("failed to allocate latency histogram")?;
        Ok(Self { hist })
    }

    pub fn record(&mut self, duration: Duration) {
        self.record_micros(duration.as_micros() as u64);
    }

    /// Values outside the trackable range are clamped
    pub fn record_micros(&mut self, micros: u64) {
        let _ = self.hist.record(micros.clamp(1, MAX_TRACKABLE_US));
    }

    pub fn len(&self) -> u64 {
        self.hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    pub fn summary(&self) -> LatencySummary {
        if self.hist.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            count: self.hist.len(),
            mean_us: self.hist.mean(),
            p50_us: self.hist.value_at_quantile(0.50),
            p95_us: self.hist.value_at_quantile(0.95),
            p99_us: self.hist.value_at_quantile(0.99),
            max_us: self.hist.max(),
        }
    }
}

/// Latency distribution of single operations (one file read, one listing...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencySummary {
    pub fn print(&self, op: &str) {
        if self.count == 0 {
            return;
        }
        println!(
            "  {} latency (µs): count={:<8} mean={:<8.0} p50={:<8} p95={:<8} p99={:<8} max={:<8}",
            op, self.count, self.mean_us, self.p50_us, self.p95_us, self.p99_us, self.max_us
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_summary() {
        let mut hist = OpHistogram::new().unwrap();
        assert_eq!(hist.summary(), LatencySummary::default());

        hist.record(Duration::from_micros(100));
        hist.record(Duration::from_micros(200));
        hist.record_micros(0);

        assert_eq!(hist.len(), 3);
        let s = hist.summary();
        assert_eq!(s.count, 3);
        assert!(s.max_us >= 199 && s.max_us <= 201);
    }
}
