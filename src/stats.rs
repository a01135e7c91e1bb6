// src/stats.rs
//! Summary statistics over per-round durations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for a single round
    pub stddev: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl DurationStats {
    /// `None` for an empty slice
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let stddev = if sorted.len() > 1 {
            (sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            median: percentile(&sorted, 50.0),
            stddev,
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }
}

/// Linear interpolation between closest ranks; `sorted` must be ascending
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&sorted, 50.0), 2.5));
        assert!(close(percentile(&sorted, 90.0), 3.7));
        assert!(close(percentile(&sorted, 100.0), 4.0));
    }

    #[test]
    fn test_stats_of_rounds() {
        let stats = DurationStats::from_samples(&[3.0, 1.0, 2.0]).unwrap();
        assert!(close(stats.min, 1.0));
        assert!(close(stats.max, 3.0));
        assert!(close(stats.mean, 2.0));
        assert!(close(stats.median, 2.0));
        assert!(close(stats.stddev, 1.0));
        assert!(close(stats.p99, 2.98));
    }

    #[test]
    fn test_single_round() {
        let stats = DurationStats::from_samples(&[0.5]).unwrap();
        assert!(close(stats.stddev, 0.0));
        assert!(close(stats.p90, 0.5));
        assert!(DurationStats::from_samples(&[]).is_none());
    }
}
