// src/report/raw.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::harness::monitor::ResourcePeaks;
use crate::harness::ExecutionMode;
use crate::metrics::LatencySummary;
use crate::params::{BenchmarkCase, Group};

/// Everything measured for one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub name: String,
    pub group: Group,
    pub mode: ExecutionMode,
    /// Echo of the parameters the case ran with
    pub params: BenchmarkCase,
    pub started_at: String,
    /// Wall clock of every round, in seconds
    pub round_durations_s: Vec<f64>,
    /// Payload bytes moved in every round
    #[serde(default)]
    pub round_bytes: Vec<u64>,
    pub latency: LatencySummary,
    pub resources: ResourcePeaks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCase {
    pub name: String,
    pub error: String,
}

/// Contents of `results.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResults {
    pub results: Vec<RawResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedCase>,
}

impl RawResults {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse raw results {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize raw results")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}
