//! Run directory management
//!
//! Every `run` gets `<results-root>/__run__/<ddmmyyyy-HHMMSS>/` holding:
//! - results.json (raw results)
//! - results.csv (derived table)
//! - metadata.json (run metadata)

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{write_csv, RawResults, ResultRecord};
use crate::constants::RUNS_DIR_NAME;

/// Metadata about a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub group: String,
    pub scenarios: Vec<String>,
    pub buckets: Vec<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_secs: Option<f64>,
    pub command_line: Vec<String>,
    pub hostname: String,
    pub cases_total: usize,
    pub cases_failed: usize,
}

impl RunMetadata {
    pub fn new(group: String, scenarios: Vec<String>, buckets: Vec<String>) -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| "unknown".into())
            .to_string_lossy()
            .to_string();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            group,
            scenarios,
            buckets,
            start_time: Local::now().to_rfc3339(),
            end_time: None,
            duration_secs: None,
            command_line: std::env::args().collect(),
            hostname,
            cases_total: 0,
            cases_failed: 0,
        }
    }

    pub fn finalize(&mut self, duration_secs: f64, cases_total: usize, cases_failed: usize) {
        self.end_time = Some(Local::now().to_rfc3339());
        self.duration_secs = Some(duration_secs);
        self.cases_total = cases_total;
        self.cases_failed = cases_failed;
    }
}

pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Create `<root>/__run__/<ddmmyyyy-HHMMSS>/`
    pub fn create(root: &Path) -> Result<Self> {
        let stamp = Local::now().format("%d%m%Y-%H%M%S").to_string();
        let path = root.join(RUNS_DIR_NAME).join(stamp);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create results directory: {}", path.display()))?;
        tracing::info!("Created results directory: {}", path.display());
        Ok(Self { path })
    }

    /// Wrap an existing directory, e.g. to re-render a report into it
    pub fn open(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw_path(&self) -> PathBuf {
        self.path.join("results.json")
    }

    pub fn csv_path(&self) -> PathBuf {
        self.path.join("results.csv")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join("metadata.json")
    }

    /// Write results.json and results.csv; returns the derived records
    pub fn write_results(&self, raw: &RawResults) -> Result<Vec<ResultRecord>> {
        raw.save(&self.raw_path())?;
        let records: Vec<ResultRecord> = raw.results.iter().filter_map(ResultRecord::derive).collect();
        write_csv(&records, &self.csv_path())?;
        Ok(records)
    }

    pub fn write_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
        fs::write(self.metadata_path(), json).context("Failed to write metadata.json")?;
        Ok(())
    }
}
