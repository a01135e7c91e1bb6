// src/report/table.rs
//
// Flat per-case records derived from raw results: CSV file plus the
// table printed at the end of a run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::RawResult;
use crate::constants::MB;
use crate::harness::ExecutionMode;
use crate::params::Group;
use crate::stats::DurationStats;
use crate::target::TargetClass;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub group: Group,
    pub mode: ExecutionMode,
    pub bucket_name: String,
    pub target_class: TargetClass,
    pub pattern: String,
    pub files: usize,
    pub threads: usize,
    pub processes: usize,
    pub rounds: usize,
    pub depth: Option<u32>,
    pub folders: Option<u32>,
    pub file_size: Option<u64>,
    pub chunk_size: Option<u64>,
    pub block_size: Option<u64>,
    /// Seconds every round ran for, on runtime-bounded cases
    pub runtime: Option<u64>,
    pub stats: DurationStats,
    /// Best round: all bytes of the case moved in the fastest round, or the
    /// most bytes moved in one round over the runtime of a bounded case
    pub max_throughput_mb_s: Option<f64>,
    pub cpu_max: f64,
    pub mem_max: u64,
}

impl ResultRecord {
    /// `None` when the result holds no rounds
    pub fn derive(raw: &RawResult) -> Option<Self> {
        let stats = DurationStats::from_samples(&raw.round_durations_s)?;
        let case = &raw.params;
        let base = case.base();
        let listing = case.listing();
        let file_size = case.file_size_bytes();

        let runtime = case.runtime_secs();

        let max_throughput_mb_s = match (runtime, file_size) {
            (Some(secs), _) if secs > 0 => raw
                .round_bytes
                .iter()
                .max()
                .map(|&bytes| bytes as f64 / secs as f64 / MB as f64),
            (None, Some(size)) if stats.min > 0.0 => Some(size as f64 * base.files as f64 / stats.min / MB as f64),
            _ => None,
        };

        Some(Self {
            name: raw.name.clone(),
            group: raw.group,
            mode: raw.mode,
            bucket_name: base.bucket_name.clone(),
            target_class: base.target_class,
            pattern: case.pattern_label(),
            files: base.files,
            threads: base.threads,
            processes: base.processes,
            rounds: raw.round_durations_s.len(),
            depth: listing.map(|l| l.depth),
            folders: listing.map(|l| l.folders),
            file_size,
            chunk_size: case.io().map(|io| io.chunk_size_bytes),
            block_size: case.read().map(|r| r.block_size_bytes),
            runtime,
            stats,
            max_throughput_mb_s,
            cpu_max: raw.resources.max_cpu_percent,
            mem_max: raw.resources.max_mem_bytes,
        })
    }

    fn csv_row(&self) -> Vec<String> {
        let s = &self.stats;
        vec![
            self.name.clone(),
            self.group.to_string(),
            self.mode.to_string(),
            self.bucket_name.clone(),
            self.target_class.to_string(),
            self.pattern.clone(),
            self.files.to_string(),
            self.threads.to_string(),
            self.processes.to_string(),
            self.rounds.to_string(),
            or_na(self.depth),
            or_na(self.folders),
            or_na(self.file_size),
            or_na(self.chunk_size),
            or_na(self.block_size),
            s.min.to_string(),
            s.max.to_string(),
            s.mean.to_string(),
            s.median.to_string(),
            s.stddev.to_string(),
            s.p90.to_string(),
            s.p95.to_string(),
            s.p99.to_string(),
            or_na(self.max_throughput_mb_s),
            format!("{:.2}", self.cpu_max),
            self.mem_max.to_string(),
            or_na(self.runtime),
        ]
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.target_class.to_string(),
            self.group.to_string(),
            self.pattern.clone(),
            self.files.to_string(),
            self.threads.to_string(),
            self.processes.to_string(),
            or_na(self.depth),
            mb(self.file_size),
            mb(self.chunk_size),
            mb(self.block_size),
            format!("{:.4}", self.stats.min),
            format!("{:.4}", self.stats.mean),
            self.max_throughput_mb_s
                .map(|t| format!("{:.2}", t))
                .unwrap_or_else(|| "N/A".to_string()),
            format!("{:.2}", self.cpu_max),
            format!("{:.2}", self.mem_max as f64 / MB as f64),
        ]
    }
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn mb(bytes: Option<u64>) -> String {
    bytes
        .map(|b| format!("{:.2}", b as f64 / MB as f64))
        .unwrap_or_else(|| "N/A".to_string())
}

pub const CSV_HEADERS: [&str; 27] = [
    "name",
    "group",
    "mode",
    "bucket_name",
    "bucket_type",
    "pattern",
    "files",
    "threads",
    "processes",
    "rounds",
    "depth",
    "folders",
    "file_size",
    "chunk_size",
    "block_size",
    "min",
    "max",
    "mean",
    "median",
    "stddev",
    "p90",
    "p95",
    "p99",
    "max_throughput_mb_s",
    "cpu_max",
    "mem_max",
    "runtime",
];

const TABLE_HEADERS: [&str; 15] = [
    "Bucket Type",
    "Group",
    "Pattern",
    "Files",
    "Threads",
    "Processes",
    "Depth",
    "File Size (MB)",
    "Chunk Size (MB)",
    "Block Size (MB)",
    "Min Latency (s)",
    "Mean Latency (s)",
    "Max Throughput(MB/s)",
    "Max CPU (%)",
    "Max Memory (MB)",
];

pub fn write_csv(records: &[ResultRecord], path: &Path) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(CSV_HEADERS)?;
    for record in records {
        wtr.write_record(record.csv_row())?;
    }
    wtr.flush().context("Failed to flush CSV report")?;
    Ok(())
}

/// Boxed text table, one line per record
pub fn render_table(records: &[ResultRecord]) -> String {
    let rows: Vec<Vec<String>> = records.iter().map(ResultRecord::table_row).collect();
    let mut widths: Vec<usize> = TABLE_HEADERS.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let border = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{}+\n", border);
    let line = |cells: Vec<&str>| {
        let inner = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!(" {:>w$} ", c, w = w))
            .collect::<Vec<_>>()
            .join("|");
        format!("|{}|\n", inner)
    };

    let mut out = border.clone();
    out.push_str(&line(TABLE_HEADERS.to_vec()));
    out.push_str(&border);
    for row in &rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out.push_str(&border);
    out
}
