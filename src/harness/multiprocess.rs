// src/harness/multiprocess.rs
//
// Multi-process rounds: each child is `<exe> internal-worker`, gets its
// slice of work as JSON on stdin and answers with one JSON line on stdout.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Instant;
use tokio::runtime::Builder as RtBuilder;
use tracing::{debug, info, warn};

use super::ops::{payload_for, perform_concurrent, WorkUnit};
use crate::store::open_store;

/// What one child process runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub store_uri: String,
    pub threads: usize,
    pub units: Vec<WorkUnit>,
}

/// What one child process reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Child-side wall clock, informational; rounds are timed by the parent
    pub elapsed_secs: f64,
    pub latencies_us: Vec<u64>,
    /// Payload bytes moved by all units of this worker
    #[serde(default)]
    pub bytes: u64,
}

/// Everything the workers of one round reported, merged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutput {
    pub latencies_us: Vec<u64>,
    pub bytes: u64,
}

/// Split `units` into `parts` contiguous slices; earlier slices take the remainder
pub fn split_units(units: Vec<WorkUnit>, parts: usize) -> Vec<Vec<WorkUnit>> {
    let parts = parts.max(1);
    let base = units.len() / parts;
    let remainder = units.len() % parts;
    let mut iter = units.into_iter();
    (0..parts)
        .map(|i| {
            let take = base + usize::from(i < remainder);
            iter.by_ref().take(take).collect()
        })
        .collect()
}

/// Spawn one child per slice, wait for all of them and merge their latencies.
/// The caller times the whole call.
pub fn run_round(exe: &Path, store_uri: &str, threads: usize, slices: Vec<Vec<WorkUnit>>) -> Result<RoundOutput> {
    let mut children: Vec<(usize, Child)> = Vec::with_capacity(slices.len());

    for (worker_id, units) in slices.into_iter().enumerate() {
        let task = WorkerTask {
            store_uri: store_uri.to_string(),
            threads,
            units,
        };
        match spawn_worker(exe, worker_id, &task) {
            Ok(child) => children.push((worker_id, child)),
            Err(e) => {
                reap(children);
                return Err(e);
            }
        }
    }
    debug!("Spawned {} worker processes", children.len());

    let mut output = RoundOutput::default();
    let mut failures = Vec::new();
    for (worker_id, mut child) in children {
        match collect_report(worker_id, &mut child) {
            Ok(report) => {
                output.latencies_us.extend(report.latencies_us);
                output.bytes += report.bytes;
            }
            Err(e) => failures.push(format!("{:#}", e)),
        }
    }
    if !failures.is_empty() {
        bail!("{} worker process(es) failed: {}", failures.len(), failures.join("; "));
    }
    Ok(output)
}

/// Start `<exe> internal-worker` and hand it `task` on stdin
fn spawn_worker(exe: &Path, worker_id: usize, task: &WorkerTask) -> Result<Child> {
    let task_json = serde_json::to_string(task).context("Failed to serialize worker task")?;

    let mut child = Command::new(exe)
        .arg("internal-worker")
        .arg("--worker-id")
        .arg(worker_id.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("Failed to spawn worker process {}", worker_id))?;

    if let Some(mut stdin) = child.stdin.take() {
        // Dropping stdin closes it so the worker sees EOF
        if let Err(e) = stdin.write_all(task_json.as_bytes()) {
            reap(vec![(worker_id, child)]);
            return Err(e).context("Failed to write task to worker stdin");
        }
    }
    Ok(child)
}

/// Kill and wait for workers of an abandoned round so none outlive it
fn reap(children: Vec<(usize, Child)>) {
    for (worker_id, mut child) in children {
        if let Err(e) = child.kill() {
            debug!("Worker {} already gone: {}", worker_id, e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to wait for worker {}: {}", worker_id, e);
        }
    }
}

fn collect_report(worker_id: usize, child: &mut Child) -> Result<WorkerReport> {
    let stdout = child.stdout.take().context("Failed to capture worker stdout")?;
    let mut json_line = String::new();
    for line in BufReader::new(stdout).lines() {
        let line = line.context("Failed to read from worker stdout")?;
        if line.starts_with('{') {
            json_line = line;
            break;
        }
    }

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for worker {}", worker_id))?;
    if !status.success() {
        bail!("worker {} exited with status {:?}", worker_id, status.code());
    }
    if json_line.is_empty() {
        bail!("worker {} produced no JSON output", worker_id);
    }
    serde_json::from_str(&json_line).with_context(|| format!("Failed to parse JSON from worker {}", worker_id))
}

/// Child side: run the task read from stdin and print the report
pub fn run_internal_worker(worker_id: usize, task_json: &str) -> Result<()> {
    let task: WorkerTask = serde_json::from_str(task_json).context("Failed to parse worker task")?;
    let store = open_store(&task.store_uri)?;
    let rt = RtBuilder::new_multi_thread()
        .worker_threads(task.threads.max(1))
        .enable_all()
        .build()
        .context("Failed to create worker runtime")?;

    let payload = payload_for(&task.units);
    let start = Instant::now();
    let done = rt.block_on(perform_concurrent(store, &task.units, &payload, task.threads))?;
    let report = WorkerReport {
        worker_id,
        elapsed_secs: start.elapsed().as_secs_f64(),
        latencies_us: done.iter().map(|c| c.latency.as_micros() as u64).collect(),
        bytes: done.iter().map(|c| c.bytes).sum(),
    };
    info!(
        "Worker {} finished {} units ({} bytes) in {:.3}s",
        worker_id,
        task.units.len(),
        report.bytes,
        report.elapsed_secs
    );

    let json = serde_json::to_string(&report).context("Failed to serialize worker report")?;
    println!("{}", json);
    Ok(())
}
