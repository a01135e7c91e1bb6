// src/harness/ops.rs
//
// The measured operations. One `WorkUnit` is what a single worker thread
// does once per round: read a whole file, write one, list a prefix, or keep
// reading or writing until a deadline.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::params::ReadPattern;
use crate::store::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkUnit {
    /// Whole file front to back in `block_size` reads
    SeqRead { path: String, block_size: u64 },
    /// Every block of the file once, in shuffled order
    RandRead { path: String, block_size: u64, file_size: u64 },
    /// A new object of `file_size` bytes in `chunk_size` writes
    Write { path: String, file_size: u64, chunk_size: u64 },
    List { prefix: String },
    Find { prefix: String },
    Delete { prefix: String },
    Rename { from: String, to: String },
    /// Cycle over `paths` until `runtime_ms` has passed since the unit started
    TimedRead {
        paths: Vec<String>,
        pattern: ReadPattern,
        block_size: u64,
        file_size: u64,
        runtime_ms: u64,
    },
    /// Append `chunk_size` writes to one object until `runtime_ms` has passed
    TimedWrite { path: String, chunk_size: u64, runtime_ms: u64 },
}

/// Outcome of one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completed {
    pub latency: Duration,
    /// Payload bytes read or written; 0 for metadata operations
    pub bytes: u64,
}

impl WorkUnit {
    pub fn label(&self) -> &'static str {
        match self {
            WorkUnit::SeqRead { .. } => "SEQ_READ",
            WorkUnit::RandRead { .. } => "RAND_READ",
            WorkUnit::Write { .. } => "WRITE",
            WorkUnit::List { .. } => "LIST",
            WorkUnit::Find { .. } => "FIND",
            WorkUnit::Delete { .. } => "DELETE",
            WorkUnit::Rename { .. } => "RENAME",
            WorkUnit::TimedRead { .. } => "TIMED_READ",
            WorkUnit::TimedWrite { .. } => "TIMED_WRITE",
        }
    }

    fn target(&self) -> &str {
        match self {
            WorkUnit::SeqRead { path, .. }
            | WorkUnit::RandRead { path, .. }
            | WorkUnit::Write { path, .. }
            | WorkUnit::TimedWrite { path, .. } => path,
            WorkUnit::List { prefix } | WorkUnit::Find { prefix } | WorkUnit::Delete { prefix } => prefix,
            WorkUnit::Rename { from, .. } => from,
            WorkUnit::TimedRead { paths, .. } => paths.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Bytes one `write` call of this unit needs from the shared payload
    fn write_chunk(&self) -> Option<u64> {
        match self {
            WorkUnit::Write { chunk_size, file_size, .. } => Some((*chunk_size).min(*file_size)),
            WorkUnit::TimedWrite { chunk_size, .. } => Some(*chunk_size),
            _ => None,
        }
    }
}

/// Random payload for write units, generated once before timing starts.
/// Empty when no unit writes.
pub fn payload_for(units: &[WorkUnit]) -> Bytes {
    let chunk = units.iter().filter_map(WorkUnit::write_chunk).max().unwrap_or(0);
    random_bytes(chunk as usize)
}

pub fn random_bytes(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    rand::rng().fill(&mut buf[..]);
    Bytes::from(buf)
}

fn payload_chunk(payload: &Bytes, len: u64) -> Result<Bytes> {
    if (payload.len() as u64) < len {
        bail!("write payload of {} bytes is smaller than chunk size {}", payload.len(), len);
    }
    Ok(payload.slice(..len as usize))
}

/// Block offsets of a file in shuffled order
fn shuffled_offsets(file_size: u64, block_size: u64) -> Vec<u64> {
    let mut offsets: Vec<u64> = (0..file_size).step_by(block_size.max(1) as usize).collect();
    offsets.shuffle(&mut rand::rng());
    offsets
}

/// Read `paths` over and over until `deadline`; returns the bytes read
async fn read_until(
    store: &dyn ObjectStore,
    paths: &[String],
    pattern: ReadPattern,
    block_size: u64,
    file_size: u64,
    deadline: Instant,
) -> Result<u64> {
    let mut total = 0u64;
    if paths.is_empty() {
        return Ok(total);
    }
    let offsets = shuffled_offsets(file_size, block_size);
    for path in paths.iter().cycle() {
        if Instant::now() >= deadline {
            break;
        }
        match pattern {
            ReadPattern::Seq => {
                let mut offset = 0u64;
                while Instant::now() < deadline {
                    let got = store.read_range(path, offset, block_size).await?.len() as u64;
                    offset += got;
                    total += got;
                    if got < block_size {
                        break;
                    }
                }
            }
            ReadPattern::Rand => {
                for &offset in &offsets {
                    if Instant::now() >= deadline {
                        break;
                    }
                    total += store.read_range(path, offset, block_size).await?.len() as u64;
                }
            }
        }
    }
    Ok(total)
}

/// Run one unit and return its latency and the bytes it moved
pub async fn perform(store: &dyn ObjectStore, unit: &WorkUnit, payload: &Bytes) -> Result<Completed> {
    let start = Instant::now();
    let mut bytes = 0u64;
    match unit {
        WorkUnit::SeqRead { path, block_size } => {
            let mut offset = 0u64;
            loop {
                let got = store.read_range(path, offset, *block_size).await?;
                offset += got.len() as u64;
                if (got.len() as u64) < *block_size {
                    break;
                }
            }
            bytes = offset;
        }
        WorkUnit::RandRead { path, block_size, file_size } => {
            for offset in shuffled_offsets(*file_size, *block_size) {
                bytes += store.read_range(path, offset, *block_size).await?.len() as u64;
            }
        }
        WorkUnit::Write { path, file_size, chunk_size } => {
            let chunk = payload_chunk(payload, (*chunk_size).min(*file_size))?;
            let written = store.put_chunked(path, &chunk, *file_size).await?;
            if written != *file_size {
                bail!("short write to {}: {} of {} bytes", path, written, file_size);
            }
            bytes = written;
        }
        WorkUnit::List { prefix } => {
            store.list(prefix).await?;
        }
        WorkUnit::Find { prefix } => {
            store.find(prefix).await?;
        }
        WorkUnit::Delete { prefix } => store.delete_recursive(prefix).await?,
        WorkUnit::Rename { from, to } => store.rename(from, to).await?,
        WorkUnit::TimedRead { paths, pattern, block_size, file_size, runtime_ms } => {
            let deadline = start + Duration::from_millis(*runtime_ms);
            bytes = read_until(store, paths, *pattern, *block_size, *file_size, deadline).await?;
        }
        WorkUnit::TimedWrite { path, chunk_size, runtime_ms } => {
            let chunk = payload_chunk(payload, *chunk_size)?;
            let deadline = start + Duration::from_millis(*runtime_ms);
            bytes = store.put_until(path, &chunk, deadline).await?;
        }
    }
    let elapsed = start.elapsed();
    debug!("{} : {} - {:.2} ms.", unit.label(), unit.target(), elapsed.as_secs_f64() * 1000.0);
    Ok(Completed { latency: elapsed, bytes })
}

/// Run units one after another on the current task
pub async fn perform_sequential(store: &dyn ObjectStore, units: &[WorkUnit], payload: &Bytes) -> Result<Vec<Completed>> {
    let mut done = Vec::with_capacity(units.len());
    for unit in units {
        done.push(
            perform(store, unit, payload)
                .await
                .with_context(|| format!("{} {} failed", unit.label(), unit.target()))?,
        );
    }
    Ok(done)
}

/// Run units as tasks with at most `concurrency` in flight. Must be called
/// inside a runtime; the first failure is returned after all units finish.
pub async fn perform_concurrent(
    store: Arc<dyn ObjectStore>,
    units: &[WorkUnit],
    payload: &Bytes,
    concurrency: usize,
) -> Result<Vec<Completed>> {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut futs = FuturesUnordered::new();
    for unit in units.iter().cloned() {
        let sem = sem.clone();
        let store = store.clone();
        let payload = payload.clone();
        futs.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.context("worker semaphore closed")?;
            perform(store.as_ref(), &unit, &payload)
                .await
                .with_context(|| format!("{} {} failed", unit.label(), unit.target()))
        }));
    }

    let mut done = Vec::with_capacity(units.len());
    let mut first_error = None;
    while let Some(joined) = futs.next().await {
        match joined.context("worker task panicked").and_then(|r| r) {
            Ok(completed) => done.push(completed),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(done),
    }
}
