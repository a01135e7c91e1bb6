// src/harness/mod.rs
//
// Execution harness: setup, timed rounds in one of three execution modes,
// teardown that always runs.

use anyhow::{Context, Result};
use chrono::Local;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Builder as RtBuilder, Runtime};
use tracing::{error, info};

pub mod fixtures;
pub mod monitor;
pub mod multiprocess;
pub mod ops;

use crate::constants::MONITOR_INTERVAL;
use crate::metrics::OpHistogram;
use crate::params::{BaseParams, BenchmarkCase, ListingPattern, ReadPattern};
use crate::report::RawResult;
use crate::store::{open_store, ObjectStore};
use fixtures::Fixture;
use monitor::{ResourceMonitor, ResourcePeaks};
use multiprocess::RoundOutput;
use ops::{Completed, WorkUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    SingleThreaded,
    MultiThreaded,
    MultiProcess,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionMode::SingleThreaded => "single_threaded",
            ExecutionMode::MultiThreaded => "multi_threaded",
            ExecutionMode::MultiProcess => "multi_process",
        })
    }
}

/// Exactly one mode per case
pub fn mode_for(base: &BaseParams) -> ExecutionMode {
    if base.processes > 1 {
        ExecutionMode::MultiProcess
    } else if base.threads > 1 {
        ExecutionMode::MultiThreaded
    } else {
        ExecutionMode::SingleThreaded
    }
}

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Where buckets live, e.g. `file:///mnt/bench`
    pub store_uri: String,
    /// Binary spawned for multi-process rounds; defaults to the running executable
    pub worker_exe: Option<PathBuf>,
    pub monitor_interval: Duration,
}

impl HarnessOptions {
    pub fn new(store_uri: impl Into<String>) -> Self {
        Self {
            store_uri: store_uri.into(),
            worker_exe: None,
            monitor_interval: MONITOR_INTERVAL,
        }
    }

    fn worker_exe(&self) -> Result<PathBuf> {
        match &self.worker_exe {
            Some(p) => Ok(p.clone()),
            None => std::env::current_exe().context("Failed to locate current executable"),
        }
    }
}

/// What every worker does in one round
pub fn round_units(case: &BenchmarkCase, fixture: &Fixture) -> Vec<WorkUnit> {
    let base = case.base();
    let mode = mode_for(base);
    let workers = base.threads * base.processes;
    match case {
        BenchmarkCase::Read(p) => {
            let paths: Vec<String> = match (mode, fixture.files.as_slice()) {
                (_, []) => Vec::new(),
                (ExecutionMode::SingleThreaded, [first, ..]) => vec![first.clone()],
                // Every worker reads the one file
                (_, [only]) => vec![only.clone(); workers],
                (_, files) => files.to_vec(),
            };
            paths
                .into_iter()
                .map(|path| match p.pattern {
                    ReadPattern::Seq => WorkUnit::SeqRead { path, block_size: p.block_size_bytes },
                    ReadPattern::Rand => WorkUnit::RandRead {
                        path,
                        block_size: p.block_size_bytes,
                        file_size: p.io.file_size_bytes,
                    },
                })
                .collect()
        }
        BenchmarkCase::Write(p) => (0..base.files)
            .map(|i| WorkUnit::Write {
                path: format!("{}/file_{}", fixture.prefix, i),
                file_size: p.file_size_bytes,
                chunk_size: p.chunk_size_bytes,
            })
            .collect(),
        BenchmarkCase::Listing(p) => {
            let unit = match p.pattern {
                ListingPattern::List => WorkUnit::List { prefix: fixture.prefix.clone() },
                ListingPattern::Find => WorkUnit::Find { prefix: fixture.prefix.clone() },
            };
            vec![unit; workers]
        }
        BenchmarkCase::Delete(_) => vec![WorkUnit::Delete { prefix: fixture.prefix.clone() }],
        BenchmarkCase::Rename(_) => vec![WorkUnit::Rename {
            from: fixture.prefix.clone(),
            to: fixture.renamed_prefix(),
        }],
        // Every worker cycles over all files, each in its own order
        BenchmarkCase::ReadFixedDuration(p) => (0..workers)
            .map(|_| {
                let mut paths = fixture.files.clone();
                paths.shuffle(&mut rand::rng());
                WorkUnit::TimedRead {
                    paths,
                    pattern: p.read.pattern,
                    block_size: p.read.block_size_bytes,
                    file_size: p.read.io.file_size_bytes,
                    runtime_ms: p.runtime_secs * 1000,
                }
            })
            .collect(),
        BenchmarkCase::WriteFixedDuration(p) => (0..workers)
            .map(|i| WorkUnit::TimedWrite {
                path: format!("{}/file_{}", fixture.prefix, i),
                chunk_size: p.io.chunk_size_bytes,
                runtime_ms: p.runtime_secs * 1000,
            })
            .collect(),
    }
}

fn runtime_for(case: &BenchmarkCase) -> Result<Runtime> {
    let base = case.base();
    let rt = match mode_for(base) {
        ExecutionMode::SingleThreaded => RtBuilder::new_current_thread().enable_all().build(),
        ExecutionMode::MultiThreaded => RtBuilder::new_multi_thread()
            .worker_threads(base.threads)
            .enable_all()
            .build(),
        // Only setup and teardown run here
        ExecutionMode::MultiProcess => RtBuilder::new_multi_thread().enable_all().build(),
    };
    rt.context("Failed to create tokio runtime")
}

/// Set up, run every round, tear down. Teardown runs even when setup
/// finished partially or a round failed.
pub fn run_case(case: &BenchmarkCase, opts: &HarnessOptions) -> Result<RawResult> {
    let store = open_store(&opts.store_uri)?;
    let rt = runtime_for(case)?;
    let mode = mode_for(case.base());
    info!("Running {} ({}, {} rounds)", case.name(), mode, case.base().rounds);

    let prefix = fixtures::unique_prefix(&case.base().bucket_name, case.group());
    let fixture = match rt.block_on(fixtures::setup(store.clone(), case, &prefix)) {
        Ok(f) => f,
        Err(e) => {
            error!("Setup of {} failed: {:#}", case.name(), e);
            if let Err(cleanup) = rt.block_on(store.delete_recursive(&prefix)) {
                error!("Failed to clean up partial setup under {}: {:#}", prefix, cleanup);
            }
            return Err(e.context(format!("setup of {}", case.name())));
        }
    };

    let started_at = Local::now().to_rfc3339();
    let outcome = run_rounds(&rt, store.clone(), case, mode, &fixture, opts);
    rt.block_on(fixtures::teardown(store.as_ref(), case, &fixture));

    let rounds = outcome?;
    Ok(RawResult {
        name: case.name().to_string(),
        group: case.group(),
        mode,
        params: case.clone(),
        started_at,
        round_durations_s: rounds.durations,
        round_bytes: rounds.bytes,
        latency: rounds.hist.summary(),
        resources: rounds.peaks,
    })
}

/// Measurements of all rounds of one case
struct RoundsOutcome {
    durations: Vec<f64>,
    bytes: Vec<u64>,
    hist: OpHistogram,
    peaks: ResourcePeaks,
}

fn run_rounds(
    rt: &Runtime,
    store: Arc<dyn ObjectStore>,
    case: &BenchmarkCase,
    mode: ExecutionMode,
    fixture: &Fixture,
    opts: &HarnessOptions,
) -> Result<RoundsOutcome> {
    let base = case.base();
    let mut outcome = RoundsOutcome {
        durations: Vec::with_capacity(base.rounds as usize),
        bytes: Vec::with_capacity(base.rounds as usize),
        hist: OpHistogram::new()?,
        peaks: ResourcePeaks::default(),
    };
    let worker_exe = match mode {
        ExecutionMode::MultiProcess => Some(opts.worker_exe()?),
        _ => None,
    };

    for round in 0..base.rounds {
        if round > 0 && case.group().is_destructive() {
            rt.block_on(fixtures::repopulate(store.clone(), fixture))
                .with_context(|| format!("repopulating {} before round {}", case.name(), round + 1))?;
        }

        let units = round_units(case, fixture);
        let payload = match mode {
            ExecutionMode::MultiProcess => bytes::Bytes::new(),
            _ => ops::payload_for(&units),
        };

        let monitor = ResourceMonitor::start(opts.monitor_interval);
        let start = Instant::now();
        let result: Result<RoundOutput> = match (mode, &worker_exe) {
            (ExecutionMode::SingleThreaded, _) => rt
                .block_on(ops::perform_sequential(store.as_ref(), &units, &payload))
                .map(merge_completed),
            (ExecutionMode::MultiThreaded, _) => rt
                .block_on(ops::perform_concurrent(store.clone(), &units, &payload, base.threads))
                .map(merge_completed),
            (ExecutionMode::MultiProcess, exe) => exe
                .as_deref()
                .context("no worker executable for multi-process round")
                .and_then(|exe| {
                    multiprocess::run_round(
                        exe,
                        &opts.store_uri,
                        base.threads,
                        multiprocess::split_units(units, base.processes),
                    )
                }),
        };
        let elapsed = start.elapsed();
        outcome.peaks.absorb(&monitor.stop());

        let output = result.with_context(|| format!("{} round {}", case.name(), round + 1))?;
        for us in output.latencies_us {
            outcome.hist.record_micros(us);
        }
        info!(
            "{} round {}/{}: {:.3}s, {} bytes",
            case.name(),
            round + 1,
            base.rounds,
            elapsed.as_secs_f64(),
            output.bytes
        );
        outcome.durations.push(elapsed.as_secs_f64());
        outcome.bytes.push(output.bytes);
    }
    Ok(outcome)
}

fn merge_completed(done: Vec<Completed>) -> RoundOutput {
    RoundOutput {
        latencies_us: done.iter().map(|c| c.latency.as_micros() as u64).collect(),
        bytes: done.iter().map(|c| c.bytes).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Group, IoParams, ListingParams, ReadParams};
    use crate::target::TargetClass;

    fn base(group: Group, threads: usize, processes: usize, files: usize) -> BaseParams {
        BaseParams {
            name: "case".into(),
            group,
            bucket_name: "b".into(),
            target_class: TargetClass::Regional,
            threads,
            processes,
            files,
            rounds: 1,
        }
    }

    fn fixture(files: usize) -> Fixture {
        Fixture {
            prefix: "b/p".into(),
            dirs: vec!["b/p".into()],
            files: (0..files).map(|i| format!("b/p/file_{}", i)).collect(),
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(mode_for(&base(Group::Read, 1, 1, 1)), ExecutionMode::SingleThreaded);
        assert_eq!(mode_for(&base(Group::Read, 4, 1, 4)), ExecutionMode::MultiThreaded);
        assert_eq!(mode_for(&base(Group::Read, 1, 4, 4)), ExecutionMode::MultiProcess);
        assert_eq!(mode_for(&base(Group::Read, 4, 4, 16)), ExecutionMode::MultiProcess);
    }

    #[test]
    fn test_rand_read_on_one_file_fans_out_to_every_thread() {
        let case = BenchmarkCase::Read(ReadParams {
            io: IoParams {
                base: base(Group::Read, 4, 1, 1),
                file_size_bytes: 64,
                chunk_size_bytes: 16,
            },
            pattern: ReadPattern::Rand,
            block_size_bytes: 16,
        });
        let units = round_units(&case, &fixture(1));
        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|u| matches!(u, WorkUnit::RandRead { path, .. } if path == "b/p/file_0")));
    }

    #[test]
    fn test_timed_units_per_worker() {
        use crate::params::{TimedReadParams, TimedWriteParams};

        let read = BenchmarkCase::ReadFixedDuration(TimedReadParams {
            read: ReadParams {
                io: IoParams {
                    base: base(Group::ReadFixedDuration, 2, 2, 3),
                    file_size_bytes: 64,
                    chunk_size_bytes: 16,
                },
                pattern: ReadPattern::Seq,
                block_size_bytes: 16,
            },
            runtime_secs: 2,
        });
        let units = round_units(&read, &fixture(3));
        assert_eq!(units.len(), 4);
        for unit in &units {
            let WorkUnit::TimedRead { paths, runtime_ms, .. } = unit else { panic!("not a timed read") };
            assert_eq!(*runtime_ms, 2000);
            let mut sorted = paths.clone();
            sorted.sort();
            assert_eq!(sorted, fixture(3).files);
        }

        let write = BenchmarkCase::WriteFixedDuration(TimedWriteParams {
            io: IoParams {
                base: base(Group::WriteFixedDuration, 3, 1, 3),
                file_size_bytes: 0,
                chunk_size_bytes: 8,
            },
            runtime_secs: 1,
        });
        let units = round_units(&write, &fixture(0));
        assert_eq!(units.len(), 3);
        assert_eq!(
            units[2],
            WorkUnit::TimedWrite { path: "b/p/file_2".into(), chunk_size: 8, runtime_ms: 1000 }
        );
    }

    #[test]
    fn test_listing_units_per_worker_and_rename_target() {
        let listing = ListingParams {
            base: base(Group::Listing, 2, 3, 10),
            depth: 0,
            folders: 0,
            pattern: ListingPattern::Find,
        };
        assert_eq!(round_units(&BenchmarkCase::Listing(listing.clone()), &fixture(10)).len(), 6);

        let rename = BenchmarkCase::Rename(ListingParams {
            base: base(Group::Rename, 1, 1, 10),
            ..listing
        });
        assert_eq!(
            round_units(&rename, &fixture(10)),
            vec![WorkUnit::Rename { from: "b/p".into(), to: "b/p_renamed".into() }]
        );
    }
}
