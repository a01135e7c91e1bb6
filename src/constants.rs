// src/constants.rs
//
// Central location for the tuning knobs of fleetbench.

use std::time::Duration;

/// One mebibyte. Sizes in scenario files are given in MB and mean MiB.
pub const MB: u64 = 1024 * 1024;

// =============================================================================
// Remote job lifecycle
// =============================================================================

/// Attempts made by the readiness check before a target is given up on
pub const READY_MAX_ATTEMPTS: u32 = 20;

/// Fixed pause between readiness attempts (no backoff)
pub const READY_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Pause inserted after every trial in sequential mode, pass or fail
pub const TRIAL_COOLDOWN: Duration = Duration::from_secs(30);

/// No-op command used to check that a target answers
pub const READY_CHECK_COMMAND: &str = "true";

/// Default directory on the target that receives the payload
pub const DEFAULT_REMOTE_DIR: &str = "fleetbench";

/// Marker printed by the remote execute script with the harness exit status
pub const RUN_STATUS_MARKER: &str = "__FLEETBENCH_RUN_STATUS=";

/// Directory (relative to the harness working dir) holding timestamped runs
pub const RUNS_DIR_NAME: &str = "__run__";

// =============================================================================
// Harness defaults
// =============================================================================

/// Largest chunk used when populating objects before the timed region
pub const SETUP_MAX_CHUNK: u64 = 100 * MB;

/// Worker processes used while populating objects
pub const SETUP_CONCURRENCY: usize = 16;

/// Worker count used while creating many zero-byte files for listing cases
pub const SETUP_SMALL_FILE_CONCURRENCY: usize = 100;

/// Sampling interval of the resource monitor
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(250);

/// Tolerance applied by the perf check (10% above expected)
pub const CHECK_TOLERANCE: f64 = 1.1;

// =============================================================================
// Configurator defaults (used when neither YAML nor environment sets a value)
// =============================================================================

pub const DEFAULT_READ_FILE_SIZES_MB: &[u64] = &[128];
pub const DEFAULT_READ_BLOCK_SIZES_MB: &[u64] = &[16];
pub const DEFAULT_WRITE_FILE_SIZES_MB: &[u64] = &[1024];
pub const DEFAULT_WRITE_CHUNK_SIZES_MB: &[u64] = &[64, 100];
pub const DEFAULT_LISTING_NUM_FILES: &[u64] = &[10_000];
pub const DEFAULT_LISTING_FOLDERS: &[u64] = &[0];
pub const DEFAULT_ROUNDS_READ: u32 = 1;
pub const DEFAULT_ROUNDS_WRITE: u32 = 10;
pub const DEFAULT_ROUNDS_LISTING: u32 = 1;
pub const DEFAULT_ROUNDS_FIXED_DURATION: u32 = 1;

/// Length of one round of a fixed-duration case, in seconds
pub const DEFAULT_RUNTIME_SECS: u64 = 30;

// Environment variables that override configurator dimensions
pub const ENV_PROCESSES: &str = "FLEETBENCH_PROCESSES";
pub const ENV_THREADS: &str = "FLEETBENCH_THREADS";
pub const ENV_FILE_SIZES_MB: &str = "FLEETBENCH_FILE_SIZES_MB";
pub const ENV_BLOCK_SIZES_MB: &str = "FLEETBENCH_BLOCK_SIZES_MB";
pub const ENV_CHUNK_SIZES_MB: &str = "FLEETBENCH_CHUNK_SIZES_MB";
pub const ENV_BUCKET_TYPES: &str = "FLEETBENCH_BUCKET_TYPES";
pub const ENV_NUM_FILES: &str = "FLEETBENCH_NUM_FILES";
pub const ENV_FOLDERS: &str = "FLEETBENCH_FOLDERS";
pub const ENV_ROUNDS: &str = "FLEETBENCH_ROUNDS";
pub const ENV_RUNTIME: &str = "FLEETBENCH_RUNTIME";

/// Store root used when neither `--store-root` nor its env var is given
pub const DEFAULT_STORE_ROOT: &str = "file:///tmp/fleetbench-store";
