// src/lib.rs

pub mod check; // Perf regression gate against expected durations
pub mod configurator; // Scenario YAML + env dimensions -> benchmark cases
pub mod constants;
pub mod error; // Job error taxonomy
pub mod harness; // Setup, timed rounds, teardown
pub mod job; // Readiness, provision, execute on one remote target
pub mod logging;
pub mod metrics; // Per-operation latency histograms
pub mod orchestrator; // Fleet and sequential runs
pub mod params;
pub mod remote; // ssh2 and gcloud shells
pub mod report; // results.json, results.csv, run directory
pub mod serde_helpers;
pub mod stats;
pub mod store; // Object store abstraction and local backend
pub mod target;

pub use error::JobError;
