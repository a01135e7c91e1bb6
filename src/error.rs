// src/error.rs
//! Error taxonomy of the remote job lifecycle.

use thiserror::Error;

/// Errors raised by the orchestration layer.
///
/// `ConfigMismatch` is the only one that aborts a run; the others are
/// caught per job and folded into its `JobOutcome`.
#[derive(Debug, Error)]
pub enum JobError {
    /// Target never answered the readiness check within the retry budget
    #[error("target {target} not reachable after {attempts} attempts")]
    ReadinessTimeout { target: String, attempts: u32 },

    /// Payload transfer or setup script failed
    #[error("provisioning failed on {target}: {reason}")]
    ProvisionFailure { target: String, reason: String },

    /// Benchmark run or its results upload failed
    #[error("execution failed on {target}: {reason}")]
    ExecutionFailure { target: String, reason: String },

    /// Fleet mode needs exactly one work item per target
    #[error("{work_items} work items for {targets} targets")]
    ConfigMismatch { work_items: usize, targets: usize },
}

impl JobError {
    pub fn provision(target: impl Into<String>, reason: impl Into<String>) -> Self {
        JobError::ProvisionFailure {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(target: impl Into<String>, reason: impl Into<String>) -> Self {
        JobError::ExecutionFailure {
            target: target.into(),
            reason: reason.into(),
        }
    }
}
