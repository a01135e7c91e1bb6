// src/orchestrator/sequence.rs
//! Single-target mode: a soak of trials run one after another.

use std::time::Duration;
use tracing::{info, warn};

use super::{RunMode, WorkItem};
use crate::constants::TRIAL_COOLDOWN;
use crate::job::{JobOutcome, JobRunner, Phase};
use crate::target::Target;

#[derive(Debug, Clone, Copy)]
pub struct SequenceOptions {
    /// Pause after every trial, pass or fail
    pub cooldown: Duration,
    pub mode: RunMode,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            cooldown: TRIAL_COOLDOWN,
            mode: RunMode::BestEffort,
        }
    }
}

#[derive(Debug)]
pub struct SequenceReport {
    /// False when readiness or provisioning failed and no trial ran
    pub provisioned: bool,
    /// Setup stages, then one outcome per attempted trial
    pub setup: JobOutcome,
    pub trials: Vec<JobOutcome>,
    pub mode: RunMode,
}

impl SequenceReport {
    pub fn failures(&self) -> usize {
        self.trials.iter().filter(|t| !t.succeeded).count()
    }

    pub fn exit_code(&self) -> i32 {
        self.mode.exit_code(self.failures())
    }

    pub fn combined_log(&self) -> String {
        let mut combined = format!("===== {} setup phase={} =====\n", self.setup.target_id, self.setup.phase_reached);
        combined.push_str(self.setup.log.as_str());
        for (i, t) in self.trials.iter().enumerate() {
            let item = t.work_item.as_ref().map(|w| w.to_string()).unwrap_or_default();
            combined.push_str(&format!(
                "===== trial {} [{}] {} =====\n",
                i + 1,
                item,
                if t.succeeded { "OK" } else { "FAILED" }
            ));
            combined.push_str(t.log.as_str());
        }
        combined
    }
}

/// Provision `target` once, then run every work item in order.
///
/// Setup failure turns the run into a logged no-op. Trial failures are
/// counted but never stop the loop.
pub async fn run_sequence(
    runner: &JobRunner,
    work_items: &[WorkItem],
    target: &Target,
    options: SequenceOptions,
) -> SequenceReport {
    let mut setup = JobOutcome::start(target, None);
    if let Err(e) = runner.prepare(target, &mut setup).await {
        warn!("Setup of {} failed, skipping {} trials: {}", target, work_items.len(), e);
        setup.log.note(format!("SETUP FAILED: {}", e));
        setup.error = Some(e.to_string());
        return SequenceReport {
            provisioned: false,
            setup,
            trials: Vec::new(),
            mode: options.mode,
        };
    }
    setup.succeeded = true;

    let mut trials = Vec::with_capacity(work_items.len());
    for (i, item) in work_items.iter().enumerate() {
        info!("Trial {}/{}: {} on {}", i + 1, work_items.len(), item, target);
        let mut trial = JobOutcome::start(target, Some(item));
        let mut phase = Phase::Provisioned;
        match runner.execute(target, item, &mut trial.log, &mut phase).await {
            Ok(()) => trial.succeeded = true,
            Err(e) => {
                warn!("Trial {} ({}) failed: {}", i + 1, item, e);
                trial.log.note(format!("FAILED: {}", e));
                trial.error = Some(e.to_string());
            }
        }
        trial.phase_reached = phase;
        trials.push(trial);

        if !options.cooldown.is_zero() {
            info!("Cooling down for {:?}", options.cooldown);
            tokio::time::sleep(options.cooldown).await;
        }
    }

    let report = SequenceReport {
        provisioned: true,
        setup,
        trials,
        mode: options.mode,
    };
    let failures = report.failures();
    if failures > 0 {
        warn!("{} of {} trials failed", failures, report.trials.len());
    } else {
        info!("All {} trials succeeded", report.trials.len());
    }
    report
}
