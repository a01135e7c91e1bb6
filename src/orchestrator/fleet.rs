// src/orchestrator/fleet.rs
//! Parallel mode: N work items on N targets, all at once.

use tokio::task::JoinSet;
use tracing::{error, info};

use super::{pair_assignments, RunMode, WorkItem};
use crate::error::JobError;
use crate::job::{JobOutcome, JobRunner, Phase};
use crate::target::Target;

/// Aggregate of a fleet run, outcomes in target order
#[derive(Debug)]
pub struct FleetReport {
    pub outcomes: Vec<JobOutcome>,
}

impl FleetReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded).count()
    }

    pub fn succeeded(&self) -> bool {
        self.failures() == 0
    }

    /// Non-zero iff any job failed
    pub fn exit_code(&self) -> i32 {
        RunMode::Gating.exit_code(self.failures())
    }

    /// Every job's log, one section per target
    pub fn combined_log(&self) -> String {
        let mut combined = String::new();
        for o in &self.outcomes {
            let item = o.work_item.as_ref().map(|w| w.to_string()).unwrap_or_default();
            combined.push_str(&format!(
                "===== {} [{}] phase={} {} =====\n",
                o.target_id,
                item,
                o.phase_reached,
                if o.succeeded { "OK" } else { "FAILED" }
            ));
            combined.push_str(o.log.as_str());
            combined.push('\n');
        }
        combined
    }
}

/// Run every work item on its paired target concurrently and wait for all.
///
/// A mismatch between the two lists is reported before any job starts.
/// A failing or panicking job never cancels its siblings.
pub async fn run_fleet(
    runner: &JobRunner,
    work_items: &[WorkItem],
    targets: &[Target],
) -> Result<FleetReport, JobError> {
    let assignments = pair_assignments(work_items, targets)?;
    info!("Launching {} jobs", assignments.len());

    let mut set = JoinSet::new();
    for (idx, assignment) in assignments.iter().cloned().enumerate() {
        let runner = runner.clone();
        set.spawn(async move { (idx, runner.run_job(&assignment).await) });
    }

    let mut slots: Vec<Option<JobOutcome>> = vec![None; assignments.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => {
                if outcome.succeeded {
                    info!("✓ {} ({}) done", outcome.target_id, assignments[idx].work_item);
                } else {
                    error!("✗ {} ({}) failed at {}", outcome.target_id, assignments[idx].work_item, outcome.phase_reached);
                }
                slots[idx] = Some(outcome);
            }
            Err(e) => error!("Fleet job aborted: {}", e),
        }
    }

    // Jobs that panicked leave an empty slot; they count as failures.
    let outcomes = slots
        .into_iter()
        .zip(&assignments)
        .map(|(slot, a)| {
            slot.unwrap_or_else(|| {
                let mut o = JobOutcome::start(&a.target, Some(&a.work_item));
                o.phase_reached = Phase::Pending;
                o.error = Some("job task panicked".to_string());
                o.log.note("job task panicked before reporting an outcome");
                o
            })
        })
        .collect();

    let report = FleetReport { outcomes };
    let failures = report.failures();
    if failures == 0 {
        info!("All {} jobs succeeded", report.outcomes.len());
    } else {
        error!("{} of {} jobs failed", failures, report.outcomes.len());
    }
    Ok(report)
}
