// src/orchestrator/mod.rs
//! Fan-out/fan-in drivers over the remote job runner.
//!
//! - `fleet`: one work item per target, all concurrently, any failure fails the run
//! - `sequence`: many work items on one target, in order, failures are soft

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JobError;
use crate::target::Target;

pub mod fleet;
pub mod sequence;

pub use fleet::{run_fleet, FleetReport};
pub use sequence::{run_sequence, SequenceOptions, SequenceReport};

/// One benchmark scenario selector: `group[:config]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub group: String,
    pub config: Option<String>,
}

impl WorkItem {
    pub fn new(group: impl Into<String>, config: Option<&str>) -> Self {
        Self {
            group: group.into(),
            config: config.map(str::to_string),
        }
    }
}

impl FromStr for WorkItem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (group, config) = match s.split_once(':') {
            Some((g, c)) => (g.trim(), Some(c.trim()).filter(|c| !c.is_empty())),
            None => (s.trim(), None),
        };
        if group.is_empty() {
            bail!("work item '{}' has no group", s);
        }
        Ok(WorkItem::new(group, config))
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config {
            Some(config) => write!(f, "{}:{}", self.group, config),
            None => write!(f, "{}", self.group),
        }
    }
}

/// Parse a whitespace-separated list of `group:config` entries.
pub fn parse_work_items(spec: &str) -> Result<Vec<WorkItem>> {
    spec.split_whitespace().map(str::parse).collect()
}

/// A work item bound to the target that will run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: Target,
    pub work_item: WorkItem,
}

/// Pair work items with targets 1:1, in list order.
///
/// Fails without building anything when the lists differ in length.
pub fn pair_assignments(work_items: &[WorkItem], targets: &[Target]) -> Result<Vec<Assignment>, JobError> {
    if work_items.len() != targets.len() {
        return Err(JobError::ConfigMismatch {
            work_items: work_items.len(),
            targets: targets.len(),
        });
    }
    Ok(targets
        .iter()
        .zip(work_items)
        .map(|(target, work_item)| Assignment {
            target: target.clone(),
            work_item: work_item.clone(),
        })
        .collect())
}

/// How failures of individual jobs affect the run's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Any failed job fails the run
    Gating,
    /// Failures are recorded and logged; the run always succeeds
    BestEffort,
}

impl RunMode {
    pub fn exit_code(&self, failures: usize) -> i32 {
        match self {
            RunMode::Gating if failures > 0 => 1,
            _ => 0,
        }
    }

    /// Best-effort runs clear the target's local results after each upload
    pub fn clears_local_results(&self) -> bool {
        matches!(self, RunMode::BestEffort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_work_items() {
        let items = parse_work_items("read:read_seq  write\nlisting:").unwrap();
        assert_eq!(
            items,
            vec![
                WorkItem::new("read", Some("read_seq")),
                WorkItem::new("write", None),
                WorkItem::new("listing", None),
            ]
        );
        assert_eq!(items[0].to_string(), "read:read_seq");
    }

    #[test]
    fn test_parse_work_item_without_group() {
        assert!(":cfg".parse::<WorkItem>().is_err());
    }

    #[test]
    fn test_pair_assignments_mismatch() {
        let items = parse_work_items("read write").unwrap();
        let err = pair_assignments(&items, &[Target::named("vm-1")]).unwrap_err();
        assert!(matches!(err, JobError::ConfigMismatch { work_items: 2, targets: 1 }));
    }

    #[test]
    fn test_pair_assignments_positional() {
        let items = parse_work_items("read write").unwrap();
        let targets = vec![Target::named("vm-1"), Target::named("vm-2")];
        let pairs = pair_assignments(&items, &targets).unwrap();
        assert_eq!(pairs[1].target.id, "vm-2");
        assert_eq!(pairs[1].work_item.group, "write");
    }

    #[test]
    fn test_run_mode_exit_codes() {
        assert_eq!(RunMode::Gating.exit_code(0), 0);
        assert_eq!(RunMode::Gating.exit_code(2), 1);
        assert_eq!(RunMode::BestEffort.exit_code(2), 0);
    }
}
