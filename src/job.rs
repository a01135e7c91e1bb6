// src/job.rs
//! Remote job runner: readiness → provision → execute → collect, per target.

use chrono::Local;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::constants::{
    DEFAULT_REMOTE_DIR, READY_MAX_ATTEMPTS, READY_CHECK_COMMAND, READY_RETRY_DELAY, RUNS_DIR_NAME,
    RUN_STATUS_MARKER,
};
use crate::error::JobError;
use crate::orchestrator::{Assignment, RunMode, WorkItem};
use crate::remote::{shell_quote, CommandOutput, RemoteShell};
use crate::target::{BucketMap, Target};

/// Fixed-delay retry budget for the readiness check
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: READY_MAX_ATTEMPTS,
            delay: READY_RETRY_DELAY,
        }
    }
}

/// What gets shipped to a target and how it is set up
#[derive(Debug, Clone)]
pub struct ProvisionSpec {
    /// Local source tree sent to every target
    pub payload_dir: PathBuf,
    /// Destination on the target, relative to the login directory
    pub remote_dir: String,
    /// Replaces the built-in setup script when set
    pub setup_command: Option<String>,
}

impl ProvisionSpec {
    pub fn new(payload_dir: impl Into<PathBuf>) -> Self {
        Self {
            payload_dir: payload_dir.into(),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            setup_command: None,
        }
    }

    /// Directory holding the installed harness binary
    pub fn env_dir(&self) -> String {
        format!("{}/.env", self.remote_dir)
    }

    pub fn harness_bin(&self) -> String {
        format!("{}/bin/fleetbench", self.env_dir())
    }

    /// Installs system packages and the toolchain, then builds the harness
    /// into an isolated prefix under the remote dir.
    pub fn setup_script(&self) -> String {
        if let Some(cmd) = &self.setup_command {
            return cmd.clone();
        }
        let dir = shell_quote(&self.remote_dir);
        let root = shell_quote(&self.env_dir());
        [
            "set -e".to_string(),
            format!("cd {}", dir),
            "if command -v apt-get >/dev/null 2>&1; then \
             sudo apt-get update -y -q && \
             sudo apt-get install -y -q build-essential pkg-config libssl-dev curl; fi"
                .to_string(),
            "export PATH=\"$HOME/.cargo/bin:$PATH\"".to_string(),
            "if ! command -v cargo >/dev/null 2>&1; then \
             curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y --profile minimal; fi"
                .to_string(),
            format!("cargo install --force --path . --root \"$HOME\"/{}", root),
        ]
        .join("\n")
    }
}

/// Durable location for uploaded results: `<location>/<ddmmyyyy>/<run_id>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsSink {
    pub location: String,
    pub run_id: String,
    pub date: String,
}

impl ResultsSink {
    pub fn new(location: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            run_id: run_id.into(),
            date: Local::now().format("%d%m%Y").to_string(),
        }
    }

    pub fn destination(&self) -> String {
        format!("{}/{}/{}/", self.location.trim_end_matches('/'), self.date, self.run_id)
    }

    /// Shell command copying directory `$src_var` into the destination
    fn upload_command(&self, src_var: &str) -> String {
        let dest = shell_quote(&self.destination());
        if self.location.starts_with("gs://") {
            format!("gcloud storage cp --recursive \"${{{}%/}}\" {}", src_var, dest)
        } else {
            format!("mkdir -p {dest} && cp -r \"${{{}%/}}\" {dest}", src_var, dest = dest)
        }
    }
}

/// Everything a runner needs besides the transport; read-only during a run
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub provision: ProvisionSpec,
    pub sink: ResultsSink,
    pub buckets: BucketMap,
    /// Forwarded as `--store-root`; the harness default applies when unset
    pub store_root: Option<String>,
    pub mode: RunMode,
    pub readiness: RetryPolicy,
}

/// Furthest lifecycle stage a job completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Pending,
    Ready,
    Provisioned,
    Ran,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::Ready => "ready",
            Phase::Provisioned => "provisioned",
            Phase::Ran => "ran",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Append-only text log owned by one job
#[derive(Debug, Clone, Default)]
pub struct JobLog {
    text: String,
}

impl JobLog {
    pub fn note(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    pub fn record(&mut self, stage: &str, command: &str, out: &CommandOutput) {
        self.note(format!("[{}] $ {}", stage, command.lines().next().unwrap_or_default()));
        for line in out.stdout.lines() {
            self.note(format!("[{}] {}", stage, line));
        }
        for line in out.stderr.lines() {
            self.note(format!("[{}] ! {}", stage, line));
        }
        self.note(format!("[{}] exit {}", stage, out.status));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub target_id: String,
    pub work_item: Option<WorkItem>,
    pub phase_reached: Phase,
    pub succeeded: bool,
    pub error: Option<String>,
    pub log: JobLog,
}

impl JobOutcome {
    pub fn start(target: &Target, work_item: Option<&WorkItem>) -> Self {
        Self {
            target_id: target.id.clone(),
            work_item: work_item.cloned(),
            phase_reached: Phase::Pending,
            succeeded: false,
            error: None,
            log: JobLog::default(),
        }
    }

    fn fail(&mut self, err: &JobError) {
        error!(target = %self.target_id, phase = %self.phase_reached, "{}", err);
        self.log.note(format!("FAILED: {}", err));
        self.error = Some(err.to_string());
        self.succeeded = false;
    }
}

/// Runs the job lifecycle against targets through a `RemoteShell`.
#[derive(Clone)]
pub struct JobRunner {
    shell: Arc<dyn RemoteShell>,
    config: Arc<JobConfig>,
}

impl JobRunner {
    pub fn new(shell: Arc<dyn RemoteShell>, config: JobConfig) -> Self {
        Self {
            shell,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Poll with a no-op command until one attempt returns cleanly.
    pub async fn wait_for_ready(&self, target: &Target, log: &mut JobLog) -> Result<(), JobError> {
        let policy = self.config.readiness;
        for attempt in 1..=policy.attempts {
            match self.shell.exec(target, READY_CHECK_COMMAND).await {
                Ok(out) if out.success() => {
                    info!("{} ready after {} attempt(s)", target, attempt);
                    log.note(format!("[ready] reachable on attempt {}", attempt));
                    return Ok(());
                }
                Ok(out) => {
                    debug!("{} readiness check exit {} (attempt {}/{})", target, out.status, attempt, policy.attempts);
                    log.note(format!("[ready] attempt {}: exit {}", attempt, out.status));
                }
                Err(e) => {
                    debug!("{} readiness check failed (attempt {}/{}): {:#}", target, attempt, policy.attempts, e);
                    log.note(format!("[ready] attempt {}: {:#}", attempt, e));
                }
            }
            if attempt < policy.attempts {
                tokio::time::sleep(policy.delay).await;
            }
        }
        Err(JobError::ReadinessTimeout {
            target: target.id.clone(),
            attempts: policy.attempts,
        })
    }

    /// Ship the payload and run the setup script. Nothing is rolled back.
    pub async fn provision(&self, target: &Target, log: &mut JobLog) -> Result<(), JobError> {
        let spec = &self.config.provision;

        let clear = format!("rm -rf {}", shell_quote(&spec.remote_dir));
        self.run_stage(target, "provision", &clear, log)
            .await
            .map_err(|reason| JobError::provision(&target.id, reason))?;

        info!("Uploading {} to {}:{}", spec.payload_dir.display(), target, spec.remote_dir);
        self.shell
            .upload(target, &spec.payload_dir, &spec.remote_dir)
            .await
            .map_err(|e| JobError::provision(&target.id, format!("payload upload: {:#}", e)))?;
        log.note(format!("[provision] payload uploaded to {}", spec.remote_dir));

        self.run_stage(target, "provision", &spec.setup_script(), log)
            .await
            .map_err(|reason| JobError::provision(&target.id, reason))?;
        info!("{} provisioned", target);
        Ok(())
    }

    /// Remote script for one work item: run the harness, then upload the
    /// newest results directory whatever the harness exit status was.
    pub fn execute_script(&self, item: &WorkItem) -> String {
        let spec = &self.config.provision;
        let runs = format!("{}/{}", spec.remote_dir, RUNS_DIR_NAME);

        let mut invocation = vec![
            format!("\"$HOME\"/{}", shell_quote(&spec.harness_bin())),
            "run".to_string(),
            "--group".to_string(),
            shell_quote(&item.group),
        ];
        if let Some(config) = &item.config {
            invocation.push("--config".to_string());
            invocation.push(shell_quote(config));
        }
        for (class, bucket) in self.config.buckets.configured() {
            invocation.push(class.cli_flag().to_string());
            invocation.push(shell_quote(bucket));
        }
        if let Some(root) = &self.config.store_root {
            invocation.push("--store-root".to_string());
            invocation.push(shell_quote(root));
        }
        invocation.push("--results-root".to_string());
        invocation.push(shell_quote(&spec.remote_dir));

        let mut lines = vec![
            invocation.join(" "),
            "run_status=$?".to_string(),
            format!("echo \"{}$run_status\"", RUN_STATUS_MARKER),
            "upload_status=0".to_string(),
            format!("results_dir=$(ls -td {}/*/ 2>/dev/null | head -n 1)", shell_quote(&runs)),
            "if [ -n \"$results_dir\" ]; then".to_string(),
            format!("  {} || upload_status=1", self.config.sink.upload_command("results_dir")),
            "else".to_string(),
            format!("  echo \"no results directory under {}\" >&2", runs),
            "  upload_status=1".to_string(),
            "fi".to_string(),
        ];
        if self.config.mode.clears_local_results() {
            lines.push(format!("rm -rf {}", shell_quote(&runs)));
        }
        lines.push("if [ \"$upload_status\" -ne 0 ]; then exit 90; fi".to_string());
        lines.push("exit $run_status".to_string());
        lines.join("\n")
    }

    /// Run one work item on an already provisioned target.
    ///
    /// `phase` advances to `Ran` once the harness succeeded and to `Done`
    /// once its results were uploaded.
    pub async fn execute(
        &self,
        target: &Target,
        item: &WorkItem,
        log: &mut JobLog,
        phase: &mut Phase,
    ) -> Result<(), JobError> {
        let script = self.execute_script(item);
        info!("Running {} on {}", item, target);
        let out = self
            .shell
            .exec(target, &script)
            .await
            .map_err(|e| JobError::execution(&target.id, format!("{:#}", e)))?;
        log.record("execute", &format!("fleetbench run {}", item), &out);

        let run_status = parse_run_status(&out.stdout);
        match run_status {
            Some(0) => *phase = Phase::Ran,
            Some(status) => {
                return Err(JobError::execution(&target.id, format!("benchmark {} exited with {}", item, status)));
            }
            None => {
                return Err(JobError::execution(
                    &target.id,
                    format!("benchmark {} did not start (exit {}): {}", item, out.status, out.stderr.trim()),
                ));
            }
        }
        if !out.success() {
            return Err(JobError::execution(
                &target.id,
                format!("results upload to {} failed", self.config.sink.destination()),
            ));
        }
        *phase = Phase::Done;
        info!("{} finished on {}, results in {}", item, target, self.config.sink.destination());
        Ok(())
    }

    /// Full lifecycle for one assignment. Never panics on remote failure;
    /// errors are folded into the outcome.
    pub async fn run_job(&self, assignment: &Assignment) -> JobOutcome {
        let target = &assignment.target;
        let mut outcome = JobOutcome::start(target, Some(&assignment.work_item));

        if let Err(e) = self.prepare(target, &mut outcome).await {
            outcome.fail(&e);
            return outcome;
        }

        let mut phase = outcome.phase_reached;
        let result = self
            .execute(target, &assignment.work_item, &mut outcome.log, &mut phase)
            .await;
        outcome.phase_reached = phase;
        match result {
            Ok(()) => outcome.succeeded = true,
            Err(e) => outcome.fail(&e),
        }
        outcome
    }

    /// Readiness and provisioning, advancing the outcome's phase
    pub async fn prepare(&self, target: &Target, outcome: &mut JobOutcome) -> Result<(), JobError> {
        self.wait_for_ready(target, &mut outcome.log).await?;
        outcome.phase_reached = Phase::Ready;
        self.provision(target, &mut outcome.log).await?;
        outcome.phase_reached = Phase::Provisioned;
        Ok(())
    }

    async fn run_stage(&self, target: &Target, stage: &str, command: &str, log: &mut JobLog) -> Result<(), String> {
        match self.shell.exec(target, command).await {
            Ok(out) => {
                log.record(stage, command, &out);
                if out.success() {
                    Ok(())
                } else {
                    warn!("{} on {} exited with {}", stage, target, out.status);
                    Err(format!("exit {}: {}", out.status, out.stderr.trim()))
                }
            }
            Err(e) => {
                log.note(format!("[{}] transport error: {:#}", stage, e));
                Err(format!("{:#}", e))
            }
        }
    }
}

/// Extract the harness exit status printed by the execute script
pub fn parse_run_status(stdout: &str) -> Option<i32> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(RUN_STATUS_MARKER))
        .and_then(|s| s.trim().parse().ok())
}
