// src/bin/controller.rs
//
// fleetbench-ctl: drives the harness on remote targets, either one work item
// per target in parallel (fleet) or a soak of trials on one target (sequence).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use fleetbench::job::{JobConfig, JobRunner, ProvisionSpec, ResultsSink, RetryPolicy};
use fleetbench::logging;
use fleetbench::orchestrator::{parse_work_items, run_fleet, run_sequence, RunMode, SequenceOptions, WorkItem};
use fleetbench::remote::{GcloudConfig, GcloudShell, RemoteShell, SshConfig, SshShell};
use fleetbench::target::{load_targets, parse_classes, parse_targets, BucketMap, Target, TargetClass};
use fleetbench::JobError;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    /// libssh2 straight to each target's address
    Ssh,
    /// `gcloud compute ssh|scp` by instance name
    Gcloud,
}

#[derive(Parser)]
#[command(name = "fleetbench-ctl", version, about = "Run fleetbench across a fleet of remote targets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    shared: Shared,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct Shared {
    #[arg(long, value_enum, default_value = "gcloud", global = true)]
    transport: Transport,

    #[arg(long = "ssh-user", env = "SSH_USER", global = true)]
    ssh_user: Option<String>,

    #[arg(long = "ssh-key", env = "SSH_KEY", global = true)]
    ssh_key: Option<String>,

    #[arg(long = "project", env = "PROJECT_ID", global = true)]
    project: Option<String>,

    #[arg(long = "zone", env = "ZONE", global = true)]
    zone: Option<String>,

    /// Reach instances through IAP (gcloud transport only)
    #[arg(long = "iap", global = true)]
    iap: bool,

    /// Source tree shipped to every target
    #[arg(long = "payload-dir", default_value = ".", global = true)]
    payload_dir: PathBuf,

    /// Destination on the target, relative to the login directory
    #[arg(long = "remote-dir", global = true)]
    remote_dir: Option<String>,

    /// Replaces the built-in setup script
    #[arg(long = "setup-command", global = true)]
    setup_command: Option<String>,

    #[arg(long = "ready-attempts", global = true)]
    ready_attempts: Option<u32>,

    #[arg(long = "ready-delay-secs", global = true)]
    ready_delay_secs: Option<u64>,

    #[arg(long = "regional-bucket", env = "REGIONAL_BUCKET", global = true)]
    regional_bucket: Option<String>,

    #[arg(long = "zonal-bucket", env = "ZONAL_BUCKET", global = true)]
    zonal_bucket: Option<String>,

    #[arg(long = "hns-bucket", env = "HNS_BUCKET", global = true)]
    hns_bucket: Option<String>,

    /// Store root the remote harness measures, e.g. a bucket mounted at file:///mnt/gcs
    #[arg(long = "store-root", env = "FLEETBENCH_STORE_ROOT", global = true)]
    store_root: Option<String>,

    /// Durable results location (gs:// URI or local directory)
    #[arg(long = "results-sink", env = "RESULTS_SINK", global = true)]
    results_sink: Option<String>,

    #[arg(long = "run-id", env = "RUN_ID", global = true)]
    run_id: Option<String>,

    /// Whitespace-separated `group[:config]` items
    #[arg(long = "work-items", env = "WORK_ITEMS", global = true)]
    work_items: Option<String>,

    /// Directory receiving the combined job log
    #[arg(long = "log-dir", global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// One work item per target, all targets at once; exit 1 if any job failed
    Fleet {
        /// Target list: one `id [address]` per line
        #[arg(long = "targets-file", env = "TARGETS_FILE")]
        targets_file: PathBuf,
    },
    /// Every work item in order on a single target; always exits 0
    Sequence {
        /// `id [address]` of the target
        #[arg(long, env = "TARGET")]
        target: String,

        /// Enabled bucket classes, e.g. "regional zonal"
        #[arg(long = "bucket-types", env = "BUCKET_TYPES")]
        bucket_types: Option<String>,

        /// Pause after every trial
        #[arg(long = "cooldown-secs")]
        cooldown_secs: Option<u64>,
    },
}

impl Shared {
    fn shell(&self) -> Result<Arc<dyn RemoteShell>> {
        let shell: Arc<dyn RemoteShell> = match self.transport {
            Transport::Ssh => Arc::new(SshShell::new(SshConfig {
                user: self.ssh_user.clone(),
                key_path: self.ssh_key.clone(),
                ..Default::default()
            })),
            Transport::Gcloud => {
                let (Some(project), Some(zone)) = (&self.project, &self.zone) else {
                    bail!("The gcloud transport needs PROJECT_ID and ZONE");
                };
                Arc::new(GcloudShell::new(GcloudConfig {
                    project: project.clone(),
                    zone: zone.clone(),
                    tunnel_through_iap: self.iap,
                }))
            }
        };
        Ok(shell)
    }

    fn buckets(&self) -> BucketMap {
        BucketMap {
            regional: self.regional_bucket.clone(),
            zonal: self.zonal_bucket.clone(),
            hns: self.hns_bucket.clone(),
        }
    }

    fn work_items(&self) -> Result<Vec<WorkItem>> {
        let spec = self.work_items.as_deref().context("WORK_ITEMS is not set")?;
        let items = parse_work_items(spec)?;
        if items.is_empty() {
            bail!("WORK_ITEMS is empty");
        }
        Ok(items)
    }

    fn run_id(&self) -> String {
        self.run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
    }

    fn job_config(&self, buckets: BucketMap, mode: RunMode) -> Result<JobConfig> {
        if buckets.is_empty() {
            bail!("At least one of REGIONAL_BUCKET, ZONAL_BUCKET or HNS_BUCKET must be set");
        }
        let sink = self.results_sink.as_deref().context("RESULTS_SINK is not set")?;

        let mut provision = ProvisionSpec::new(&self.payload_dir);
        if let Some(dir) = &self.remote_dir {
            provision.remote_dir = dir.clone();
        }
        provision.setup_command = self.setup_command.clone();

        let mut readiness = RetryPolicy::default();
        if let Some(attempts) = self.ready_attempts {
            readiness.attempts = attempts;
        }
        if let Some(secs) = self.ready_delay_secs {
            readiness.delay = Duration::from_secs(secs);
        }

        Ok(JobConfig {
            provision,
            sink: ResultsSink::new(sink, self.run_id()),
            buckets,
            store_root: self.store_root.clone(),
            mode,
            readiness,
        })
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init(logging::level_for_verbosity(cli.verbose))?;

    let code = match &cli.command {
        Commands::Fleet { targets_file } => fleet_cmd(&cli.shared, targets_file).await?,
        Commands::Sequence {
            target,
            bucket_types,
            cooldown_secs,
        } => sequence_cmd(&cli.shared, target, bucket_types.as_deref(), *cooldown_secs).await?,
    };
    std::process::exit(code);
}

async fn fleet_cmd(shared: &Shared, targets_file: &Path) -> Result<i32> {
    let targets = load_targets(targets_file)?;
    let work_items = shared.work_items()?;
    let config = shared.job_config(shared.buckets(), RunMode::Gating)?;
    info!("Results go to {}", config.sink.destination());
    let runner = JobRunner::new(shared.shell()?, config);

    let report = match run_fleet(&runner, &work_items, &targets).await {
        Ok(report) => report,
        Err(e @ JobError::ConfigMismatch { .. }) => {
            error!("{}; nothing launched", e);
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    persist_log(shared.log_dir.as_deref(), &runner, &report.combined_log());
    for outcome in report.outcomes.iter().filter(|o| !o.succeeded) {
        error!(
            "{} failed at phase {}: {}",
            outcome.target_id,
            outcome.phase_reached,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    info!(
        "{} of {} jobs succeeded",
        report.outcomes.len() - report.failures(),
        report.outcomes.len()
    );
    Ok(report.exit_code())
}

async fn sequence_cmd(
    shared: &Shared,
    target: &str,
    bucket_types: Option<&str>,
    cooldown_secs: Option<u64>,
) -> Result<i32> {
    let target = single_target(target)?;
    let work_items = shared.work_items()?;
    let enabled = match bucket_types {
        Some(spec) => parse_classes(spec)?,
        None => TargetClass::ALL.to_vec(),
    };
    let buckets = shared.buckets().restricted_to(&enabled);
    let config = shared.job_config(buckets, RunMode::BestEffort)?;
    let runner = JobRunner::new(shared.shell()?, config);

    let mut options = SequenceOptions::default();
    if let Some(secs) = cooldown_secs {
        options.cooldown = Duration::from_secs(secs);
    }

    let report = run_sequence(&runner, &work_items, &target, options).await;
    persist_log(shared.log_dir.as_deref(), &runner, &report.combined_log());
    if !report.provisioned {
        warn!("{} was never provisioned; no trials ran", target);
    }
    Ok(report.exit_code())
}

fn single_target(spec: &str) -> Result<Target> {
    let mut targets = parse_targets(spec)?;
    match targets.len() {
        1 => Ok(targets.remove(0)),
        n => bail!("TARGET must name exactly one target, got {}", n),
    }
}

/// The exit code never depends on the log file; a failed write is only reported.
fn persist_log(log_dir: Option<&Path>, runner: &JobRunner, combined: &str) {
    let Some(dir) = log_dir else {
        return;
    };
    match write_log(dir, &runner.config().sink.run_id, combined) {
        Ok(path) => info!("Combined log written to {}", path.display()),
        Err(e) => warn!("Combined log not saved: {:#}", e),
    }
}

fn write_log(dir: &Path, run_id: &str, combined: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("fleetbench-{}.log", run_id));
    std::fs::write(&path, combined).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
