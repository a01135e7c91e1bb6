// src/main.rs
//
// -----------------------------------------------------------------------------
// fleetbench - in-process object-storage microbenchmark harness
// -----------------------------------------------------------------------------

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use fleetbench::check::{run_check, Verdict};
use fleetbench::configurator::{generate_cases, Dimensions, NameFilter};
use fleetbench::constants::DEFAULT_STORE_ROOT;
use fleetbench::harness::{self, multiprocess, HarnessOptions};
use fleetbench::logging;
use fleetbench::params::{BenchmarkCase, Group};
use fleetbench::report::{render_table, write_csv, FailedCase, RawResults, ResultRecord, RunDir, RunMetadata};
use fleetbench::target::BucketMap;

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(name = "fleetbench", version, about = "Object-storage microbenchmark harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Turn logging on explicitly (true/false); takes --log-level
    #[arg(long, global = true)]
    log: Option<String>,

    /// Level used with --log true: trace, debug, info, warning, error
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,
}

/// Which cases to generate
#[derive(Args)]
struct Selection {
    /// Benchmark group (read, write, listing, delete, rename, read_fixed_duration,
    /// write_fixed_duration); all groups when omitted
    #[arg(long)]
    group: Option<Group>,

    /// Scenario names to run; repeat the flag or separate names with commas
    #[arg(long = "config")]
    config: Vec<String>,

    #[arg(long = "regional-bucket")]
    regional_bucket: Option<String>,

    #[arg(long = "zonal-bucket")]
    zonal_bucket: Option<String>,

    #[arg(long = "hns-bucket")]
    hns_bucket: Option<String>,

    /// Directory with <group>.yaml files overriding the built-in scenarios
    #[arg(long = "scenarios-dir")]
    scenarios_dir: Option<PathBuf>,
}

impl Selection {
    fn buckets(&self) -> Result<BucketMap> {
        let buckets = BucketMap {
            regional: self.regional_bucket.clone(),
            zonal: self.zonal_bucket.clone(),
            hns: self.hns_bucket.clone(),
        };
        if buckets.is_empty() {
            bail!("At least one of --regional-bucket, --zonal-bucket or --hns-bucket is required");
        }
        Ok(buckets)
    }

    fn cases(&self) -> Result<Vec<BenchmarkCase>> {
        let buckets = self.buckets()?;
        let dims = Dimensions::from_env()?;
        let filter = NameFilter::parse(&self.config);
        generate_cases(self.group, self.scenarios_dir.as_deref(), &dims, &buckets, &filter)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the cases of a group and run them
    ///
    /// Examples:
    ///   fleetbench run --group read --regional-bucket bench-r
    ///   fleetbench run --group listing --config list_flat --zonal-bucket bench-z
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Directory receiving __run__/<timestamp>/
        #[arg(long = "results-root", default_value = ".")]
        results_root: PathBuf,

        /// Where buckets live (file:// URI or plain path)
        #[arg(long = "store-root", env = "FLEETBENCH_STORE_ROOT", default_value = DEFAULT_STORE_ROOT)]
        store_root: String,
    },
    /// Print the expanded case names without running anything
    ListCases {
        #[command(flatten)]
        selection: Selection,
    },
    /// Rebuild CSV and table from a results.json
    Report {
        #[arg(long)]
        raw: PathBuf,

        /// CSV destination; next to the raw file when omitted
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Compare measured durations against expected ones (exit 1 on regression)
    Check {
        #[arg(long, default_value = "expected_durations.json")]
        expected: PathBuf,

        /// results.json path or an inline JSON sample
        #[arg(long)]
        result: String,
    },
    /// Multi-process worker; reads its task from stdin
    #[command(hide = true)]
    InternalWorker {
        #[arg(long = "worker-id")]
        worker_id: usize,
    },
}

fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let level = logging::resolve_level(cli.verbose, cli.log.as_deref(), cli.log_level.as_deref())?;
    logging::init(&level)?;

    match cli.command {
        Commands::Run {
            selection,
            results_root,
            store_root,
        } => run_cmd(&selection, &results_root, &store_root),
        Commands::ListCases { selection } => list_cases_cmd(&selection),
        Commands::Report { raw, csv } => report_cmd(&raw, csv.as_deref()),
        Commands::Check { expected, result } => check_cmd(&expected, &result),
        Commands::InternalWorker { worker_id } => {
            let mut task_json = String::new();
            std::io::stdin()
                .read_to_string(&mut task_json)
                .context("Failed to read worker task from stdin")?;
            multiprocess::run_internal_worker(worker_id, &task_json)
        }
    }
}

// -----------------------------------------------------------------------------
// run
// -----------------------------------------------------------------------------
fn run_cmd(selection: &Selection, results_root: &Path, store_root: &str) -> Result<()> {
    let cases = selection.cases()?;
    if cases.is_empty() {
        bail!("No benchmark cases matched the selection");
    }
    info!("Generated {} benchmark cases", cases.len());

    let run_dir = RunDir::create(results_root)?;
    let group_label = selection
        .group
        .map(|g| g.to_string())
        .unwrap_or_else(|| "all".to_string());
    let buckets = selection
        .buckets()?
        .configured()
        .into_iter()
        .map(|(_, b)| b.to_string())
        .collect();
    let mut metadata = RunMetadata::new(group_label, selection.config.clone(), buckets);

    let opts = HarnessOptions::new(store_root);
    let start = Instant::now();
    let mut raw = RawResults::default();
    for (i, case) in cases.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, cases.len(), case.name());
        match harness::run_case(case, &opts) {
            Ok(result) => {
                result.latency.print(case.name());
                raw.results.push(result);
            }
            Err(e) => {
                error!("Case {} failed: {:#}", case.name(), e);
                raw.failed.push(FailedCase {
                    name: case.name().to_string(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    let records = run_dir.write_results(&raw)?;
    metadata.finalize(start.elapsed().as_secs_f64(), cases.len(), raw.failed.len());
    run_dir.write_metadata(&metadata)?;

    println!("{}", render_table(&records));
    println!("Results written to {}", run_dir.path().display());

    if !raw.failed.is_empty() {
        bail!("{} of {} cases failed", raw.failed.len(), cases.len());
    }
    Ok(())
}

fn list_cases_cmd(selection: &Selection) -> Result<()> {
    let cases = selection.cases()?;
    for case in &cases {
        println!("{}", case.name());
    }
    if cases.is_empty() {
        warn!("No benchmark cases matched the selection");
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// report / check
// -----------------------------------------------------------------------------
fn report_cmd(raw_path: &Path, csv: Option<&Path>) -> Result<()> {
    let raw = RawResults::load(raw_path)?;
    let records: Vec<ResultRecord> = raw.results.iter().filter_map(ResultRecord::derive).collect();
    let csv_path = match csv {
        Some(p) => p.to_path_buf(),
        None => {
            let dir = raw_path.parent().unwrap_or_else(|| Path::new("."));
            RunDir::open(dir).csv_path()
        }
    };
    write_csv(&records, &csv_path)?;

    println!("{}", render_table(&records));
    for failed in &raw.failed {
        println!("FAILED {}: {}", failed.name, failed.error);
    }
    println!("CSV written to {}", csv_path.display());
    Ok(())
}

fn check_cmd(expected: &Path, result: &str) -> Result<()> {
    let outcomes = run_check(expected, result)?;
    let mut exceeded = 0;
    for outcome in &outcomes {
        let key = outcome.sample.key();
        match outcome.verdict {
            Verdict::Within { allowed, .. } => {
                println!("OK   {}: {:.3}s (limit {:.3}s)", key, outcome.sample.duration_s, allowed);
            }
            Verdict::Exceeded { expected, allowed } => {
                exceeded += 1;
                println!(
                    "FAIL {}: {:.3}s exceeds limit {:.3}s (expected {:.3}s)",
                    key, outcome.sample.duration_s, allowed, expected
                );
            }
            Verdict::Unknown => println!("SKIP {}: no expected duration", key),
        }
    }
    if exceeded > 0 {
        bail!("{} duration(s) exceed the allowed limit", exceeded);
    }
    Ok(())
}
