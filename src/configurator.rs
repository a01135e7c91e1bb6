// src/configurator.rs
//! Expand declarative scenarios into concrete benchmark cases.
//!
//! A scenario file has a `common` block and a list of `scenarios`. Every
//! scenario is crossed with every value of every dimension. Dimensions
//! come from the file and can be overridden through `FLEETBENCH_*`
//! environment variables.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::constants::*;
use crate::params::{
    BaseParams, BenchmarkCase, Group, IoParams, ListingParams, ListingPattern, ReadParams, ReadPattern,
    TimedReadParams, TimedWriteParams,
};
use crate::target::{BucketMap, TargetClass};

const BUILTIN_READ: &str = include_str!("../configs/read.yaml");
const BUILTIN_WRITE: &str = include_str!("../configs/write.yaml");
const BUILTIN_LISTING: &str = include_str!("../configs/listing.yaml");
const BUILTIN_DELETE: &str = include_str!("../configs/delete.yaml");
const BUILTIN_RENAME: &str = include_str!("../configs/rename.yaml");
const BUILTIN_READ_FIXED_DURATION: &str = include_str!("../configs/read_fixed_duration.yaml");
const BUILTIN_WRITE_FIXED_DURATION: &str = include_str!("../configs/write_fixed_duration.yaml");

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CommonConfig {
    #[serde(default)]
    pub rounds: Option<u32>,
    #[serde(default)]
    pub bucket_types: Option<Vec<TargetClass>>,
    #[serde(default)]
    pub file_sizes_mb: Option<Vec<u64>>,
    #[serde(default)]
    pub block_sizes_mb: Option<Vec<u64>>,
    #[serde(default)]
    pub chunk_sizes_mb: Option<Vec<u64>>,
    #[serde(default)]
    pub num_files: Option<Vec<u64>>,
    #[serde(default)]
    pub folders: Option<Vec<u64>>,
    /// Fixed-duration groups: seconds per round
    #[serde(default)]
    pub runtime: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub processes: Option<Vec<usize>>,
    #[serde(default)]
    pub threads: Option<Vec<usize>>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Listing family: folder nesting; defaults to `processes * threads - 1`
    #[serde(default)]
    pub depth: Option<u32>,
    /// Listing family: pins the folder count for this scenario
    #[serde(default)]
    pub folders: Option<u32>,
    /// Read: overrides the common block sizes for this scenario
    #[serde(default)]
    pub block_sizes_mb: Option<Vec<u64>>,
    /// Fixed-duration read: file count instead of `processes * threads`
    #[serde(default)]
    pub files: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeclaredConfig {
    #[serde(default)]
    pub common: CommonConfig,
    pub scenarios: Vec<Scenario>,
}

impl DeclaredConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse scenario YAML")
    }

    /// Scenario file for `group`: `<dir>/<group>.yaml` when present, else the built-in one
    pub fn load(group: Group, dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = dir {
            let path = dir.join(format!("{}.yaml", group));
            if path.exists() {
                let yaml = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                debug!("Using scenarios from {}", path.display());
                return Self::from_yaml(&yaml).with_context(|| format!("In {}", path.display()));
            }
        }
        Self::from_yaml(builtin_yaml(group))
    }
}

pub fn builtin_yaml(group: Group) -> &'static str {
    match group {
        Group::Read => BUILTIN_READ,
        Group::Write => BUILTIN_WRITE,
        Group::Listing => BUILTIN_LISTING,
        Group::Delete => BUILTIN_DELETE,
        Group::Rename => BUILTIN_RENAME,
        Group::ReadFixedDuration => BUILTIN_READ_FIXED_DURATION,
        Group::WriteFixedDuration => BUILTIN_WRITE_FIXED_DURATION,
    }
}

/// Environment overrides for the expansion dimensions. `None` keeps the
/// value declared in the scenario file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    pub processes: Option<Vec<usize>>,
    pub threads: Option<Vec<usize>>,
    pub file_sizes_mb: Option<Vec<u64>>,
    pub block_sizes_mb: Option<Vec<u64>>,
    pub chunk_sizes_mb: Option<Vec<u64>>,
    pub bucket_types: Option<Vec<TargetClass>>,
    pub num_files: Option<Vec<u64>>,
    pub folders: Option<Vec<u64>>,
    pub rounds: Option<u32>,
    pub runtime: Option<u64>,
}

impl Dimensions {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            processes: get(ENV_PROCESSES).map(|v| parse_list(ENV_PROCESSES, &v)).transpose()?,
            threads: get(ENV_THREADS).map(|v| parse_list(ENV_THREADS, &v)).transpose()?,
            file_sizes_mb: get(ENV_FILE_SIZES_MB).map(|v| parse_list(ENV_FILE_SIZES_MB, &v)).transpose()?,
            block_sizes_mb: get(ENV_BLOCK_SIZES_MB).map(|v| parse_list(ENV_BLOCK_SIZES_MB, &v)).transpose()?,
            chunk_sizes_mb: get(ENV_CHUNK_SIZES_MB).map(|v| parse_list(ENV_CHUNK_SIZES_MB, &v)).transpose()?,
            bucket_types: get(ENV_BUCKET_TYPES)
                .map(|v| crate::target::parse_classes(&v))
                .transpose()
                .with_context(|| format!("Invalid {}", ENV_BUCKET_TYPES))?,
            num_files: get(ENV_NUM_FILES).map(|v| parse_list(ENV_NUM_FILES, &v)).transpose()?,
            folders: get(ENV_FOLDERS).map(|v| parse_list(ENV_FOLDERS, &v)).transpose()?,
            rounds: get(ENV_ROUNDS)
                .map(|v| v.trim().parse::<u32>().with_context(|| format!("Invalid {}: '{}'", ENV_ROUNDS, v)))
                .transpose()?,
            runtime: get(ENV_RUNTIME)
                .map(|v| v.trim().parse::<u64>().with_context(|| format!("Invalid {}: '{}'", ENV_RUNTIME, v)))
                .transpose()?,
        })
    }
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|_| anyhow::anyhow!("Invalid {} entry '{}'", key, s)))
        .collect()
}

/// Case-insensitive allow-list of scenario names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    names: Vec<String>,
}

impl NameFilter {
    /// Build from values that may each hold comma-separated names
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Self {
        let names = values
            .iter()
            .flat_map(|v| v.as_ref().split(',').map(|s| s.trim().to_lowercase()).collect::<Vec<_>>())
            .filter(|s| !s.is_empty())
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn allows(&self, scenario: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == &scenario.to_lowercase())
    }
}

fn non_empty<T: Clone>(what: &str, values: Vec<T>) -> Result<Vec<T>> {
    if values.is_empty() {
        bail!("dimension '{}' has no values", what);
    }
    Ok(values)
}

fn pick<T: Clone>(env: &Option<Vec<T>>, declared: &Option<Vec<T>>, default: &[T]) -> Vec<T> {
    env.clone()
        .or_else(|| declared.clone())
        .unwrap_or_else(|| default.to_vec())
}

/// Expand `declared` into the cross-product of all dimensions.
///
/// Pure: the same inputs always yield the same ordered list. Target
/// classes with no bucket in `buckets` are skipped.
pub fn expand(
    group: Group,
    declared: &DeclaredConfig,
    dims: &Dimensions,
    buckets: &BucketMap,
    filter: &NameFilter,
) -> Result<Vec<BenchmarkCase>> {
    let common = &declared.common;
    let classes = non_empty(
        "bucket_types",
        pick(&dims.bucket_types, &common.bucket_types, &[TargetClass::Regional]),
    )?;

    let mut cases = Vec::new();
    for scenario in declared.scenarios.iter().filter(|s| filter.allows(&s.name)) {
        let procs_list = non_empty("processes", pick(&dims.processes, &scenario.processes, &[1]))?;
        let threads_list = non_empty("threads", pick(&dims.threads, &scenario.threads, &[1]))?;

        match group {
            Group::Read => {
                let rounds = dims.rounds.or(common.rounds).unwrap_or(DEFAULT_ROUNDS_READ);
                let sizes = non_empty("file_sizes_mb", pick(&dims.file_sizes_mb, &common.file_sizes_mb, DEFAULT_READ_FILE_SIZES_MB))?;
                let declared_blocks = scenario.block_sizes_mb.clone().or_else(|| common.block_sizes_mb.clone());
                let blocks = non_empty("block_sizes_mb", pick(&dims.block_sizes_mb, &declared_blocks, DEFAULT_READ_BLOCK_SIZES_MB))?;
                let pattern = parse_read_pattern(scenario)?;

                for &procs in &procs_list {
                    for &threads in &threads_list {
                        for &size_mb in &sizes {
                            for &block_mb in &blocks {
                                for &class in &classes {
                                    let Some(bucket) = buckets.get(class) else { continue };
                                    let name = format!(
                                        "{}_{}procs_{}threads_{}MB_file_{}MB_block_{}",
                                        scenario.name, procs, threads, size_mb, block_mb, class
                                    );
                                    cases.push(BenchmarkCase::Read(ReadParams {
                                        io: IoParams {
                                            base: base(name, group, bucket, class, threads, procs, threads * procs, rounds),
                                            file_size_bytes: size_mb * MB,
                                            chunk_size_bytes: block_mb * MB,
                                        },
                                        pattern,
                                        block_size_bytes: block_mb * MB,
                                    }));
                                }
                            }
                        }
                    }
                }
            }
            Group::Write => {
                let rounds = dims.rounds.or(common.rounds).unwrap_or(DEFAULT_ROUNDS_WRITE);
                let sizes = non_empty("file_sizes_mb", pick(&dims.file_sizes_mb, &common.file_sizes_mb, DEFAULT_WRITE_FILE_SIZES_MB))?;
                let chunks = non_empty("chunk_sizes_mb", pick(&dims.chunk_sizes_mb, &common.chunk_sizes_mb, DEFAULT_WRITE_CHUNK_SIZES_MB))?;

                for &procs in &procs_list {
                    for &threads in &threads_list {
                        for &size_mb in &sizes {
                            for &chunk_mb in &chunks {
                                for &class in &classes {
                                    let Some(bucket) = buckets.get(class) else { continue };
                                    let name = format!(
                                        "{}_{}procs_{}threads_{}MB_file_{}MB_chunk_{}",
                                        scenario.name, procs, threads, size_mb, chunk_mb, class
                                    );
                                    cases.push(BenchmarkCase::Write(IoParams {
                                        base: base(name, group, bucket, class, threads, procs, threads * procs, rounds),
                                        file_size_bytes: size_mb * MB,
                                        chunk_size_bytes: chunk_mb * MB,
                                    }));
                                }
                            }
                        }
                    }
                }
            }
            Group::ReadFixedDuration => {
                let rounds = dims.rounds.or(common.rounds).unwrap_or(DEFAULT_ROUNDS_FIXED_DURATION);
                let runtime = dims.runtime.or(common.runtime).unwrap_or(DEFAULT_RUNTIME_SECS);
                let sizes = non_empty("file_sizes_mb", pick(&dims.file_sizes_mb, &common.file_sizes_mb, DEFAULT_READ_FILE_SIZES_MB))?;
                let declared_blocks = scenario.block_sizes_mb.clone().or_else(|| common.block_sizes_mb.clone());
                let blocks = non_empty("block_sizes_mb", pick(&dims.block_sizes_mb, &declared_blocks, DEFAULT_READ_BLOCK_SIZES_MB))?;
                let pattern = parse_read_pattern(scenario)?;

                for &procs in &procs_list {
                    for &threads in &threads_list {
                        let files = scenario.files.unwrap_or(threads * procs);
                        for &size_mb in &sizes {
                            for &block_mb in &blocks {
                                for &class in &classes {
                                    let Some(bucket) = buckets.get(class) else { continue };
                                    let name = format!(
                                        "{}_{}procs_{}threads_{}MB_file_{}MB_block_{}",
                                        scenario.name, procs, threads, size_mb, block_mb, class
                                    );
                                    cases.push(BenchmarkCase::ReadFixedDuration(TimedReadParams {
                                        read: ReadParams {
                                            io: IoParams {
                                                base: base(name, group, bucket, class, threads, procs, files, rounds),
                                                file_size_bytes: size_mb * MB,
                                                chunk_size_bytes: block_mb * MB,
                                            },
                                            pattern,
                                            block_size_bytes: block_mb * MB,
                                        },
                                        runtime_secs: runtime,
                                    }));
                                }
                            }
                        }
                    }
                }
            }
            Group::WriteFixedDuration => {
                let rounds = dims.rounds.or(common.rounds).unwrap_or(DEFAULT_ROUNDS_FIXED_DURATION);
                let runtime = dims.runtime.or(common.runtime).unwrap_or(DEFAULT_RUNTIME_SECS);
                let chunks = non_empty("chunk_sizes_mb", pick(&dims.chunk_sizes_mb, &common.chunk_sizes_mb, DEFAULT_WRITE_CHUNK_SIZES_MB))?;

                for &procs in &procs_list {
                    for &threads in &threads_list {
                        for &chunk_mb in &chunks {
                            for &class in &classes {
                                let Some(bucket) = buckets.get(class) else { continue };
                                let name = format!(
                                    "{}_{}procs_{}threads_{}MB_chunk_{}_{}s_duration",
                                    scenario.name, procs, threads, chunk_mb, class, runtime
                                );
                                cases.push(BenchmarkCase::WriteFixedDuration(TimedWriteParams {
                                    io: IoParams {
                                        base: base(name, group, bucket, class, threads, procs, threads * procs, rounds),
                                        file_size_bytes: 0,
                                        chunk_size_bytes: chunk_mb * MB,
                                    },
                                    runtime_secs: runtime,
                                }));
                            }
                        }
                    }
                }
            }
            Group::Listing | Group::Delete | Group::Rename => {
                let rounds = dims.rounds.or(common.rounds).unwrap_or(DEFAULT_ROUNDS_LISTING);
                let file_counts = non_empty("num_files", pick(&dims.num_files, &common.num_files, DEFAULT_LISTING_NUM_FILES))?;
                let declared_folders = scenario.folders.map(|f| vec![f as u64]).or_else(|| common.folders.clone());
                let folder_counts = non_empty("folders", pick(&dims.folders, &declared_folders, DEFAULT_LISTING_FOLDERS))?;
                let pattern = parse_listing_pattern(scenario)?;

                for &procs in &procs_list {
                    for &threads in &threads_list {
                        if group.is_destructive() && (procs > 1 || threads > 1) {
                            debug!("{}: {} runs single-threaded only, skipping {}x{}", scenario.name, group, procs, threads);
                            continue;
                        }
                        let depth = scenario
                            .depth
                            .unwrap_or_else(|| (threads * procs).saturating_sub(1) as u32);
                        for &num_files in &file_counts {
                            for &folders in &folder_counts {
                                for &class in &classes {
                                    let Some(bucket) = buckets.get(class) else { continue };
                                    let name = format!(
                                        "{}_{}procs_{}threads_{}files_{}depth_{}folders_{}",
                                        scenario.name, procs, threads, num_files, depth + 1, folders, class
                                    );
                                    let params = ListingParams {
                                        base: base(name, group, bucket, class, threads, procs, num_files as usize, rounds),
                                        depth,
                                        folders: folders as u32,
                                        pattern,
                                    };
                                    cases.push(match group {
                                        Group::Delete => BenchmarkCase::Delete(params),
                                        Group::Rename => BenchmarkCase::Rename(params),
                                        _ => BenchmarkCase::Listing(params),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    for case in &cases {
        case.validate()?;
    }
    if !cases.is_empty() {
        info!(
            "Benchmark cases to be triggered: {}",
            cases.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
        );
    }
    Ok(cases)
}

#[allow(clippy::too_many_arguments)]
fn base(
    name: String,
    group: Group,
    bucket: &str,
    class: TargetClass,
    threads: usize,
    processes: usize,
    files: usize,
    rounds: u32,
) -> BaseParams {
    BaseParams {
        name,
        group,
        bucket_name: bucket.to_string(),
        target_class: class,
        threads,
        processes,
        files,
        rounds,
    }
}

fn parse_read_pattern(scenario: &Scenario) -> Result<ReadPattern> {
    match scenario.pattern.as_deref().unwrap_or("seq") {
        "seq" | "sequential" => Ok(ReadPattern::Seq),
        "rand" | "random" => Ok(ReadPattern::Rand),
        other => bail!("scenario {}: unknown read pattern '{}'", scenario.name, other),
    }
}

fn parse_listing_pattern(scenario: &Scenario) -> Result<ListingPattern> {
    match scenario.pattern.as_deref().unwrap_or("list") {
        "list" | "ls" => Ok(ListingPattern::List),
        "find" => Ok(ListingPattern::Find),
        other => bail!("scenario {}: unknown listing pattern '{}'", scenario.name, other),
    }
}

/// Load, expand and concatenate the cases of one group, or of all groups.
pub fn generate_cases(
    group: Option<Group>,
    scenarios_dir: Option<&Path>,
    dims: &Dimensions,
    buckets: &BucketMap,
    filter: &NameFilter,
) -> Result<Vec<BenchmarkCase>> {
    let groups: Vec<Group> = match group {
        Some(g) => vec![g],
        None => Group::ALL.to_vec(),
    };
    let mut all = Vec::new();
    for g in groups {
        let declared = DeclaredConfig::load(g, scenarios_dir)?;
        all.extend(expand(g, &declared, dims, buckets, filter).with_context(|| format!("Expanding {} scenarios", g))?);
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regional() -> BucketMap {
        BucketMap {
            regional: Some("bench-regional".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_builtin_configs_parse() {
        for g in Group::ALL {
            let declared = DeclaredConfig::from_yaml(builtin_yaml(g)).unwrap();
            assert!(!declared.scenarios.is_empty(), "{} has no scenarios", g);
        }
    }

    #[test]
    fn test_read_names_and_sizes() {
        let declared = DeclaredConfig::from_yaml(
            "common: {file_sizes_mb: [128], block_sizes_mb: [16], bucket_types: [regional]}\n\
             scenarios: [{name: read_rand, pattern: rand, processes: [2], threads: [3]}]",
        )
        .unwrap();
        let cases = expand(Group::Read, &declared, &Dimensions::default(), &regional(), &NameFilter::default()).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name(), "read_rand_2procs_3threads_128MB_file_16MB_block_regional");
        let BenchmarkCase::Read(p) = &cases[0] else { panic!("not a read case") };
        assert_eq!(p.io.base.files, 6);
        assert_eq!(p.io.file_size_bytes, 128 * MB);
        assert_eq!(p.pattern, ReadPattern::Rand);
        assert_eq!(p.io.base.rounds, DEFAULT_ROUNDS_READ);
    }

    #[test]
    fn test_unconfigured_class_is_skipped() {
        let declared = DeclaredConfig::from_yaml(
            "common: {bucket_types: [regional, zonal]}\nscenarios: [{name: w}]",
        )
        .unwrap();
        let cases = expand(Group::Write, &declared, &Dimensions::default(), &regional(), &NameFilter::default()).unwrap();
        // default chunk sizes 64 and 100, zonal skipped
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.base().target_class == TargetClass::Regional));
    }

    #[test]
    fn test_listing_depth_defaults_to_workers_minus_one() {
        let declared = DeclaredConfig::from_yaml(
            "common: {num_files: [100], folders: [5]}\nscenarios: [{name: ls, processes: [2], threads: [2]}]",
        )
        .unwrap();
        let cases = expand(Group::Listing, &declared, &Dimensions::default(), &regional(), &NameFilter::default()).unwrap();
        let p = cases[0].listing().unwrap();
        assert_eq!(p.depth, 3);
        assert_eq!(cases[0].name(), "ls_2procs_2threads_100files_4depth_5folders_regional");
    }

    #[test]
    fn test_destructive_groups_single_threaded_only() {
        let declared = DeclaredConfig::from_yaml("scenarios: [{name: rm, threads: [1, 4]}]").unwrap();
        let cases = expand(Group::Delete, &declared, &Dimensions::default(), &regional(), &NameFilter::default()).unwrap();
        assert_eq!(cases.len(), 1);
        assert!(matches!(cases[0], BenchmarkCase::Delete(_)));
    }

    #[test]
    fn test_env_dimensions_override_declared() {
        let dims = Dimensions::from_lookup(|k| match k {
            ENV_THREADS => Some("1, 2".to_string()),
            ENV_FILE_SIZES_MB => Some("1,2,3".to_string()),
            ENV_ROUNDS => Some("4".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(dims.threads, Some(vec![1, 2]));
        assert_eq!(dims.rounds, Some(4));
        assert!(dims.processes.is_none());

        assert!(Dimensions::from_lookup(|k| (k == ENV_THREADS).then(|| "x".to_string())).is_err());
    }

    #[test]
    fn test_fixed_duration_read_files_override() {
        let declared = DeclaredConfig::from_yaml(
            "common: {runtime: 5, file_sizes_mb: [8], block_sizes_mb: [1]}\n\
             scenarios:\n\
             - {name: rfd, pattern: rand, processes: [2], threads: [2]}\n\
             - {name: rfd_one, pattern: seq, processes: [2], threads: [2], files: 1}",
        )
        .unwrap();
        let cases = expand(Group::ReadFixedDuration, &declared, &Dimensions::default(), &regional(), &NameFilter::default()).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name(), "rfd_2procs_2threads_8MB_file_1MB_block_regional");
        assert_eq!(cases[0].base().files, 4);
        assert_eq!(cases[1].base().files, 1);
        assert_eq!(cases[0].runtime_secs(), Some(5));
        assert_eq!(cases[0].base().rounds, DEFAULT_ROUNDS_FIXED_DURATION);
    }

    #[test]
    fn test_fixed_duration_write_names_and_runtime_override() {
        let declared = DeclaredConfig::from_yaml(
            "common: {chunk_sizes_mb: [64]}\nscenarios: [{name: wfd, processes: [1], threads: [2]}]",
        )
        .unwrap();
        let dims = Dimensions::from_lookup(|k| (k == ENV_RUNTIME).then(|| "12".to_string())).unwrap();
        let cases = expand(Group::WriteFixedDuration, &declared, &dims, &regional(), &NameFilter::default()).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name(), "wfd_1procs_2threads_64MB_chunk_regional_12s_duration");
        let BenchmarkCase::WriteFixedDuration(p) = &cases[0] else { panic!("not a timed write case") };
        assert_eq!(p.runtime_secs, 12);
        assert_eq!(p.io.file_size_bytes, 0);
        assert_eq!(p.io.base.files, 2);
    }

    #[test]
    fn test_filter_is_case_insensitive_and_comma_separated() {
        let filter = NameFilter::parse(&["Read_Seq,read_rand", " write_seq "]);
        assert!(filter.allows("read_seq"));
        assert!(filter.allows("WRITE_SEQ"));
        assert!(!filter.allows("listing"));
        assert!(NameFilter::default().allows("anything"));
    }
}
