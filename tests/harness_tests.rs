// tests/harness_tests.rs
// End-to-end harness runs against a local store in a temp directory

use std::path::Path;
use tempfile::TempDir;

use fleetbench::harness::{run_case, ExecutionMode, HarnessOptions};
use fleetbench::params::{
    BaseParams, BenchmarkCase, Group, IoParams, ListingParams, ListingPattern, ReadParams, ReadPattern,
    TimedReadParams, TimedWriteParams,
};
use fleetbench::report::ResultRecord;
use fleetbench::target::TargetClass;

const KB: u64 = 1024;

fn base(group: Group, threads: usize, processes: usize, files: usize, rounds: u32) -> BaseParams {
    BaseParams {
        name: format!("{}_it", group),
        group,
        bucket_name: "bench".into(),
        target_class: TargetClass::Regional,
        threads,
        processes,
        files,
        rounds,
    }
}

fn read_case(pattern: ReadPattern, threads: usize, processes: usize, files: usize) -> BenchmarkCase {
    BenchmarkCase::Read(ReadParams {
        io: IoParams {
            base: base(Group::Read, threads, processes, files, 2),
            file_size_bytes: 64 * KB,
            chunk_size_bytes: 64 * KB,
        },
        pattern,
        block_size_bytes: 16 * KB,
    })
}

fn timed_read_case(pattern: ReadPattern, threads: usize, processes: usize) -> BenchmarkCase {
    BenchmarkCase::ReadFixedDuration(TimedReadParams {
        read: ReadParams {
            io: IoParams {
                base: base(Group::ReadFixedDuration, threads, processes, threads * processes, 1),
                file_size_bytes: 32 * KB,
                chunk_size_bytes: 8 * KB,
            },
            pattern,
            block_size_bytes: 8 * KB,
        },
        runtime_secs: 1,
    })
}

fn tree_case(group: Group, pattern: ListingPattern, threads: usize, rounds: u32) -> BenchmarkCase {
    let params = ListingParams {
        base: base(group, threads, 1, 20, rounds),
        depth: 2,
        folders: 4,
        pattern,
    };
    match group {
        Group::Delete => BenchmarkCase::Delete(params),
        Group::Rename => BenchmarkCase::Rename(params),
        _ => BenchmarkCase::Listing(params),
    }
}

fn options(root: &TempDir) -> HarnessOptions {
    HarnessOptions::new(format!("file://{}", root.path().display()))
}

/// Nothing but empty directories may remain in the bucket
fn assert_torn_down(root: &Path) {
    let bucket = root.join("bench");
    if !bucket.exists() {
        return;
    }
    let leftovers: Vec<_> = walkdir::WalkDir::new(&bucket)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert!(leftovers.is_empty(), "files left behind: {:?}", leftovers);
    let entries = std::fs::read_dir(&bucket).unwrap().count();
    assert_eq!(entries, 0, "prefix left behind in {}", bucket.display());
}

#[test]
fn test_single_threaded_sequential_read() {
    let root = TempDir::new().unwrap();
    let case = read_case(ReadPattern::Seq, 1, 1, 1);
    let result = run_case(&case, &options(&root)).unwrap();

    assert_eq!(result.mode, ExecutionMode::SingleThreaded);
    assert_eq!(result.round_durations_s.len(), 2);
    // One unit per round
    assert_eq!(result.latency.count, 2);
    let record = ResultRecord::derive(&result).unwrap();
    assert!(record.max_throughput_mb_s.unwrap() > 0.0);
    assert_eq!(record.block_size, Some(16 * KB));
    assert_eq!(result.round_bytes, vec![64 * KB, 64 * KB]);
    assert_torn_down(root.path());
}

#[test]
fn test_multi_threaded_random_read_on_one_file() {
    let root = TempDir::new().unwrap();
    let case = read_case(ReadPattern::Rand, 4, 1, 1);
    let result = run_case(&case, &options(&root)).unwrap();

    assert_eq!(result.mode, ExecutionMode::MultiThreaded);
    // Every thread reads the one file, twice
    assert_eq!(result.latency.count, 8);
    assert_torn_down(root.path());
}

#[test]
fn test_multi_threaded_write() {
    let root = TempDir::new().unwrap();
    let case = BenchmarkCase::Write(IoParams {
        base: base(Group::Write, 2, 1, 4, 3),
        file_size_bytes: 40 * KB,
        chunk_size_bytes: 16 * KB,
    });
    let result = run_case(&case, &options(&root)).unwrap();

    assert_eq!(result.round_durations_s.len(), 3);
    assert_eq!(result.latency.count, 12);
    let record = ResultRecord::derive(&result).unwrap();
    assert_eq!(record.chunk_size, Some(16 * KB));
    assert_torn_down(root.path());
}

#[test]
fn test_listing_list_and_find() {
    for pattern in [ListingPattern::List, ListingPattern::Find] {
        let root = TempDir::new().unwrap();
        let case = tree_case(Group::Listing, pattern, 2, 2);
        let result = run_case(&case, &options(&root)).unwrap();

        assert_eq!(result.mode, ExecutionMode::MultiThreaded);
        // One listing per worker per round
        assert_eq!(result.latency.count, 4);
        let record = ResultRecord::derive(&result).unwrap();
        assert_eq!(record.max_throughput_mb_s, None);
        assert_eq!(record.depth, Some(2));
        assert_torn_down(root.path());
    }
}

#[test]
fn test_delete_repopulates_between_rounds() {
    let root = TempDir::new().unwrap();
    let case = tree_case(Group::Delete, ListingPattern::List, 1, 3);
    let result = run_case(&case, &options(&root)).unwrap();

    assert_eq!(result.round_durations_s.len(), 3);
    assert_eq!(result.latency.count, 3);
    assert_torn_down(root.path());
}

#[test]
fn test_rename_cleans_both_prefixes() {
    let root = TempDir::new().unwrap();
    let case = tree_case(Group::Rename, ListingPattern::List, 1, 2);
    let result = run_case(&case, &options(&root)).unwrap();

    assert_eq!(result.round_durations_s.len(), 2);
    assert_torn_down(root.path());
}

#[test]
fn test_multi_process_read() {
    let root = TempDir::new().unwrap();
    let case = read_case(ReadPattern::Seq, 2, 2, 4);
    let mut opts = options(&root);
    opts.worker_exe = Some(env!("CARGO_BIN_EXE_fleetbench").into());
    let result = run_case(&case, &opts).unwrap();

    assert_eq!(result.mode, ExecutionMode::MultiProcess);
    // Four files split over two workers, two rounds
    assert_eq!(result.latency.count, 8);
    assert_torn_down(root.path());
}

#[test]
fn test_failed_round_still_tears_down() {
    let root = TempDir::new().unwrap();
    let case = read_case(ReadPattern::Seq, 2, 2, 2);
    let mut opts = options(&root);
    // Not a fleetbench binary: every worker fails
    opts.worker_exe = Some("/bin/false".into());

    assert!(run_case(&case, &opts).is_err());
    assert_torn_down(root.path());
}

#[test]
fn test_fixed_duration_read_runs_for_its_runtime() {
    for pattern in [ReadPattern::Seq, ReadPattern::Rand] {
        let root = TempDir::new().unwrap();
        let case = timed_read_case(pattern, 2, 1);
        let result = run_case(&case, &options(&root)).unwrap();

        assert_eq!(result.mode, ExecutionMode::MultiThreaded);
        assert!(result.round_durations_s[0] >= 1.0);
        // Two workers cycling over 32 KB files for a second read far more than one pass
        assert!(result.round_bytes[0] > 2 * 32 * KB);
        // One timed unit per worker
        assert_eq!(result.latency.count, 2);
        let record = ResultRecord::derive(&result).unwrap();
        assert_eq!(record.runtime, Some(1));
        assert!(record.max_throughput_mb_s.unwrap() > 0.0);
        assert_torn_down(root.path());
    }
}

#[test]
fn test_fixed_duration_write_appends_until_runtime() {
    let root = TempDir::new().unwrap();
    let case = BenchmarkCase::WriteFixedDuration(TimedWriteParams {
        io: IoParams {
            base: base(Group::WriteFixedDuration, 1, 1, 1, 1),
            file_size_bytes: 0,
            chunk_size_bytes: 4 * KB,
        },
        runtime_secs: 1,
    });
    let result = run_case(&case, &options(&root)).unwrap();

    assert_eq!(result.mode, ExecutionMode::SingleThreaded);
    let written = result.round_bytes[0];
    assert!(written > 0 && written % (4 * KB) == 0);
    let record = ResultRecord::derive(&result).unwrap();
    assert_eq!(record.runtime, Some(1));
    assert_eq!(record.max_throughput_mb_s, Some(written as f64 / (1024.0 * 1024.0)));
    assert_torn_down(root.path());
}

#[test]
fn test_multi_process_fixed_duration_read_sums_worker_bytes() {
    let root = TempDir::new().unwrap();
    let case = timed_read_case(ReadPattern::Seq, 1, 2);
    let mut opts = options(&root);
    opts.worker_exe = Some(env!("CARGO_BIN_EXE_fleetbench").into());
    let result = run_case(&case, &opts).unwrap();

    assert_eq!(result.mode, ExecutionMode::MultiProcess);
    assert_eq!(result.latency.count, 2);
    assert!(result.round_bytes[0] > 2 * 32 * KB);
    assert_torn_down(root.path());
}
