// tests/configurator_tests.rs
// Case generation from the built-in scenario files and from an override directory

use std::collections::HashSet;
use tempfile::TempDir;

use fleetbench::configurator::{generate_cases, Dimensions, NameFilter};
use fleetbench::constants::MB;
use fleetbench::params::{BenchmarkCase, Group};
use fleetbench::target::{BucketMap, TargetClass};

fn regional_only() -> BucketMap {
    BucketMap {
        regional: Some("bench-regional".into()),
        ..Default::default()
    }
}

#[test]
fn test_builtin_case_counts_per_group() {
    let dims = Dimensions::default();
    let filter = NameFilter::default();
    let count = |group| {
        generate_cases(Some(group), None, &dims, &regional_only(), &filter)
            .unwrap()
            .len()
    };
    assert_eq!(count(Group::Read), 10);
    assert_eq!(count(Group::Write), 10);
    assert_eq!(count(Group::Listing), 5);
    assert_eq!(count(Group::Delete), 2);
    assert_eq!(count(Group::Rename), 2);
    assert_eq!(count(Group::ReadFixedDuration), 7);
    assert_eq!(count(Group::WriteFixedDuration), 6);

    let all = generate_cases(None, None, &dims, &regional_only(), &filter).unwrap();
    assert_eq!(all.len(), 42);
    let names: HashSet<&str> = all.iter().map(|c| c.name()).collect();
    assert_eq!(names.len(), all.len(), "case names must be unique");
}

#[test]
fn test_every_bucket_class_gets_its_own_cases() {
    let buckets = BucketMap {
        regional: Some("r".into()),
        zonal: Some("z".into()),
        hns: Some("h".into()),
    };
    let cases = generate_cases(
        Some(Group::Delete),
        None,
        &Dimensions::default(),
        &buckets,
        &NameFilter::default(),
    )
    .unwrap();
    assert_eq!(cases.len(), 6);
    let hns: Vec<_> = cases
        .iter()
        .filter(|c| c.base().target_class == TargetClass::Hns)
        .collect();
    assert_eq!(hns.len(), 2);
    assert!(hns.iter().all(|c| c.base().bucket_name == "h" && c.name().ends_with("_hns")));
}

#[test]
fn test_filter_selects_scenarios() {
    let filter = NameFilter::parse(&["read_seq,read_rand_multi_process"]);
    let cases = generate_cases(
        Some(Group::Read),
        None,
        &Dimensions::default(),
        &regional_only(),
        &filter,
    )
    .unwrap();
    let names: Vec<&str> = cases.iter().map(|c| c.name()).collect();
    assert_eq!(
        names,
        vec![
            "read_seq_1procs_1threads_128MB_file_16MB_block_regional",
            "read_rand_multi_process_4procs_1threads_128MB_file_16MB_block_regional",
            "read_rand_multi_process_4procs_4threads_128MB_file_16MB_block_regional",
        ]
    );
    assert_eq!(cases[2].base().files, 16);
}

#[test]
fn test_scenarios_dir_overrides_builtin() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("write.yaml"),
        "common:\n  rounds: 2\n  file_sizes_mb: [8]\n  chunk_sizes_mb: [4]\nscenarios:\n  - name: tiny_write\n",
    )
    .unwrap();

    let cases = generate_cases(
        Some(Group::Write),
        Some(dir.path()),
        &Dimensions::default(),
        &regional_only(),
        &NameFilter::default(),
    )
    .unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].name(), "tiny_write_1procs_1threads_8MB_file_4MB_chunk_regional");
    let BenchmarkCase::Write(p) = &cases[0] else { panic!("not a write case") };
    assert_eq!(p.file_size_bytes, 8 * MB);
    assert_eq!(p.chunk_size_bytes, 4 * MB);
    assert_eq!(p.base.rounds, 2);

    // Groups without an override file fall back to the built-in scenarios
    let listing = generate_cases(
        Some(Group::Listing),
        Some(dir.path()),
        &Dimensions::default(),
        &regional_only(),
        &NameFilter::default(),
    )
    .unwrap();
    assert_eq!(listing.len(), 5);
}

#[test]
fn test_environment_dimensions_override_scenarios() {
    let dims = Dimensions::from_lookup(|key| match key {
        "FLEETBENCH_NUM_FILES" => Some("10 20".to_string()),
        "FLEETBENCH_ROUNDS" => Some("1".to_string()),
        _ => None,
    })
    .unwrap();
    let cases = generate_cases(
        Some(Group::Rename),
        None,
        &dims,
        &regional_only(),
        &NameFilter::parse(&["rename_flat"]),
    )
    .unwrap();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].base().files, 10);
    assert_eq!(cases[1].base().files, 20);
    assert!(cases.iter().all(|c| c.base().rounds == 1));
}

fn sweep_dimensions() -> Dimensions {
    Dimensions::from_lookup(|key| match key {
        "FLEETBENCH_THREADS" => Some("1,2".to_string()),
        "FLEETBENCH_PROCESSES" => Some("1,2".to_string()),
        "FLEETBENCH_FILE_SIZES_MB" => Some("1,2,3".to_string()),
        _ => None,
    })
    .unwrap()
}

#[test]
fn test_cross_product_counts_and_unique_names() {
    let cases = generate_cases(
        Some(Group::Read),
        None,
        &sweep_dimensions(),
        &regional_only(),
        &NameFilter::parse(&["read_seq"]),
    )
    .unwrap();
    // 2 threads x 2 processes x 3 file sizes, one block size, one bucket
    assert_eq!(cases.len(), 12);
    let names: HashSet<&str> = cases.iter().map(|c| c.name()).collect();
    assert_eq!(names.len(), 12);
    assert!(names.contains("read_seq_2procs_2threads_3MB_file_16MB_block_regional"));

    let sizes: HashSet<u64> = cases.iter().filter_map(|c| c.file_size_bytes()).collect();
    assert_eq!(sizes, HashSet::from([MB, 2 * MB, 3 * MB]));
    let shapes: HashSet<(usize, usize)> = cases.iter().map(|c| (c.base().threads, c.base().processes)).collect();
    assert_eq!(shapes.len(), 4);
}

#[test]
fn test_generation_is_repeatable() {
    let buckets = BucketMap {
        regional: Some("r".into()),
        zonal: Some("z".into()),
        hns: Some("h".into()),
    };
    let generate = || {
        generate_cases(None, None, &sweep_dimensions(), &buckets, &NameFilter::default()).unwrap()
    };
    let first = generate();
    assert!(!first.is_empty());
    assert_eq!(first, generate());
}
