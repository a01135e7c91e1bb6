// src/harness/fixtures.rs
//
// Per-case setup and teardown under a unique prefix.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::IndexedRandom;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::ops::random_bytes;
use crate::constants::{MB, SETUP_CONCURRENCY, SETUP_MAX_CHUNK, SETUP_SMALL_FILE_CONCURRENCY};
use crate::params::{BenchmarkCase, Group};
use crate::store::{join_key, ObjectStore};

/// Objects a case works on. Everything lives below `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub prefix: String,
    /// Folders of the listing tree, `prefix` first
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

impl Fixture {
    /// Where rename cases move the tree
    pub fn renamed_prefix(&self) -> String {
        format!("{}_renamed", self.prefix)
    }
}

/// `<bucket>/benchmark-<group>-<uuid>`
pub fn unique_prefix(bucket: &str, group: Group) -> String {
    format!("{}/benchmark-{}-{}", bucket.trim_end_matches('/'), group, Uuid::new_v4())
}

/// Random folder tree: folder `i` hangs off any existing folder whose depth
/// is at most `depth`; each file lands in a random folder.
pub fn random_tree(prefix: &str, folders: u32, depth: u32, files: usize) -> (Vec<String>, Vec<String>) {
    let mut rng = rand::rng();
    let mut candidates: Vec<(String, u32)> = vec![(prefix.to_string(), 0)];
    for i in 0..folders {
        let valid: Vec<&(String, u32)> = candidates.iter().filter(|(_, d)| *d <= depth).collect();
        // The root always qualifies
        let (parent, parent_depth) = match valid.choose(&mut rng) {
            Some(p) => ((*p).0.clone(), (*p).1),
            None => (prefix.to_string(), 0),
        };
        candidates.push((format!("{}/folder_{}", parent, i), parent_depth + 1));
    }
    let dirs: Vec<String> = candidates.into_iter().map(|(p, _)| p).collect();
    let file_paths = (0..files)
        .map(|i| {
            let folder = dirs.choose(&mut rng).map(String::as_str).unwrap_or(prefix);
            format!("{}/file_{}", folder, i)
        })
        .collect();
    (dirs, file_paths)
}

/// Write `paths` of `file_size` bytes each and verify the stored sizes.
/// Zero-byte files use a wide pool; sized files use chunks of at most 100 MiB.
pub async fn populate(store: Arc<dyn ObjectStore>, paths: &[String], file_size: u64) -> Result<()> {
    let (chunk, concurrency) = if file_size > 0 {
        (random_bytes(SETUP_MAX_CHUNK.min(file_size) as usize), SETUP_CONCURRENCY)
    } else {
        (Bytes::from_static(&[0u8]), SETUP_SMALL_FILE_CONCURRENCY.min(paths.len().max(1)))
    };

    let sem = Arc::new(Semaphore::new(concurrency));
    let mut futs = FuturesUnordered::new();
    for path in paths.iter().cloned() {
        let sem = sem.clone();
        let store = store.clone();
        let chunk = chunk.clone();
        futs.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.context("setup semaphore closed")?;
            store.put_chunked(&path, &chunk, file_size).await?;
            let actual = store.size(&path).await?;
            if actual != file_size {
                bail!(
                    "Data integrity check failed for {}. Expected size: {}, Actual size: {}",
                    path, file_size, actual
                );
            }
            Ok::<(), anyhow::Error>(())
        }));
    }
    while let Some(joined) = futs.next().await {
        joined.context("setup task panicked")??;
    }
    Ok(())
}

/// Create the objects `case` needs before its first round
pub async fn setup(store: Arc<dyn ObjectStore>, case: &BenchmarkCase, prefix: &str) -> Result<Fixture> {
    let base = case.base();
    let prefix = prefix.to_string();
    let start = Instant::now();

    let fixture = match case {
        BenchmarkCase::Read(_) | BenchmarkCase::ReadFixedDuration(_) => {
            let file_size = case.file_size_bytes().unwrap_or(0);
            let files: Vec<String> = (0..base.files).map(|i| join_key(&prefix, &format!("file_{}", i))).collect();
            info!(
                "Setting up benchmark '{}': creating {} file(s) of size {:.2} MB each.",
                base.name, files.len(), file_size as f64 / MB as f64
            );
            populate(store.clone(), &files, file_size).await?;
            Fixture { prefix, dirs: Vec::new(), files }
        }
        BenchmarkCase::Write(p) => {
            info!(
                "Setting up benchmark '{}': targeting {} file(s) of size {:.2} MB each.",
                base.name, base.files, p.file_size_bytes as f64 / MB as f64
            );
            store.mkdir(&prefix).await?;
            Fixture { prefix, dirs: Vec::new(), files: Vec::new() }
        }
        BenchmarkCase::WriteFixedDuration(p) => {
            info!(
                "Setting up benchmark '{}': targeting {} file(s) written for {}s each.",
                base.name, base.files, p.runtime_secs
            );
            store.mkdir(&prefix).await?;
            Fixture { prefix, dirs: Vec::new(), files: Vec::new() }
        }
        BenchmarkCase::Listing(p) | BenchmarkCase::Delete(p) | BenchmarkCase::Rename(p) => {
            let (dirs, files) = random_tree(&prefix, p.folders, p.depth, base.files);
            info!(
                "Setting up benchmark '{}': creating {} files distributed across {} folders at depth {}.",
                base.name, files.len(), dirs.len() - 1, p.depth
            );
            let fixture = Fixture { prefix, dirs, files };
            build_tree(store.clone(), &fixture).await?;
            fixture
        }
    };

    info!(
        "Benchmark '{}' setup finished in {:.2} ms.",
        base.name,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(fixture)
}

/// Recreate the listing tree of `fixture` (folders, then zero-byte files)
pub async fn build_tree(store: Arc<dyn ObjectStore>, fixture: &Fixture) -> Result<()> {
    for dir in &fixture.dirs {
        store.mkdir(dir).await?;
    }
    populate(store, &fixture.files, 0).await
}

/// Remove what a previous round of a destructive case left behind and
/// rebuild the tree. Runs outside the timed window.
pub async fn repopulate(store: Arc<dyn ObjectStore>, fixture: &Fixture) -> Result<()> {
    for leftover in [fixture.prefix.clone(), fixture.renamed_prefix()] {
        // Absent after a delete round; not an error
        let _ = store.delete_recursive(&leftover).await;
    }
    build_tree(store, fixture).await
}

/// Best effort: failures are logged, never returned
pub async fn teardown(store: &dyn ObjectStore, case: &BenchmarkCase, fixture: &Fixture) {
    info!("Tearing down benchmark '{}': deleting files.", case.name());
    let mut targets = vec![fixture.prefix.clone()];
    if case.group().is_destructive() {
        targets.push(fixture.renamed_prefix());
    }
    for target in targets {
        if let Err(e) = store.delete_recursive(&target).await {
            // Destructive rounds leave one of the two prefixes absent
            if case.group().is_destructive() {
                debug!("Nothing to clean up under {}: {:#}", target, e);
            } else {
                error!("Failed to clean up benchmark files under {}: {:#}", target, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_prefix_shape() {
        let a = unique_prefix("bucket/", Group::Listing);
        let b = unique_prefix("bucket", Group::Listing);
        assert!(a.starts_with("bucket/benchmark-listing-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_tree_respects_depth() {
        let (dirs, files) = random_tree("b/p", 50, 2, 200);
        assert_eq!(dirs.len(), 51);
        assert_eq!(files.len(), 200);
        for d in &dirs {
            let nesting = d.trim_start_matches("b/p").matches("/folder_").count();
            assert!(nesting <= 3, "{} nested too deep", d);
        }
        assert!(files.iter().all(|f| f.starts_with("b/p")));
    }

    #[test]
    fn test_flat_tree_without_folders() {
        let (dirs, files) = random_tree("b/p", 0, 0, 3);
        assert_eq!(dirs, vec!["b/p".to_string()]);
        assert_eq!(files, vec!["b/p/file_0", "b/p/file_1", "b/p/file_2"]);
    }
}
