// src/store/mod.rs
//
// Object store abstraction the harness measures against.
//
// Paths are bucket-relative keys: "<bucket>/<prefix>/<object>". Only a
// local filesystem backend ships; cloud protocols plug in behind the trait.

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

mod local;

pub use local::LocalStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `path` of `total` bytes by writing `chunk` repeatedly; the
    /// last write is truncated. Returns the bytes written.
    async fn put_chunked(&self, path: &str, chunk: &Bytes, total: u64) -> Result<u64>;

    /// Create `path` and append `chunk` to it until `deadline` passes.
    /// Returns the bytes written.
    async fn put_until(&self, path: &str, chunk: &Bytes, deadline: Instant) -> Result<u64>;

    /// Size of the object at `path`
    async fn size(&self, path: &str) -> Result<u64>;

    /// Up to `len` bytes starting at `offset`; shorter at end of object
    async fn read_range(&self, path: &str, offset: u64, len: u64) -> Result<Bytes>;

    /// Create an empty "directory" marker for `path`
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Direct children (objects and folders) of `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Every object below `prefix`, recursively
    async fn find(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `prefix` and everything below it
    async fn delete_recursive(&self, prefix: &str) -> Result<()>;

    /// Move `from` and everything below it to `to`
    async fn rename(&self, from: &str, to: &str) -> Result<()>;
}

/// Open the store behind `uri` (`file:///root` or a plain directory path)
pub fn open_store(uri: &str) -> Result<Arc<dyn ObjectStore>> {
    if let Some((scheme, _)) = uri.split_once("://") {
        if scheme != "file" {
            bail!("Unsupported store URI scheme '{}://' (only file:// is built in)", scheme);
        }
    }
    Ok(Arc::new(LocalStore::new(uri)?))
}

/// Join key segments with single slashes
pub fn join_key(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_rejects_cloud_schemes() {
        assert!(open_store("gs://bucket").is_err());
        assert!(open_store("file:///tmp/fleetbench-store").is_ok());
        assert!(open_store("/tmp/fleetbench-store").is_ok());
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("b/", "/x"), "b/x");
        assert_eq!(join_key("b/p", "f_0"), "b/p/f_0");
    }
}
