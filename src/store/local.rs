// src/store/local.rs
//
// Local filesystem backend: buckets are directories below the root.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;
use walkdir::WalkDir;

use super::ObjectStore;

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// `root` like "file:///mnt/bench" or "/mnt/bench"; `~` is expanded
    pub fn new(root: &str) -> Result<Self> {
        let path_str = root.strip_prefix("file://").unwrap_or(root);
        if path_str.is_empty() {
            bail!("Empty store root");
        }
        let expanded = shellexpand::tilde(path_str).to_string();
        Ok(Self {
            root: PathBuf::from(expanded),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_path(&self, key: &str) -> PathBuf {
        let clean = key.trim_start_matches('/');
        if clean.is_empty() {
            return self.root.clone();
        }
        self.root.join(clean)
    }

    /// Create (or truncate) the file behind `key`, parents included
    async fn create(&self, key: &str) -> Result<(PathBuf, tokio::fs::File)> {
        let full_path = self.resolve_path(key);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = tokio::fs::File::create(&full_path)
            .await
            .with_context(|| format!("Failed to create {}", full_path.display()))?;
        Ok((full_path, file))
    }

    fn key_of(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_chunked(&self, path: &str, chunk: &Bytes, total: u64) -> Result<u64> {
        if chunk.is_empty() && total > 0 {
            bail!("Cannot write {} bytes from an empty chunk", total);
        }
        let (full_path, mut file) = self.create(path).await?;
        let mut written = 0u64;
        while written < total {
            let n = (total - written).min(chunk.len() as u64) as usize;
            file.write_all(&chunk[..n])
                .await
                .with_context(|| format!("Failed to write {}", full_path.display()))?;
            written += n as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn put_until(&self, path: &str, chunk: &Bytes, deadline: Instant) -> Result<u64> {
        if chunk.is_empty() {
            bail!("Cannot append from an empty chunk");
        }
        let (full_path, mut file) = self.create(path).await?;
        let mut written = 0u64;
        while Instant::now() < deadline {
            file.write_all(chunk)
                .await
                .with_context(|| format!("Failed to write {}", full_path.display()))?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn size(&self, path: &str) -> Result<u64> {
        let full_path = self.resolve_path(path);
        let metadata = tokio::fs::metadata(&full_path)
            .await
            .with_context(|| format!("Failed to stat {}", full_path.display()))?;
        Ok(metadata.len())
    }

    async fn read_range(&self, path: &str, offset: u64, len: u64) -> Result<Bytes> {
        let full_path = self.resolve_path(path);
        let mut file = tokio::fs::File::open(&full_path)
            .await
            .with_context(|| format!("Failed to open {}", full_path.display()))?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = BytesMut::with_capacity(len as usize);
        let mut reader = file.take(len);
        while reader.read_buf(&mut buf).await? > 0 {}
        Ok(buf.freeze())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        tokio::fs::create_dir_all(&full_path)
            .await
            .with_context(|| format!("Failed to create directory: {}", full_path.display()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let full_path = self.resolve_path(prefix);
        let mut entries = tokio::fs::read_dir(&full_path)
            .await
            .with_context(|| format!("Failed to list {}", full_path.display()))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(self.key_of(&entry.path()));
        }
        names.sort();
        Ok(names)
    }

    async fn find(&self, prefix: &str) -> Result<Vec<String>> {
        let full_path = self.resolve_path(prefix);
        let root = self.root.clone();
        let objects = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut objects = Vec::new();
            for entry in WalkDir::new(&full_path) {
                let entry = entry.with_context(|| format!("Failed to walk {}", full_path.display()))?;
                if entry.file_type().is_file() {
                    let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                    objects.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
            objects.sort();
            Ok(objects)
        })
        .await
        .context("find task panicked")??;
        Ok(objects)
    }

    async fn delete_recursive(&self, prefix: &str) -> Result<()> {
        let full_path = self.resolve_path(prefix);
        debug!("rm -r {}", full_path.display());
        let metadata = tokio::fs::metadata(&full_path)
            .await
            .with_context(|| format!("Failed to stat {}", full_path.display()))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&full_path).await
        } else {
            tokio::fs::remove_file(&full_path).await
        }
        .with_context(|| format!("Failed to delete {}", full_path.display()))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve_path(from);
        let dst = self.resolve_path(to);
        debug!("mv {} {}", src.display(), dst.display());
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create destination directory")?;
        }
        tokio::fs::rename(&src, &dst)
            .await
            .with_context(|| format!("Failed to rename {} to {}", src.display(), dst.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalStore {
        LocalStore::new(&format!("file://{}", dir.path().display())).unwrap()
    }

    #[tokio::test]
    async fn test_put_chunked_truncates_last_chunk() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let chunk = Bytes::from(vec![7u8; 4]);
        assert_eq!(s.put_chunked("b/p/obj", &chunk, 10).await.unwrap(), 10);
        assert_eq!(s.size("b/p/obj").await.unwrap(), 10);

        let tail = s.read_range("b/p/obj", 8, 4).await.unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[tokio::test]
    async fn test_put_until_writes_whole_chunks() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let chunk = Bytes::from(vec![1u8; 100]);
        let deadline = Instant::now() + std::time::Duration::from_millis(200);
        let written = s.put_until("b/p/timed", &chunk, deadline).await.unwrap();
        assert!(written >= 100);
        assert_eq!(written % 100, 0);
        assert_eq!(s.size("b/p/timed").await.unwrap(), written);

        // A passed deadline still leaves an empty object behind
        assert_eq!(s.put_until("b/p/late", &chunk, Instant::now()).await.unwrap(), 0);
        assert_eq!(s.size("b/p/late").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_find_rename_delete() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let chunk = Bytes::from_static(b"x");
        s.put_chunked("b/p/a", &chunk, 0).await.unwrap();
        s.put_chunked("b/p/sub/c", &chunk, 1).await.unwrap();

        assert_eq!(s.list("b/p").await.unwrap(), vec!["b/p/a", "b/p/sub"]);
        assert_eq!(s.find("b/p").await.unwrap(), vec!["b/p/a", "b/p/sub/c"]);

        s.rename("b/p", "b/p_renamed").await.unwrap();
        assert!(s.list("b/p").await.is_err());
        assert_eq!(s.find("b/p_renamed").await.unwrap().len(), 2);

        s.delete_recursive("b/p_renamed").await.unwrap();
        assert!(s.find("b/p_renamed").await.is_err());
    }
}
