// src/params.rs
//! Typed description of one concrete benchmark case.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::target::TargetClass;

/// Benchmark families; each has its own scenario file and operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Read,
    Write,
    Listing,
    Delete,
    Rename,
    /// Reads for a fixed runtime instead of a fixed amount of data
    ReadFixedDuration,
    /// Writes for a fixed runtime instead of a fixed amount of data
    WriteFixedDuration,
}

impl Group {
    pub const ALL: [Group; 7] = [
        Group::Read,
        Group::Write,
        Group::Listing,
        Group::Delete,
        Group::Rename,
        Group::ReadFixedDuration,
        Group::WriteFixedDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Read => "read",
            Group::Write => "write",
            Group::Listing => "listing",
            Group::Delete => "delete",
            Group::Rename => "rename",
            Group::ReadFixedDuration => "read_fixed_duration",
            Group::WriteFixedDuration => "write_fixed_duration",
        }
    }

    /// Groups whose operation consumes the objects it measures
    pub fn is_destructive(&self) -> bool {
        matches!(self, Group::Delete | Group::Rename)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Group::Read),
            "write" => Ok(Group::Write),
            "listing" | "list" => Ok(Group::Listing),
            "delete" => Ok(Group::Delete),
            "rename" => Ok(Group::Rename),
            "read_fixed_duration" => Ok(Group::ReadFixedDuration),
            "write_fixed_duration" => Ok(Group::WriteFixedDuration),
            other => bail!(
                "Unknown benchmark group '{}'. Supported: read, write, listing, delete, rename, \
                 read_fixed_duration, write_fixed_duration",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPattern {
    #[serde(alias = "sequential")]
    Seq,
    #[serde(alias = "random")]
    Rand,
}

impl fmt::Display for ReadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadPattern::Seq => "seq",
            ReadPattern::Rand => "rand",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingPattern {
    /// One level below the prefix
    List,
    /// Every object below the prefix
    Find,
}

impl fmt::Display for ListingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListingPattern::List => "list",
            ListingPattern::Find => "find",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseParams {
    pub name: String,
    pub group: Group,
    pub bucket_name: String,
    pub target_class: TargetClass,
    pub threads: usize,
    pub processes: usize,
    pub files: usize,
    pub rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoParams {
    #[serde(flatten)]
    pub base: BaseParams,
    pub file_size_bytes: u64,
    pub chunk_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadParams {
    #[serde(flatten)]
    pub io: IoParams,
    pub pattern: ReadPattern,
    pub block_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingParams {
    #[serde(flatten)]
    pub base: BaseParams,
    pub depth: u32,
    pub folders: u32,
    pub pattern: ListingPattern,
}

/// Reads that loop over the files until `runtime_secs` elapses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedReadParams {
    #[serde(flatten)]
    pub read: ReadParams,
    pub runtime_secs: u64,
}

/// One open object per worker, appended to in `chunk_size_bytes` writes
/// until `runtime_secs` elapses. `file_size_bytes` is 0: the size is
/// whatever the runtime allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedWriteParams {
    #[serde(flatten)]
    pub io: IoParams,
    pub runtime_secs: u64,
}

/// One fully expanded benchmark case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BenchmarkCase {
    Read(ReadParams),
    Write(IoParams),
    Listing(ListingParams),
    Delete(ListingParams),
    Rename(ListingParams),
    ReadFixedDuration(TimedReadParams),
    WriteFixedDuration(TimedWriteParams),
}

impl BenchmarkCase {
    pub fn base(&self) -> &BaseParams {
        match self {
            BenchmarkCase::Read(p) => &p.io.base,
            BenchmarkCase::Write(p) => &p.base,
            BenchmarkCase::Listing(p) | BenchmarkCase::Delete(p) | BenchmarkCase::Rename(p) => &p.base,
            BenchmarkCase::ReadFixedDuration(p) => &p.read.io.base,
            BenchmarkCase::WriteFixedDuration(p) => &p.io.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn group(&self) -> Group {
        self.base().group
    }

    pub fn io(&self) -> Option<&IoParams> {
        match self {
            BenchmarkCase::Read(p) => Some(&p.io),
            BenchmarkCase::Write(p) => Some(p),
            BenchmarkCase::ReadFixedDuration(p) => Some(&p.read.io),
            BenchmarkCase::WriteFixedDuration(p) => Some(&p.io),
            _ => None,
        }
    }

    pub fn read(&self) -> Option<&ReadParams> {
        match self {
            BenchmarkCase::Read(p) => Some(p),
            BenchmarkCase::ReadFixedDuration(p) => Some(&p.read),
            _ => None,
        }
    }

    /// Length of every round of a runtime-bounded case
    pub fn runtime_secs(&self) -> Option<u64> {
        match self {
            BenchmarkCase::ReadFixedDuration(p) => Some(p.runtime_secs),
            BenchmarkCase::WriteFixedDuration(p) => Some(p.runtime_secs),
            _ => None,
        }
    }

    pub fn listing(&self) -> Option<&ListingParams> {
        match self {
            BenchmarkCase::Listing(p) | BenchmarkCase::Delete(p) | BenchmarkCase::Rename(p) => Some(p),
            _ => None,
        }
    }

    pub fn file_size_bytes(&self) -> Option<u64> {
        self.io().map(|io| io.file_size_bytes)
    }

    /// Human-readable access pattern for reports
    pub fn pattern_label(&self) -> String {
        match self {
            BenchmarkCase::Read(p) => p.pattern.to_string(),
            BenchmarkCase::ReadFixedDuration(p) => p.read.pattern.to_string(),
            BenchmarkCase::Write(_) | BenchmarkCase::WriteFixedDuration(_) => "seq".to_string(),
            BenchmarkCase::Listing(p) | BenchmarkCase::Delete(p) | BenchmarkCase::Rename(p) => p.pattern.to_string(),
        }
    }

    /// Reject impossible cases; advisory relations only warn.
    pub fn validate(&self) -> Result<()> {
        let base = self.base();
        if base.threads == 0 || base.processes == 0 || base.files == 0 || base.rounds == 0 {
            bail!(
                "{}: threads, processes, files and rounds must be >= 1 (got {}/{}/{}/{})",
                base.name, base.threads, base.processes, base.files, base.rounds
            );
        }
        if let BenchmarkCase::WriteFixedDuration(p) = self {
            if p.io.chunk_size_bytes == 0 {
                bail!("{}: chunk size must be > 0", base.name);
            }
        } else if let Some(io) = self.io() {
            if io.file_size_bytes == 0 || io.chunk_size_bytes == 0 {
                bail!("{}: file and chunk sizes must be > 0", base.name);
            }
            if io.chunk_size_bytes > io.file_size_bytes {
                warn!("{}: chunk size {} exceeds file size {}", base.name, io.chunk_size_bytes, io.file_size_bytes);
            }
        }
        if self.runtime_secs() == Some(0) {
            bail!("{}: runtime must be >= 1 second", base.name);
        }
        if let Some(p) = self.read() {
            if p.block_size_bytes == 0 {
                bail!("{}: block size must be > 0", base.name);
            }
            if base.processes > 1 && base.files > 1 && base.files != base.processes * base.threads {
                warn!(
                    "{}: {} files for {} processes x {} threads; files are split unevenly",
                    base.name, base.files, base.processes, base.threads
                );
            }
        }
        Ok(())
    }
}
