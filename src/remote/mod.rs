// src/remote/mod.rs
//! Remote command execution against fleet targets.
//!
//! The orchestrators only need two primitives from a transport: run a shell
//! command and copy a local tree over. Both are blocking from the caller's
//! point of view and may take minutes.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::target::Target;

pub mod gcloud;
pub mod ssh;

pub use gcloud::{GcloudConfig, GcloudShell};
pub use ssh::{SshConfig, SshShell};

/// Result of one remote command. A non-zero status is not an `Err`;
/// `Err` is reserved for transport failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` through the target's login shell.
    async fn exec(&self, target: &Target, command: &str) -> Result<CommandOutput>;

    /// Recursively copy `local` into `remote_dir` on the target.
    async fn upload(&self, target: &Target, local: &Path, remote_dir: &str) -> Result<()>;
}

/// Quote a value for POSIX `sh`.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Names never shipped to targets as part of the payload, at any depth.
pub(crate) const PAYLOAD_EXCLUDES: [&str; 3] = ["target", ".git", "__run__"];

pub(crate) fn is_payload_excluded(name: &str) -> bool {
    PAYLOAD_EXCLUDES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("read"), "read");
        assert_eq!(shell_quote("gs://bucket/a"), "gs://bucket/a");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_payload_excludes_build_output() {
        assert!(is_payload_excluded("target"));
        assert!(is_payload_excluded("__run__"));
        assert!(!is_payload_excluded("src"));
    }
}
