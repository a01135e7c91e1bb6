// src/remote/gcloud.rs
//! Transport that drives `gcloud compute ssh|scp` for cloud instances
//! addressed by name.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{shell_quote, CommandOutput, RemoteShell, PAYLOAD_EXCLUDES};
use crate::target::Target;

#[derive(Debug, Clone)]
pub struct GcloudConfig {
    pub project: String,
    pub zone: String,
    /// Tunnel through IAP instead of external IPs
    pub tunnel_through_iap: bool,
}

#[derive(Debug, Clone)]
pub struct GcloudShell {
    config: GcloudConfig,
}

impl GcloudShell {
    pub fn new(config: GcloudConfig) -> Self {
        Self { config }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--project={}", self.config.project),
            format!("--zone={}", self.config.zone),
            "--quiet".to_string(),
        ];
        if self.config.tunnel_through_iap {
            args.push("--tunnel-through-iap".to_string());
        }
        args
    }

    /// Argument vector for `gcloud` running `command` on `target`
    pub fn ssh_args(&self, target: &Target, command: &str) -> Vec<String> {
        let mut args = vec!["compute".to_string(), "ssh".to_string(), target.network_location.clone()];
        args.extend(self.base_args());
        args.push(format!("--command={}", command));
        args
    }

    /// Argument vector for `gcloud` copying the file `local` to `remote_path`
    pub fn scp_args(&self, target: &Target, local: &Path, remote_path: &str) -> Vec<String> {
        let mut args = vec!["compute".to_string(), "scp".to_string()];
        args.extend(self.base_args());
        args.push(local.to_string_lossy().to_string());
        args.push(format!("{}:{}", target.network_location, remote_path));
        args
    }

    async fn ship_archive(&self, target: &Target, archive: &Path, remote_archive: &str, remote_dir: &str) -> Result<()> {
        let out = self.run(self.scp_args(target, archive, remote_archive)).await?;
        if !out.success() {
            bail!("gcloud scp to {} failed (exit {}): {}", target, out.status, out.stderr.trim());
        }
        let out = self.exec(target, &unpack_command(remote_archive, remote_dir)).await?;
        if !out.success() {
            bail!("Unpacking payload on {} failed (exit {}): {}", target, out.status, out.stderr.trim());
        }
        Ok(())
    }

    async fn run(&self, args: Vec<String>) -> Result<CommandOutput> {
        debug!("gcloud {}", args.join(" "));
        let output = Command::new("gcloud")
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute gcloud. Is the Cloud SDK installed?")?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// `tar` arguments packing `local` into `archive` without the excluded names
pub fn pack_args(local: &Path, archive: &Path) -> Vec<String> {
    let mut args = vec!["-czf".to_string(), archive.to_string_lossy().to_string()];
    args.extend(PAYLOAD_EXCLUDES.iter().map(|name| format!("--exclude={}", name)));
    args.push("-C".to_string());
    args.push(local.to_string_lossy().to_string());
    args.push(".".to_string());
    args
}

/// Remote command unpacking `archive` into `remote_dir` and removing it
pub fn unpack_command(archive: &str, remote_dir: &str) -> String {
    let dir = shell_quote(remote_dir);
    let archive = shell_quote(archive);
    format!("mkdir -p {dir} && tar -xzf {archive} -C {dir} && rm -f {archive}")
}

async fn pack_payload(local: &Path) -> Result<PathBuf> {
    let archive = std::env::temp_dir().join(format!("fleetbench-payload-{}.tar.gz", uuid::Uuid::new_v4().simple()));
    let output = Command::new("tar")
        .args(pack_args(local, &archive))
        .output()
        .await
        .context("Failed to execute tar")?;
    if !output.status.success() {
        bail!(
            "Packing {} failed: {}",
            local.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(archive)
}

#[async_trait]
impl RemoteShell for GcloudShell {
    async fn exec(&self, target: &Target, command: &str) -> Result<CommandOutput> {
        self.run(self.ssh_args(target, command)).await
    }

    async fn upload(&self, target: &Target, local: &Path, remote_dir: &str) -> Result<()> {
        let archive = pack_payload(local).await?;
        let remote_archive = format!("{}.payload.tar.gz", remote_dir.trim_end_matches('/'));
        let shipped = self.ship_archive(target, &archive, &remote_archive, remote_dir).await;
        if let Err(e) = std::fs::remove_file(&archive) {
            warn!("Failed to remove {}: {}", archive.display(), e);
        }
        shipped?;
        info!("Uploaded {} to {}:{}", local.display(), target, remote_dir);
        Ok(())
    }
}
