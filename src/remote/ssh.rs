// src/remote/ssh.rs
//! Direct SSH transport built on libssh2.
//!
//! Each call opens its own session on tokio's blocking pool, so concurrent
//! fleet jobs never share a channel.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ssh2::Session;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{is_payload_excluded, shell_quote, CommandOutput, RemoteShell};
use crate::target::Target;

#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote user; `$USER` when unset
    pub user: Option<String>,
    /// Private key; `~/.ssh/id_rsa` when unset
    pub key_path: Option<String>,
    /// Connect, handshake and authentication timeout in seconds. Commands
    /// themselves run without a limit.
    pub timeout: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            key_path: None,
            timeout: 30,
        }
    }
}

/// One authenticated libssh2 session
pub struct SshSession {
    session: Session,
    host: String,
}

impl SshSession {
    /// Connect to `host` (`host` or `host:port`)
    pub fn connect(host: &str, ssh_config: &SshConfig) -> Result<Self> {
        let user = ssh_config.user.clone().unwrap_or_else(|| {
            std::env::var("USER").unwrap_or_else(|_| "ubuntu".to_string())
        });

        let addr = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:22", host)
        };

        debug!("Connecting to {}@{}", user, addr);

        let sock = addr
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", addr))?
            .next()
            .with_context(|| format!("No address for {}", addr))?;
        let tcp = TcpStream::connect_timeout(&sock, Duration::from_secs(ssh_config.timeout))
            .with_context(|| format!("Failed to connect to {}", addr))?;

        let mut sess = Session::new()?;
        sess.set_tcp_stream(tcp);
        sess.set_timeout((ssh_config.timeout * 1000) as u32);
        sess.handshake()?;

        let key_path = ssh_config.key_path.as_deref().unwrap_or("~/.ssh/id_rsa");
        let expanded_key = shellexpand::tilde(key_path);
        let key_file = Path::new(expanded_key.as_ref());

        if !key_file.exists() {
            bail!("SSH key not found: {}", key_file.display());
        }

        sess.userauth_pubkey_file(&user, None, key_file, None)
            .context("SSH authentication failed")?;

        if !sess.authenticated() {
            bail!("SSH authentication failed for {}@{}", user, addr);
        }
        // Remote setup and benchmark runs can stay silent for minutes
        sess.set_timeout(0);

        Ok(SshSession {
            session: sess,
            host: addr,
        })
    }

    /// Execute command, capturing both streams and the exit status
    pub fn exec(&self, cmd: &str) -> Result<CommandOutput> {
        debug!("SSH exec on {}: {}", self.host, cmd);

        let mut channel = self.session.channel_session()?;
        channel.exec(cmd)?;

        // Both streams are drained together so a chatty stderr cannot fill
        // its window while stdout is being read
        self.session.set_blocking(false);
        let drained = {
            let mut out = channel.stream(0);
            let mut err = channel.stderr();
            drain_streams(&mut out, &mut err, || channel.eof(), DRAIN_IDLE)
        };
        self.session.set_blocking(true);
        let (stdout, stderr) = drained.with_context(|| format!("Failed to read output from {}", self.host))?;

        channel.wait_close()?;
        let status = channel.exit_status()?;

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Copy a local tree below `remote_dir`, creating directories first
    pub fn upload_tree(&self, local: &Path, remote_dir: &str) -> Result<usize> {
        let mut dirs = Vec::new();
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        let walker = WalkDir::new(local).into_iter().filter_entry(|e| {
            e.depth() == 0 || !is_payload_excluded(&e.file_name().to_string_lossy())
        });
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", local.display()))?;
            let rel = entry.path().strip_prefix(local)?;
            let remote = if rel.as_os_str().is_empty() {
                remote_dir.to_string()
            } else {
                format!("{}/{}", remote_dir.trim_end_matches('/'), rel.to_string_lossy())
            };
            if entry.file_type().is_dir() {
                dirs.push(remote);
            } else if entry.file_type().is_file() {
                files.push((entry.path().to_path_buf(), remote));
            }
        }

        let mkdir = format!(
            "mkdir -p {}",
            dirs.iter().map(|d| shell_quote(d)).collect::<Vec<_>>().join(" ")
        );
        let out = self.exec(&mkdir)?;
        if !out.success() {
            bail!("mkdir on {} failed: {}", self.host, out.stderr.trim());
        }

        for (path, remote) in &files {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mut channel = self
                .session
                .scp_send(Path::new(remote), 0o644, data.len() as u64, None)
                .with_context(|| format!("scp to {}:{} failed", self.host, remote))?;
            channel.write_all(&data)?;
            channel.send_eof()?;
            channel.wait_eof()?;
            channel.close()?;
            channel.wait_close()?;
        }

        Ok(files.len())
    }
}

/// Pause between polls when neither stream has data
const DRAIN_IDLE: Duration = Duration::from_millis(20);

/// Read two non-blocking streams until `eof` reports the channel closed and
/// neither stream yields more data.
fn drain_streams<O: Read, E: Read>(
    out: &mut O,
    err: &mut E,
    eof: impl Fn() -> bool,
    idle: Duration,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    loop {
        let got_out = read_available(out, &mut buf, &mut stdout)?;
        let got_err = read_available(err, &mut buf, &mut stderr)?;
        if got_out + got_err > 0 {
            continue;
        }
        if eof() {
            return Ok((stdout, stderr));
        }
        std::thread::sleep(idle);
    }
}

/// Bytes appended to `sink` by one read; `WouldBlock` counts as none
fn read_available<R: Read>(reader: &mut R, buf: &mut [u8], sink: &mut Vec<u8>) -> io::Result<usize> {
    match reader.read(buf) {
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => Ok(0),
        Err(e) => Err(e),
    }
}

/// `RemoteShell` over plain SSH; `network_location` is the host address.
#[derive(Debug, Clone, Default)]
pub struct SshShell {
    config: SshConfig,
}

impl SshShell {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&self, target: &Target, command: &str) -> Result<CommandOutput> {
        let host = target.network_location.clone();
        let config = self.config.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || {
            let session = SshSession::connect(&host, &config)?;
            session.exec(&command)
        })
        .await
        .context("SSH worker panicked")?
    }

    async fn upload(&self, target: &Target, local: &Path, remote_dir: &str) -> Result<()> {
        let host = target.network_location.clone();
        let config = self.config.clone();
        let local = local.to_path_buf();
        let remote_dir = remote_dir.to_string();
        let count = tokio::task::spawn_blocking(move || {
            let session = SshSession::connect(&host, &config)?;
            session.upload_tree(&local, &remote_dir)
        })
        .await
        .context("SSH worker panicked")??;
        info!("Uploaded {} files to {}", count, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// Replays scripted reads; `None` is a `WouldBlock`
    struct Scripted(VecDeque<Option<Vec<u8>>>);

    impl Scripted {
        fn new(steps: Vec<Option<&str>>) -> Self {
            Self(steps.into_iter().map(|s| s.map(|s| s.as_bytes().to_vec())).collect())
        }

        fn exhausted(&self) -> bool {
            self.0.is_empty()
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Some(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(None) => Err(io::Error::from(ErrorKind::WouldBlock)),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_drain_interleaves_streams_until_eof() {
        // stdout stays quiet while stderr keeps producing, as during a long build
        let mut out = Scripted::new(vec![None, None, None, None, Some("__FLEETBENCH_RUN_STATUS=0\n")]);
        let mut err = Scripted::new(vec![Some("Compiling a\n"), None, Some("Compiling b\n"), Some("Finished\n")]);
        let polls = Cell::new(0);
        let (stdout, stderr) = drain_streams(
            &mut out,
            &mut err,
            || {
                polls.set(polls.get() + 1);
                polls.get() > 3
            },
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(stdout, b"__FLEETBENCH_RUN_STATUS=0\n");
        assert_eq!(stderr, b"Compiling a\nCompiling b\nFinished\n");
        assert!(out.exhausted() && err.exhausted());
    }

    #[test]
    fn test_drain_keeps_reading_buffered_data_after_eof() {
        let mut out = Scripted::new(vec![Some("a"), Some("b")]);
        let mut err = Scripted::new(vec![]);
        let (stdout, _) = drain_streams(&mut out, &mut err, || true, Duration::ZERO).unwrap();
        assert_eq!(stdout, b"ab");
    }

    #[test]
    fn test_drain_surfaces_read_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(ErrorKind::ConnectionReset))
            }
        }
        let mut err = Scripted::new(vec![]);
        assert!(drain_streams(&mut Broken, &mut err, || false, Duration::ZERO).is_err());
    }
}
