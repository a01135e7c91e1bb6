// src/harness/monitor.rs
//
// Host resource sampling during the timed region of a case.
// CPU comes from /proc/stat deltas, memory from /proc/meminfo (Linux only).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// CPU time counters from /proc/stat
#[derive(Debug, Clone, Copy, Default)]
struct CpuTime {
    busy: u64,
    total: u64,
}

impl CpuTime {
    /// Parse the aggregate line: "cpu USER NICE SYSTEM IDLE IOWAIT IRQ SOFTIRQ STEAL ..."
    fn parse(content: &str) -> Result<Self> {
        let first_line = content.lines().next().context("Empty /proc/stat")?;
        if !first_line.starts_with("cpu ") {
            bail!("Invalid /proc/stat format");
        }
        let fields = first_line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| f.parse::<u64>().context("Invalid /proc/stat counter"))
            .collect::<Result<Vec<_>>>()?;
        if fields.len() < 8 {
            bail!("Insufficient fields in /proc/stat cpu line");
        }
        let total: u64 = fields.iter().sum();
        // idle + iowait count as not busy
        let busy = total - fields[3] - fields[4];
        Ok(CpuTime { busy, total })
    }

    fn read() -> Result<Self> {
        Self::parse(&fs::read_to_string("/proc/stat").context("Failed to read /proc/stat")?)
    }

    fn percent_since(&self, earlier: &CpuTime) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        self.busy.saturating_sub(earlier.busy) as f64 / total as f64 * 100.0
    }
}

/// Used memory in bytes: MemTotal - MemAvailable
fn parse_used_memory(meminfo: &str) -> Result<u64> {
    let field = |name: &str| -> Result<u64> {
        let line = meminfo
            .lines()
            .find(|l| l.starts_with(name))
            .with_context(|| format!("{} missing from /proc/meminfo", name))?;
        let kb: u64 = line
            .split_whitespace()
            .nth(1)
            .context("Malformed /proc/meminfo line")?
            .parse()
            .context("Invalid /proc/meminfo value")?;
        Ok(kb * 1024)
    };
    Ok(field("MemTotal:")?.saturating_sub(field("MemAvailable:")?))
}

fn read_used_memory() -> Result<u64> {
    parse_used_memory(&fs::read_to_string("/proc/meminfo").context("Failed to read /proc/meminfo")?)
}

/// Peak usage observed while the monitor ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePeaks {
    pub max_cpu_percent: f64,
    pub max_mem_bytes: u64,
}

impl ResourcePeaks {
    pub fn absorb(&mut self, other: &ResourcePeaks) {
        self.max_cpu_percent = self.max_cpu_percent.max(other.max_cpu_percent);
        self.max_mem_bytes = self.max_mem_bytes.max(other.max_mem_bytes);
    }
}

/// Background sampler thread; `stop` returns the peaks
pub struct ResourceMonitor {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<ResourcePeaks>>,
}

impl ResourceMonitor {
    pub fn start(interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = std::thread::Builder::new()
            .name("resource-monitor".into())
            .spawn(move || sample_loop(flag, interval))
            .map_err(|e| debug!("Resource monitor unavailable: {}", e))
            .ok();
        Self { running, handle }
    }

    pub fn stop(mut self) -> ResourcePeaks {
        self.running.store(false, Ordering::Relaxed);
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn sample_loop(running: Arc<AtomicBool>, interval: Duration) -> ResourcePeaks {
    let mut peaks = ResourcePeaks::default();
    let mut last = CpuTime::read().ok();
    peaks.max_mem_bytes = read_used_memory().unwrap_or(0);

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(interval);
        if let Ok(now) = CpuTime::read() {
            if let Some(prev) = &last {
                peaks.max_cpu_percent = peaks.max_cpu_percent.max(now.percent_since(prev));
            }
            last = Some(now);
        }
        if let Ok(used) = read_used_memory() {
            peaks.max_mem_bytes = peaks.max_mem_bytes.max(used);
        }
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_time_parsing() {
        let a = CpuTime::parse("cpu  100 0 50 800 50 0 0 0 0 0\ncpu0 1 2 3\n").unwrap();
        let b = CpuTime::parse("cpu  200 0 100 850 50 0 0 0 0 0\n").unwrap();
        assert_eq!(a.total, 1000);
        assert_eq!(a.busy, 150);
        // 150 busy of 200 elapsed ticks
        assert!((b.percent_since(&a) - 75.0).abs() < 1e-9);
        assert!(CpuTime::parse("intr 1 2 3").is_err());
    }

    #[test]
    fn test_meminfo_parsing() {
        let meminfo = "MemTotal:       16000 kB\nMemFree:  1000 kB\nMemAvailable:   6000 kB\n";
        assert_eq!(parse_used_memory(meminfo).unwrap(), 10000 * 1024);
        assert!(parse_used_memory("MemTotal: 1 kB\n").is_err());
    }

    #[test]
    fn test_monitor_start_stop() {
        let monitor = ResourceMonitor::start(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(30));
        let peaks = monitor.stop();
        assert!(peaks.max_cpu_percent >= 0.0 && peaks.max_cpu_percent <= 100.0);
    }
}
