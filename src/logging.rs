// src/logging.rs
//
// tracing-subscriber setup shared by both binaries. Logs go to stderr so
// stdout stays clean for tables and worker JSON.

use anyhow::{anyhow, bail, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Map `-v` counts to a level:
/// 0 → warn, 1 → info, 2 → debug, 3+ → trace
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Accepts true/false, yes/no, on/off, 1/0
pub fn parse_bool_ish(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        other => bail!("Expected a boolean, got '{}'", other),
    }
}

/// Pick the level from `--log`/`--log-level` when logging is switched on,
/// from `-v` otherwise
pub fn resolve_level(verbose: u8, log: Option<&str>, log_level: Option<&str>) -> Result<String> {
    let enabled = log.map(parse_bool_ish).transpose()?.unwrap_or(false);
    if enabled {
        let level = log_level.unwrap_or("info").trim().to_ascii_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => return Ok(level),
            "warning" => return Ok("warn".to_string()),
            "critical" => return Ok("error".to_string()),
            other => bail!("Unknown log level '{}'", other),
        }
    }
    Ok(level_for_verbosity(verbose).to_string())
}

/// Install the global subscriber. `RUST_LOG` wins when set.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fleetbench={0},fleetbench_ctl={0}", level)));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn test_log_flag_overrides_verbosity() {
        assert_eq!(resolve_level(0, Some("true"), Some("DEBUG")).unwrap(), "debug");
        assert_eq!(resolve_level(2, Some("false"), Some("error")).unwrap(), "debug");
        assert_eq!(resolve_level(1, None, None).unwrap(), "info");
        assert_eq!(resolve_level(0, Some("yes"), Some("WARNING")).unwrap(), "warn");
        assert!(resolve_level(0, Some("maybe"), None).is_err());
        assert!(resolve_level(0, Some("on"), Some("loud")).is_err());
    }
}
