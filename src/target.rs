// src/target.rs
//! Instance registry: addressable compute targets and bucket classes.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A remote compute instance, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub network_location: String,
}

impl Target {
    pub fn new(id: impl Into<String>, network_location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network_location: network_location.into(),
        }
    }

    /// Target whose location is its own identity (instance names resolved by the transport)
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            network_location: id.clone(),
            id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == self.network_location {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.network_location)
        }
    }
}

/// Parse a target list: one `id [location]` per line, `#` starts a comment.
pub fn parse_targets(content: &str) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let id = fields.next().unwrap_or_default();
        let target = match (fields.next(), fields.next()) {
            (None, _) => Target::named(id),
            (Some(location), None) => Target::new(id, location),
            (Some(_), Some(_)) => bail!("line {}: expected `id [location]`, got '{}'", lineno + 1, raw),
        };
        targets.push(target);
    }
    Ok(targets)
}

/// Load the target list file.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read target list {}", path.display()))?;
    let targets = parse_targets(&content)
        .with_context(|| format!("Invalid target list {}", path.display()))?;
    tracing::info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Category of object-storage bucket under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetClass {
    Regional,
    Zonal,
    #[serde(alias = "hierarchical-namespace")]
    Hns,
}

impl TargetClass {
    pub const ALL: [TargetClass; 3] = [TargetClass::Regional, TargetClass::Zonal, TargetClass::Hns];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetClass::Regional => "regional",
            TargetClass::Zonal => "zonal",
            TargetClass::Hns => "hns",
        }
    }

    /// Harness flag carrying this class's bucket
    pub fn cli_flag(&self) -> &'static str {
        match self {
            TargetClass::Regional => "--regional-bucket",
            TargetClass::Zonal => "--zonal-bucket",
            TargetClass::Hns => "--hns-bucket",
        }
    }
}

impl fmt::Display for TargetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regional" => Ok(TargetClass::Regional),
            "zonal" => Ok(TargetClass::Zonal),
            "hns" | "hierarchical-namespace" => Ok(TargetClass::Hns),
            other => bail!("Unknown bucket type '{}'. Supported: regional, zonal, hns", other),
        }
    }
}

/// Bucket names keyed by class; only configured classes are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMap {
    pub regional: Option<String>,
    pub zonal: Option<String>,
    pub hns: Option<String>,
}

impl BucketMap {
    pub fn get(&self, class: TargetClass) -> Option<&str> {
        let slot = match class {
            TargetClass::Regional => &self.regional,
            TargetClass::Zonal => &self.zonal,
            TargetClass::Hns => &self.hns,
        };
        slot.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        TargetClass::ALL.iter().all(|c| self.get(*c).is_none())
    }

    /// Configured classes, in declaration order
    pub fn configured(&self) -> Vec<(TargetClass, &str)> {
        TargetClass::ALL
            .iter()
            .filter_map(|c| self.get(*c).map(|b| (*c, b)))
            .collect()
    }

    /// Copy keeping only the classes in `enabled`
    pub fn restricted_to(&self, enabled: &[TargetClass]) -> BucketMap {
        let keep = |class: TargetClass, slot: &Option<String>| {
            if enabled.contains(&class) {
                slot.clone()
            } else {
                None
            }
        };
        BucketMap {
            regional: keep(TargetClass::Regional, &self.regional),
            zonal: keep(TargetClass::Zonal, &self.zonal),
            hns: keep(TargetClass::Hns, &self.hns),
        }
    }
}

/// Parse a space- or comma-separated class list such as `"regional zonal"`.
pub fn parse_classes(spec: &str) -> Result<Vec<TargetClass>> {
    let mut classes = Vec::new();
    for token in spec.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let class: TargetClass = token.parse()?;
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets_skips_comments_and_blank_lines() {
        let content = "\n# fleet\nvm-1\nvm-2 10.0.0.2:22  # second\n\n";
        let targets = parse_targets(content).unwrap();
        assert_eq!(targets, vec![Target::named("vm-1"), Target::new("vm-2", "10.0.0.2:22")]);
    }

    #[test]
    fn test_parse_targets_rejects_extra_fields() {
        assert!(parse_targets("vm-1 host extra").is_err());
    }

    #[test]
    fn test_target_class_parse() {
        assert_eq!("Regional".parse::<TargetClass>().unwrap(), TargetClass::Regional);
        assert_eq!("hierarchical-namespace".parse::<TargetClass>().unwrap(), TargetClass::Hns);
        assert!("archive".parse::<TargetClass>().is_err());
    }

    #[test]
    fn test_bucket_map_restriction() {
        let buckets = BucketMap {
            regional: Some("r".into()),
            zonal: Some("z".into()),
            hns: Some(String::new()),
        };
        assert_eq!(buckets.configured().len(), 2);

        let only_zonal = buckets.restricted_to(&[TargetClass::Zonal]);
        assert_eq!(only_zonal.configured(), vec![(TargetClass::Zonal, "z")]);
    }

    #[test]
    fn test_parse_classes_dedups() {
        let classes = parse_classes("zonal regional,zonal").unwrap();
        assert_eq!(classes, vec![TargetClass::Zonal, TargetClass::Regional]);
    }
}
