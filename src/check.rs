// src/check.rs
//! Performance regression gate.
//!
//! Expected durations are a JSON object keyed by
//! `"bucket,layout,num_objects,parallelism,num_subdir,operation"`. A sample
//! fails when its duration exceeds the expected one by more than 10%.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::constants::CHECK_TOLERANCE;
use crate::report::{RawResults, ResultRecord};
use crate::serde_helpers::deserialize_string_or_number;

/// One measured duration with its lookup key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSample {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub bucket: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub layout: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub num_objects: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub parallelism: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub num_subdir: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub operation: String,
    pub duration_s: f64,
}

impl CheckSample {
    pub fn key(&self) -> String {
        [
            self.bucket.as_str(),
            &self.layout,
            &self.num_objects,
            &self.parallelism,
            &self.num_subdir,
            &self.operation,
        ]
        .join(",")
    }

    /// Mean round duration of a harness result
    pub fn from_record(record: &ResultRecord) -> Self {
        Self {
            bucket: record.target_class.to_string(),
            layout: record.pattern.clone(),
            num_objects: record.files.to_string(),
            parallelism: (record.threads * record.processes).to_string(),
            num_subdir: record.folders.unwrap_or(0).to_string(),
            operation: record.group.to_string(),
            duration_s: record.stats.mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Within { expected: f64, allowed: f64 },
    Exceeded { expected: f64, allowed: f64 },
    /// No expectation for the key; passes with a warning
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub sample: CheckSample,
    pub verdict: Verdict,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        !matches!(self.verdict, Verdict::Exceeded { .. })
    }
}

pub fn parse_expected(json: &str) -> Result<HashMap<String, f64>> {
    let raw: HashMap<String, f64> = serde_json::from_str(json).context("Error decoding expected durations")?;
    // Keys are compared field by field; tolerate spaces after commas
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k.split(',').map(str::trim).collect::<Vec<_>>().join(","), v))
        .collect())
}

/// A single sample object, or a full `results.json`
pub fn parse_samples(json: &str) -> Result<Vec<CheckSample>> {
    if let Ok(sample) = serde_json::from_str::<CheckSample>(json) {
        return Ok(vec![sample]);
    }
    let raw: RawResults = serde_json::from_str(json).context("Error parsing result JSON")?;
    Ok(raw
        .results
        .iter()
        .filter_map(ResultRecord::derive)
        .map(|r| CheckSample::from_record(&r))
        .collect())
}

pub fn evaluate(expected: &HashMap<String, f64>, samples: &[CheckSample]) -> Vec<CheckOutcome> {
    samples
        .iter()
        .map(|sample| {
            let verdict = match expected.get(&sample.key()) {
                Some(&exp) => {
                    let allowed = exp * CHECK_TOLERANCE;
                    if sample.duration_s > allowed {
                        Verdict::Exceeded { expected: exp, allowed }
                    } else {
                        Verdict::Within { expected: exp, allowed }
                    }
                }
                None => {
                    warn!("No expected duration found for operation: {}", sample.key());
                    Verdict::Unknown
                }
            };
            CheckOutcome { sample: sample.clone(), verdict }
        })
        .collect()
}

/// `result` is a path when such a file exists, inline JSON otherwise
pub fn run_check(expected_path: &Path, result: &str) -> Result<Vec<CheckOutcome>> {
    let expected_json = std::fs::read_to_string(expected_path)
        .with_context(|| format!("{} not found", expected_path.display()))?;
    let expected = parse_expected(&expected_json)?;

    let result_path = Path::new(result);
    let result_json = if result_path.is_file() {
        std::fs::read_to_string(result_path).with_context(|| format!("Failed to read {}", result_path.display()))?
    } else {
        result.to_string()
    };
    Ok(evaluate(&expected, &parse_samples(&result_json)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(duration_s: f64) -> CheckSample {
        CheckSample {
            bucket: "zonal".into(),
            layout: "flat".into(),
            num_objects: "1000".into(),
            parallelism: "8".into(),
            num_subdir: "0".into(),
            operation: "list".into(),
            duration_s,
        }
    }

    #[test]
    fn test_ten_percent_tolerance() {
        let expected = parse_expected(r#"{"zonal, flat, 1000, 8, 0, list": 10.0}"#).unwrap();
        let out = evaluate(&expected, &[sample(10.9), sample(11.5)]);
        assert!(out[0].passed());
        assert!(!out[1].passed());
        assert!(matches!(out[1].verdict, Verdict::Exceeded { allowed, .. } if (allowed - 11.0).abs() < 1e-9));
    }

    #[test]
    fn test_unknown_key_passes() {
        let out = evaluate(&HashMap::new(), &[sample(99.0)]);
        assert_eq!(out[0].verdict, Verdict::Unknown);
        assert!(out[0].passed());
    }

    #[test]
    fn test_parse_single_sample_and_missing_key() {
        let json = r#"{"bucket":"zonal","layout":"flat","num_objects":1000,"parallelism":"8",
                       "num_subdir":0,"operation":"list","duration_s":1.5}"#;
        assert_eq!(parse_samples(json).unwrap(), vec![sample(1.5)]);
        assert!(parse_samples(r#"{"bucket":"zonal"}"#).is_err());
    }
}
