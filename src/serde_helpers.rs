// Serde deserializers for loosely typed input files
// Expected-duration and result files written by other tools use numbers and
// strings interchangeably for key fields.

use serde::{Deserialize, Deserializer};

/// Deserialize a key field given as string or number into its text form
/// Examples: "1000", 1000, 2.5
pub fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;

    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("Expected number or string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Key {
        #[serde(deserialize_with = "deserialize_string_or_number")]
        value: String,
    }

    #[test]
    fn test_string_or_number() {
        let k: Key = serde_json::from_str(r#"{"value": 1000}"#).unwrap();
        assert_eq!(k.value, "1000");
        let k: Key = serde_json::from_str(r#"{"value": "flat"}"#).unwrap();
        assert_eq!(k.value, "flat");
        assert!(serde_json::from_str::<Key>(r#"{"value": [1]}"#).is_err());
    }
}
