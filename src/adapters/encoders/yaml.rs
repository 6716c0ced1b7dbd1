// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML encoder.
//!
//! YAML allows non-string mapping keys and tagged values; both are folded into
//! the plain JSON data model when decoding so every encoder yields the same
//! tree shape.

use crate::domain::{ConfigError, Result};
use crate::ports::Encoder;
use serde_json::{Map, Number, Value};

/// YAML encoder backed by `serde_yaml`.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::encoders::YamlEncoder;
/// use snapcfg::ports::Encoder;
///
/// let tree = YamlEncoder.decode(b"default:\n  port: 8080\n").unwrap();
/// assert_eq!(tree["default"]["port"], 8080);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlEncoder;

impl YamlEncoder {
    fn to_json(value: serde_yaml::Value) -> Value {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else if let Some(u) = n.as_u64() {
                    Value::from(u)
                } else {
                    n.as_f64()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::Array(seq.into_iter().map(Self::to_json).collect())
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = Map::new();
                for (key, val) in map {
                    out.insert(Self::key_string(key), Self::to_json(val));
                }
                Value::Object(out)
            }
            serde_yaml::Value::Tagged(tagged) => Self::to_json(tagged.value),
        }
    }

    fn key_string(key: serde_yaml::Value) -> String {
        match key {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => "null".to_string(),
            other => serde_yaml::to_string(&other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        }
    }
}

impl Encoder for YamlEncoder {
    fn encode(&self, tree: &Value) -> Result<Vec<u8>> {
        serde_yaml::to_string(tree)
            .map(String::into_bytes)
            .map_err(|e| ConfigError::encode("yaml", e))
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        let value: serde_yaml::Value =
            serde_yaml::from_slice(data).map_err(|e| ConfigError::decode("yaml", e))?;
        Ok(Self::to_json(value))
    }

    fn name(&self) -> &str {
        "yaml"
    }

    fn file_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let tree = json!({"default": {"a": "1", "list": [1, 2], "nested": {"b": false}}});
        let bytes = YamlEncoder.encode(&tree).unwrap();
        assert_eq!(YamlEncoder.decode(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let tree = YamlEncoder.decode(b"ports:\n  80: http\n  true: yes\n").unwrap();
        assert_eq!(tree, json!({"ports": {"80": "http", "true": "yes"}}));
    }

    #[test]
    fn test_decode_error() {
        let err = YamlEncoder.decode(b"key: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::DecodeError { ref format, .. } if format == "yaml"));
    }
}
