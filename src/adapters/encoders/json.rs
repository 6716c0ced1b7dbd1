// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON encoder, the default wire format for change sets.

use crate::domain::{ConfigError, Result};
use crate::ports::Encoder;
use serde_json::Value;

/// Compact JSON encoder.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::encoders::JsonEncoder;
/// use snapcfg::ports::Encoder;
/// use serde_json::json;
///
/// let bytes = JsonEncoder.encode(&json!({"default": {"a": "1"}})).unwrap();
/// assert_eq!(bytes, br#"{"default":{"a":"1"}}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, tree: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(tree).map_err(|e| ConfigError::encode("json", e))
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| ConfigError::decode("json", e))
    }

    fn name(&self) -> &str {
        "json"
    }

    fn file_extensions(&self) -> &[&str] {
        &["json"]
    }
}
