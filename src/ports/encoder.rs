// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoder trait definition.
//!
//! This module defines the `Encoder` trait, which converts a configuration tree
//! to bytes and back. Every change set records the name of the encoder that
//! produced it so any consumer can decode it again.

use crate::domain::Result;
use serde_json::Value;

/// A symmetric codec between a configuration tree and its wire bytes.
///
/// For any tree `t` built from maps and scalars, `decode(encode(t)) == t`.
///
/// # Examples
///
/// ```rust
/// use snapcfg::ports::Encoder;
/// use snapcfg::domain::{ConfigError, Result};
/// use serde_json::Value;
///
/// struct CompactJson;
///
/// impl Encoder for CompactJson {
///     fn encode(&self, tree: &Value) -> Result<Vec<u8>> {
///         serde_json::to_vec(tree).map_err(|e| ConfigError::encode("compact", e))
///     }
///
///     fn decode(&self, data: &[u8]) -> Result<Value> {
///         serde_json::from_slice(data).map_err(|e| ConfigError::decode("compact", e))
///     }
///
///     fn name(&self) -> &str {
///         "compact"
///     }
/// }
/// ```
pub trait Encoder: Send + Sync {
    /// Encodes a tree into bytes.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The encoded payload
    /// * `Err(ConfigError::EncodeError)` - The tree cannot be represented
    fn encode(&self, tree: &Value) -> Result<Vec<u8>>;

    /// Decodes bytes into a tree.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The decoded tree
    /// * `Err(ConfigError::DecodeError)` - The payload is malformed
    fn decode(&self, data: &[u8]) -> Result<Value>;

    /// The format name recorded in change sets (e.g. `json`).
    fn name(&self) -> &str;

    /// File extensions handled by this encoder. Defaults to none.
    fn file_extensions(&self) -> &[&str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigError;

    struct UpperEncoder;

    impl Encoder for UpperEncoder {
        fn encode(&self, tree: &Value) -> Result<Vec<u8>> {
            Ok(tree.to_string().to_uppercase().into_bytes())
        }

        fn decode(&self, _data: &[u8]) -> Result<Value> {
            Err(ConfigError::DecodeError {
                format: "upper".to_string(),
                message: "one way only".to_string(),
                source: None,
            })
        }

        fn name(&self) -> &str {
            "upper"
        }
    }

    #[test]
    fn test_default_extensions_empty() {
        assert!(UpperEncoder.file_extensions().is_empty());
    }

    #[test]
    fn test_custom_encoder() {
        let bytes = UpperEncoder.encode(&Value::from("abc")).unwrap();
        assert_eq!(bytes, b"\"ABC\"".to_vec());
        assert!(UpperEncoder.decode(&bytes).is_err());
    }

    #[test]
    fn test_encoder_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Encoder>();
    }
}
