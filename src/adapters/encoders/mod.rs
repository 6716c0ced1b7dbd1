// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in encoders and a lookup by format name or file extension.

mod json;
#[cfg(feature = "yaml")]
mod yaml;

pub use json::JsonEncoder;
#[cfg(feature = "yaml")]
pub use yaml::YamlEncoder;

use crate::ports::Encoder;
use once_cell::sync::Lazy;
use std::sync::Arc;

static BUILTIN: Lazy<Vec<Arc<dyn Encoder>>> = Lazy::new(|| {
    #[allow(unused_mut)]
    let mut encoders: Vec<Arc<dyn Encoder>> = vec![Arc::new(JsonEncoder)];
    #[cfg(feature = "yaml")]
    encoders.push(Arc::new(YamlEncoder));
    encoders
});

/// Looks up a built-in encoder by the format name recorded in change sets.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::encoders;
///
/// assert_eq!(encoders::builtin("json").unwrap().name(), "json");
/// assert!(encoders::builtin("toml").is_none());
/// ```
pub fn builtin(format: &str) -> Option<Arc<dyn Encoder>> {
    BUILTIN.iter().find(|e| e.name() == format).cloned()
}

/// Looks up a built-in encoder by file extension (without the dot).
pub fn for_extension(extension: &str) -> Option<Arc<dyn Encoder>> {
    let extension = extension.to_ascii_lowercase();
    BUILTIN
        .iter()
        .find(|e| e.file_extensions().contains(&extension.as_str()))
        .cloned()
}

/// The default encoder for change sets: JSON.
pub fn default_encoder() -> Arc<dyn Encoder> {
    Arc::new(JsonEncoder)
}
