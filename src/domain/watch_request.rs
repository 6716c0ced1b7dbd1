// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative list of `(group, dataId)` pairs a backend should watch.
//!
//! The list is loaded once at startup from a document shaped like:
//!
//! ```yaml
//! watch:
//!   - group: default
//!     dataId: app.yaml
//!   - group: db
//!     dataId: primary
//! ```
//!
//! and never changes afterwards.

use serde::{Deserialize, Serialize};

#[cfg(feature = "yaml")]
use crate::domain::errors::{ConfigError, Result};
#[cfg(feature = "yaml")]
use std::path::Path;

/// One watched `(group, dataId)` pair. The group is the snapshot namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchRequest {
    /// Namespace the data id belongs to.
    pub group: String,
    /// Key inside the namespace.
    #[serde(rename = "dataId")]
    pub data_id: String,
}

impl WatchRequest {
    /// Creates a watch request.
    pub fn new(group: impl Into<String>, data_id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            data_id: data_id.into(),
        }
    }
}

/// The full watch list. An empty list watches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchList {
    /// The watched pairs.
    #[serde(default)]
    pub watch: Vec<WatchRequest>,
}

impl WatchList {
    /// Creates a watch list from pairs.
    pub fn new(watch: Vec<WatchRequest>) -> Self {
        Self { watch }
    }

    /// Parses a YAML document.
    ///
    /// # Examples
    ///
    /// ```
    /// use snapcfg::domain::WatchList;
    ///
    /// let list = WatchList::from_yaml_str("watch:\n  - group: default\n    dataId: app.yaml\n").unwrap();
    /// assert!(list.matches("default", "app.yaml"));
    /// assert!(!list.matches("default", "other"));
    /// ```
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("Invalid watch list: {}", e),
            source: Some(Box::new(e)),
        })
    }

    /// Reads and parses a YAML file.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded watch list from {}", path.as_ref().display());
        Self::from_yaml_str(&content)
    }

    /// Returns `true` if nothing is listed.
    pub fn is_empty(&self) -> bool {
        self.watch.is_empty()
    }

    /// Returns `true` if the pair is watched. An empty list matches everything.
    pub fn matches(&self, group: &str, data_id: &str) -> bool {
        self.is_empty()
            || self
                .watch
                .iter()
                .any(|w| w.group == group && w.data_id == data_id)
    }

    /// Distinct groups in declaration order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for w in &self.watch {
            if !groups.contains(&w.group.as_str()) {
                groups.push(&w.group);
            }
        }
        groups
    }
}
