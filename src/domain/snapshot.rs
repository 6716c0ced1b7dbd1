// SPDX-License-Identifier: MIT OR Apache-2.0

//! One immutable version of the merged configuration tree.

use crate::domain::change_set::ChangeSet;
use crate::domain::config_path::ConfigPath;
use crate::domain::config_value::ConfigValue;
use serde_json::{Map, Value};

/// A fully-formed, never mutated version of the configuration.
///
/// The store replaces the whole snapshot on every update, so holders of an
/// `Arc<Snapshot>` keep a consistent view for as long as they need it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    change_set: ChangeSet,
    tree: Value,
    version: u64,
}

impl Snapshot {
    /// Builds a snapshot from its encoded change set and decoded tree.
    pub fn new(change_set: ChangeSet, tree: Value, version: u64) -> Self {
        Self {
            change_set,
            tree,
            version,
        }
    }

    /// The encoded form of the tree.
    pub fn change_set(&self) -> &ChangeSet {
        &self.change_set
    }

    /// The decoded tree: namespace → key → value.
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Monotonic version, bumped on every swap.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Encoded bytes of the tree.
    pub fn bytes(&self) -> &[u8] {
        self.change_set.data()
    }

    /// Checksum of the encoded bytes.
    pub fn checksum(&self) -> &str {
        self.change_set.checksum()
    }

    /// The tree as a generic map. A non-object root yields an empty map.
    pub fn map(&self) -> Map<String, Value> {
        match &self.tree {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Namespace names present in this snapshot.
    pub fn namespaces(&self) -> Vec<String> {
        match &self.tree {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Looks up a path.
    pub fn get(&self, path: &ConfigPath) -> ConfigValue {
        ConfigValue::lookup(&self.tree, path)
    }
}
