// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query API over the current snapshot.
//!
//! This module defines the `ConfigurationService` trait, the interface the
//! rest of a process uses to read configuration. Implementors only provide
//! access to the current [`Snapshot`] and a way to force a resync; every
//! query is derived from the snapshot.

use crate::domain::{ConfigError, ConfigPath, ConfigValue, Result, Snapshot};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The main configuration query trait.
///
/// Queries never block on backends: they read whichever snapshot is current
/// at the time of the call.
///
/// # Examples
///
/// ```rust
/// use snapcfg::domain::{ChangeSet, ConfigPath, ConfigurationService, Result, Snapshot};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// struct Static(Arc<Snapshot>);
///
/// impl ConfigurationService for Static {
///     fn snapshot(&self) -> Arc<Snapshot> {
///         Arc::clone(&self.0)
///     }
///
///     fn sync(&self) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// let tree = json!({"default": {"a": "1"}});
/// let cs = ChangeSet::new("json", "static", serde_json::to_vec(&tree).unwrap());
/// let service = Static(Arc::new(Snapshot::new(cs, tree, 1)));
///
/// assert_eq!(service.get_path(&["default", "a"]).string(""), "1");
/// assert_eq!(service.get(&ConfigPath::from(["default", "b"])).string("x"), "x");
/// ```
pub trait ConfigurationService {
    /// The snapshot that is current right now.
    fn snapshot(&self) -> Arc<Snapshot>;

    /// Re-reads every source, bypassing cached state, and replaces the snapshot.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every source was read and the snapshot replaced
    /// * `Err(ConfigError)` - A read failed; the snapshot is unchanged
    fn sync(&self) -> Result<()>;

    /// The current snapshot in encoded form.
    fn bytes(&self) -> Vec<u8> {
        self.snapshot().bytes().to_vec()
    }

    /// The current snapshot as a generic map.
    fn map(&self) -> Map<String, Value> {
        self.snapshot().map()
    }

    /// Looks up a path in the current snapshot.
    fn get(&self, path: &ConfigPath) -> ConfigValue {
        self.snapshot().get(path)
    }

    /// Looks up a path given as segments.
    fn get_path(&self, segments: &[&str]) -> ConfigValue {
        self.get(&ConfigPath::from(segments))
    }

    /// Returns `true` if a non-null value exists at `path`.
    fn has(&self, path: &ConfigPath) -> bool {
        self.get(path).exists()
    }

    /// Decodes the whole snapshot into a typed structure.
    ///
    /// # Errors
    ///
    /// `DecodeError` if the snapshot does not have the shape of `T`.
    fn scan<T: DeserializeOwned>(&self) -> Result<T>
    where
        Self: Sized,
    {
        serde_json::from_value(self.snapshot().tree().clone())
            .map_err(|e| ConfigError::decode("json", e))
    }
}
