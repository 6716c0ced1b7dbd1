// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source trait definition.
//!
//! This module defines the `Source` trait implemented by every configuration
//! backend. A source can produce its full payload on demand and can hand out
//! a [`Watcher`] that streams later versions of it.

use crate::domain::{ChangeSet, Result};
use crate::ports::watcher::Watcher;

/// A configuration backend.
///
/// `read`, `watch` and `write` work independently of whether a watcher is
/// currently active. A source owns at most one active watcher at a time.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the store can call `read` during
/// a sync while the source's watcher delivers changes on another thread.
///
/// # Examples
///
/// ```rust
/// use snapcfg::ports::{Source, Watcher};
/// use snapcfg::domain::{ChangeSet, ConfigError, Result};
///
/// struct Fixed;
///
/// impl Source for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn read(&self) -> Result<ChangeSet> {
///         Ok(ChangeSet::new("json", "fixed", br#"{"default":{"a":"1"}}"#.to_vec()))
///     }
///
///     fn watch(&self) -> Result<Box<dyn Watcher>> {
///         Err(ConfigError::WatcherError {
///             message: "fixed source never changes".to_string(),
///             source: None,
///         })
///     }
/// }
/// ```
pub trait Source: Send + Sync {
    /// Stable identifier for this source. The store keys contributions by it.
    fn name(&self) -> &str;

    /// Fetches the full payload from the backend.
    ///
    /// # Returns
    ///
    /// * `Ok(ChangeSet)` - The encoded payload with its checksum
    /// * `Err(ConfigError::SourceUnreachable)` - The backend could not be reached
    /// * `Err(ConfigError::DecodeError)` - The backend returned an undecodable payload
    fn read(&self) -> Result<ChangeSet>;

    /// Registers for change notifications and returns the bound watcher.
    ///
    /// Registration failures are returned here, synchronously.
    fn watch(&self) -> Result<Box<dyn Watcher>>;

    /// Writes a change set back to the backend.
    ///
    /// Write-back is not supported; the default accepts and discards it.
    fn write(&self, _change_set: &ChangeSet) -> Result<()> {
        Ok(())
    }
}
