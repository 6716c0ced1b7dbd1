// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watcher trait definition.
//!
//! A watcher is the consumer end of one source's change notifications. It
//! starts `Active` and moves to `Stopped` exactly once; `Stopped` is terminal.

use crate::domain::{ChangeSet, Result};

/// Blocking iterator over a source's change sets.
///
/// # State machine
///
/// * `Active`: [`next`](Watcher::next) blocks until a change set arrives and
///   returns change sets in backend delivery order.
/// * `Stopped`: every call to `next`, including calls already blocked,
///   returns [`ConfigError::WatcherStopped`](crate::domain::ConfigError::WatcherStopped)
///   without blocking.
///
/// [`stop`](Watcher::stop) moves to `Stopped` and may be called any number of
/// times, concurrently, from any thread.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the store calls `next` on a
/// consumer thread while another thread may call `stop`.
///
/// # Examples
///
/// ```rust
/// use snapcfg::ports::Watcher;
/// use snapcfg::domain::{ChangeSet, ConfigError, Result};
///
/// struct NeverChanges;
///
/// impl Watcher for NeverChanges {
///     fn next(&self) -> Result<ChangeSet> {
///         Err(ConfigError::WatcherStopped)
///     }
///
///     fn stop(&self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Watcher: Send + Sync {
    /// Blocks until the next change set is available or the watcher stops.
    ///
    /// # Returns
    ///
    /// * `Ok(ChangeSet)` - The next full payload of the source
    /// * `Err(ConfigError::WatcherStopped)` - The watcher has been stopped
    fn next(&self) -> Result<ChangeSet>;

    /// Stops the watcher and releases its backend registration.
    ///
    /// Idempotent: the second and later calls return `Ok(())` and do nothing.
    fn stop(&self) -> Result<()>;
}
