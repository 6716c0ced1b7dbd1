// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-path change subscriptions.

use crate::domain::{ConfigError, ConfigPath, ConfigValue, Result, Snapshot};
use serde_json::Value;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Receives the new value of one path each time it changes.
///
/// Values are delivered in snapshot order. Appearance, disappearance and
/// modification all count as changes; snapshots that leave the path untouched
/// are not reported. Once the owning [`Config`](crate::service::Config) is
/// closed, receiving returns [`ConfigError::WatcherStopped`].
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::MemorySource;
/// use snapcfg::domain::ConfigPath;
/// use snapcfg::service::Loader;
/// use std::time::Duration;
///
/// # fn main() -> snapcfg::domain::Result<()> {
/// let source = MemorySource::new("memory").with_value("app", "mode", "a");
/// let config = Loader::new().with_source(source.clone()).load()?;
///
/// let watcher = config.watch(ConfigPath::from(["app", "mode"]));
/// source.set("app", "mode", "b");
///
/// let value = watcher.recv_timeout(Duration::from_secs(5))?;
/// assert_eq!(value.map(|v| v.string("")), Some("b".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ValueWatcher {
    path: ConfigPath,
    rx: Receiver<ConfigValue>,
}

impl ValueWatcher {
    /// The watched path.
    pub fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Blocks until the value changes.
    pub fn recv(&self) -> Result<ConfigValue> {
        self.rx.recv().map_err(|_| ConfigError::WatcherStopped)
    }

    /// Waits up to `timeout`; `Ok(None)` if nothing changed in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ConfigValue>> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ConfigError::WatcherStopped),
        }
    }

    /// Returns a pending change without blocking.
    pub fn try_recv(&self) -> Result<Option<ConfigValue>> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ConfigError::WatcherStopped),
        }
    }
}

struct Subscriber {
    path: ConfigPath,
    last: Option<Value>,
    tx: Sender<ConfigValue>,
}

/// Subscriber table owned by a `Config`.
#[derive(Default)]
pub(crate) struct ValueSubscribers {
    inner: Mutex<Vec<Subscriber>>,
}

impl ValueSubscribers {
    /// Registers `path`, remembering its value in `current` as the baseline.
    pub(crate) fn subscribe(&self, path: ConfigPath, current: &Snapshot) -> ValueWatcher {
        let (tx, rx) = channel();
        let last = current.get(&path).into_raw();
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                path: path.clone(),
                last,
                tx,
            });
        ValueWatcher { path, rx }
    }

    /// Notifies every subscriber whose value differs in `snapshot`.
    ///
    /// Subscribers whose watcher was dropped are removed.
    pub(crate) fn notify(&self, snapshot: &Snapshot) {
        let mut subscribers = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain_mut(|sub| {
            let value = snapshot.get(&sub.path);
            if value.raw() == sub.last.as_ref() {
                return true;
            }
            sub.last = value.raw().cloned();
            sub.tx.send(value).is_ok()
        });
    }

    /// Drops every subscriber, ending their watchers.
    pub(crate) fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
