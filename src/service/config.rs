// SPDX-License-Identifier: MIT OR Apache-2.0

//! The aggregator: one live configuration snapshot fed by many sources.
//!
//! `Config` keeps, for every loaded source, the latest change set it produced
//! and merges all of them (in load order) into the current [`Snapshot`]. One
//! consumer thread per source drains its watcher and republishes the snapshot
//! on every change. Readers load the snapshot through an `ArcSwap` and never
//! block on writers.

use crate::adapters::encoders::{builtin, default_encoder};
use crate::domain::{
    ChangeSet, ConfigError, ConfigPath, ConfigurationService, Result, Snapshot,
};
use crate::ports::{tracing_sink, DiagnosticsSink, Encoder, Source, Watcher};
use crate::service::value_watcher::{ValueSubscribers, ValueWatcher};
use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Source name recorded in the aggregated change set.
const AGGREGATE_SOURCE: &str = "config";

/// Deep-merges `overlay` into `base`.
///
/// Objects merge key by key; any other pairing is replaced by `overlay`.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

struct Entry {
    name: String,
    source: Arc<dyn Source>,
    change_set: ChangeSet,
    tree: Value,
}

struct Consumer {
    source_name: String,
    watcher: Arc<dyn Watcher>,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    encoder: Arc<dyn Encoder>,
    diagnostics: DiagnosticsSink,
    current: ArcSwap<Snapshot>,
    entries: Mutex<Vec<Entry>>,
    subscribers: ValueSubscribers,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn decode(&self, change_set: &ChangeSet) -> Result<Value> {
        let encoder = if change_set.format() == self.encoder.name() {
            Arc::clone(&self.encoder)
        } else {
            builtin(change_set.format()).ok_or_else(|| ConfigError::DecodeError {
                format: change_set.format().to_string(),
                message: format!(
                    "no encoder for format '{}' from source '{}'",
                    change_set.format(),
                    change_set.source()
                ),
                source: None,
            })?
        };

        let tree = encoder.decode(change_set.data())?;
        match tree {
            Value::Object(_) => Ok(tree),
            Value::Null => Ok(Value::Object(Map::new())),
            _ => Err(ConfigError::DecodeError {
                format: change_set.format().to_string(),
                message: format!("payload of '{}' is not a mapping", change_set.source()),
                source: None,
            }),
        }
    }

    /// Merges every entry and swaps in a new snapshot if the encoding changed.
    ///
    /// Must be called with the entries lock held.
    fn publish(&self, entries: &[Entry]) -> Result<bool> {
        let mut tree = Value::Object(Map::new());
        for entry in entries {
            deep_merge(&mut tree, &entry.tree);
        }

        let data = self.encoder.encode(&tree)?;
        let change_set = ChangeSet::new(self.encoder.name(), AGGREGATE_SOURCE, data);
        let current = self.current.load();
        if change_set.checksum() == current.checksum() {
            tracing::debug!("Merged configuration unchanged, keeping version {}", current.version());
            return Ok(false);
        }

        let snapshot = Arc::new(Snapshot::new(change_set, tree, current.version() + 1));
        tracing::debug!(
            "Publishing configuration version {} (checksum {})",
            snapshot.version(),
            snapshot.checksum()
        );
        self.current.store(Arc::clone(&snapshot));
        self.subscribers.notify(&snapshot);
        Ok(true)
    }

    /// Replaces one source's contribution with a change set from its watcher.
    fn apply(&self, name: &str, change_set: ChangeSet) {
        let mut entries = lock(&self.entries);
        let Some(index) = entries.iter().position(|e| e.name == name) else {
            tracing::debug!("Dropping change set from unloaded source '{}'", name);
            return;
        };
        if entries[index].change_set.checksum() == change_set.checksum() {
            tracing::debug!("Change set from '{}' unchanged", name);
            return;
        }

        let tree = match self.decode(&change_set) {
            Ok(tree) => tree,
            Err(e) => {
                (self.diagnostics)(name, &e);
                return;
            }
        };
        entries[index].change_set = change_set;
        entries[index].tree = tree;
        if let Err(e) = self.publish(&entries) {
            (self.diagnostics)(name, &e);
        }
    }

    fn consume(self: Arc<Self>, name: String, watcher: Arc<dyn Watcher>) {
        loop {
            match watcher.next() {
                Ok(change_set) => self.apply(&name, change_set),
                Err(e) if e.is_watcher_stopped() => {
                    tracing::debug!("Watcher for '{}' stopped", name);
                    break;
                }
                Err(e) => {
                    (self.diagnostics)(&name, &e);
                    break;
                }
            }
        }
    }
}

/// The live configuration store.
///
/// A `Config` is usually built by a [`Loader`](crate::service::Loader). It is
/// not `Clone`; share it behind an `Arc`. Dropping it closes it.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::MemorySource;
/// use snapcfg::domain::ConfigurationService;
/// use snapcfg::service::Config;
/// use std::sync::Arc;
///
/// # fn main() -> snapcfg::domain::Result<()> {
/// let config = Config::default();
/// config.load(Arc::new(MemorySource::new("memory").with_value("db", "host", "localhost")))?;
///
/// assert_eq!(config.get_path(&["db", "host"]).string(""), "localhost");
/// assert_eq!(config.get_path(&["db", "port"]).int(5432), 5432);
/// config.close();
/// # Ok(())
/// # }
/// ```
pub struct Config {
    shared: Arc<Shared>,
    consumers: Mutex<Vec<Consumer>>,
    closed: AtomicBool,
}

impl Config {
    /// Creates an empty store that encodes snapshots with `encoder`.
    pub fn new(encoder: Arc<dyn Encoder>, diagnostics: DiagnosticsSink) -> Self {
        let empty = Value::Object(Map::new());
        let data = encoder.encode(&empty).unwrap_or_default();
        let initial = Snapshot::new(
            ChangeSet::new(encoder.name(), AGGREGATE_SOURCE, data),
            empty,
            0,
        );

        Self {
            shared: Arc::new(Shared {
                encoder,
                diagnostics,
                current: ArcSwap::from_pointee(initial),
                entries: Mutex::new(Vec::new()),
                subscribers: ValueSubscribers::default(),
            }),
            consumers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Reads `source`, merges its payload and starts consuming its watcher.
    ///
    /// # Errors
    ///
    /// - `WatcherStopped` if the store is closed before or during the load
    /// - `DuplicateSource` if a source with the same name is loaded
    /// - any error from the source's `read` or `watch`; a failed `watch` rolls
    ///   the source's contribution back out of the snapshot
    pub fn load(&self, source: Arc<dyn Source>) -> Result<()> {
        if self.is_closed() {
            return Err(ConfigError::WatcherStopped);
        }
        let name = source.name().to_string();
        self.ensure_unique(&name)?;

        let change_set = source.read()?;
        let tree = self.shared.decode(&change_set)?;
        {
            let mut entries = lock(&self.shared.entries);
            if entries.iter().any(|e| e.name == name) {
                return Err(ConfigError::DuplicateSource { source_name: name });
            }
            entries.push(Entry {
                name: name.clone(),
                source: Arc::clone(&source),
                change_set,
                tree,
            });
            if let Err(e) = self.shared.publish(&entries) {
                entries.pop();
                return Err(e);
            }
        }

        let watcher: Arc<dyn Watcher> = match source.watch() {
            Ok(watcher) => Arc::from(watcher),
            Err(e) => {
                self.unload(&name);
                return Err(e);
            }
        };

        let shared = Arc::clone(&self.shared);
        let consumer_watcher = Arc::clone(&watcher);
        let thread_name = name.clone();
        let handle = match thread::Builder::new()
            .name(format!("config-watch-{}", name))
            .spawn(move || shared.consume(thread_name, consumer_watcher))
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = watcher.stop();
                self.unload(&name);
                return Err(e.into());
            }
        };

        let mut consumers = lock(&self.consumers);
        if self.is_closed() {
            // Closed while loading; nothing would ever join this consumer.
            drop(consumers);
            let _ = watcher.stop();
            if handle.join().is_err() {
                tracing::error!("Consumer thread for '{}' panicked", name);
            }
            self.unload(&name);
            return Err(ConfigError::WatcherStopped);
        }
        consumers.push(Consumer {
            source_name: name.clone(),
            watcher,
            handle: Some(handle),
        });
        drop(consumers);
        tracing::info!(
            "Loaded configuration source '{}' (version {})",
            name,
            self.version()
        );
        Ok(())
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if lock(&self.shared.entries).iter().any(|e| e.name == name) {
            return Err(ConfigError::DuplicateSource {
                source_name: name.to_string(),
            });
        }
        Ok(())
    }

    fn unload(&self, name: &str) {
        let mut entries = lock(&self.shared.entries);
        entries.retain(|e| e.name != name);
        if let Err(e) = self.shared.publish(&entries) {
            (self.shared.diagnostics)(name, &e);
        }
    }

    /// Fingerprint of the current snapshot.
    pub fn checksum(&self) -> String {
        self.shared.current.load().checksum().to_string()
    }

    /// Version of the current snapshot; 0 before anything was loaded.
    pub fn version(&self) -> u64 {
        self.shared.current.load().version()
    }

    /// Names of the loaded sources in load order.
    pub fn source_names(&self) -> Vec<String> {
        lock(&self.shared.entries)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Subscribes to changes of the value at `path`.
    pub fn watch(&self, path: impl Into<ConfigPath>) -> ValueWatcher {
        let current = self.shared.current.load_full();
        self.shared.subscribers.subscribe(path.into(), &current)
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops every watcher and joins the consumer threads.
    ///
    /// The last snapshot stays readable. Calling this more than once is a
    /// no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut consumers = std::mem::take(&mut *lock(&self.consumers));
        for consumer in &consumers {
            if let Err(e) = consumer.watcher.stop() {
                (self.shared.diagnostics)(&consumer.source_name, &e);
            }
        }
        for consumer in &mut consumers {
            if let Some(handle) = consumer.handle.take() {
                if handle.join().is_err() {
                    tracing::error!(
                        "Consumer thread for '{}' panicked",
                        consumer.source_name
                    );
                }
            }
        }
        self.shared.subscribers.clear();
        tracing::info!("Configuration closed at version {}", self.version());
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_encoder(), tracing_sink())
    }
}

impl ConfigurationService for Config {
    fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current.load_full()
    }

    /// Re-reads every source and republishes.
    ///
    /// All reads must succeed before any contribution is replaced.
    fn sync(&self) -> Result<()> {
        let sources: Vec<(String, Arc<dyn Source>, String)> = lock(&self.shared.entries)
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    Arc::clone(&e.source),
                    e.change_set.checksum().to_string(),
                )
            })
            .collect();

        let mut fresh = Vec::with_capacity(sources.len());
        for (name, source, seen) in sources {
            let change_set = source.read()?;
            let tree = self.shared.decode(&change_set)?;
            fresh.push((name, seen, change_set, tree));
        }

        let mut entries = lock(&self.shared.entries);
        for (name, seen, change_set, tree) in fresh {
            let Some(entry) = entries.iter_mut().find(|e| e.name == name) else {
                continue;
            };
            // A push applied while reading is newer than what was read.
            if entry.change_set.checksum() != seen {
                tracing::debug!("Keeping pushed change for '{}' over re-read payload", name);
                continue;
            }
            entry.change_set = change_set;
            entry.tree = tree;
        }
        self.shared.publish(&entries)?;
        tracing::info!("Synchronized {} source(s)", entries.len());
        Ok(())
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("sources", &self.source_names())
            .field("version", &self.version())
            .field("closed", &self.is_closed())
            .finish()
    }
}
