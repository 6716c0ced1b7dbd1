// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process push backend.
//!
//! `MemorySource` holds its payload in memory and lets the owning code publish
//! key-level change events, the way a remote configuration centre would
//! through its listener callbacks. Each publish runs the merge engine on the
//! publisher's thread and hands the resulting change set to the active
//! watcher.

use crate::adapters::encoders::default_encoder;
use crate::adapters::watchers::{channel, ChangeSender, DEFAULT_CAPACITY};
use crate::domain::{ChangeEvent, ChangeSet, ConfigError, MergeEngine, Result};
use crate::ports::{tracing_sink, DiagnosticsSink, Encoder, Source, Watcher};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An in-memory configuration backend with push notifications.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::MemorySource;
/// use snapcfg::ports::{Source, Watcher};
///
/// let source = MemorySource::new("memory").with_value("default", "a", "1");
/// let initial = source.read().unwrap();
/// assert_eq!(initial.data(), br#"{"default":{"a":"1"}}"#);
///
/// let watcher = source.watch().unwrap();
/// std::thread::spawn({
///     let source = source.clone();
///     move || source.set("default", "a", "2")
/// });
/// assert_eq!(watcher.next().unwrap().data(), br#"{"default":{"a":"2"}}"#);
/// watcher.stop().unwrap();
/// ```
#[derive(Clone)]
pub struct MemorySource {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    capacity: usize,
    store: Mutex<Value>,
    engine: MergeEngine,
    diagnostics: DiagnosticsSink,
    active: Mutex<Option<ChangeSender>>,
    // Held across merge and hand-off so deliveries keep merge order.
    handoff: Mutex<()>,
}

impl MemorySource {
    /// Creates an empty source that encodes with JSON.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), default_encoder(), DEFAULT_CAPACITY, tracing_sink())
    }

    fn build(
        name: String,
        encoder: Arc<dyn Encoder>,
        capacity: usize,
        diagnostics: DiagnosticsSink,
    ) -> Self {
        let engine =
            MergeEngine::new(name.clone(), encoder).with_diagnostics(Arc::clone(&diagnostics));
        Self {
            inner: Arc::new(Inner {
                name,
                capacity,
                store: Mutex::new(Value::Object(Map::new())),
                engine,
                diagnostics,
                active: Mutex::new(None),
                handoff: Mutex::new(()),
            }),
        }
    }

    fn rebuild(self, encoder: Arc<dyn Encoder>, capacity: usize, diagnostics: DiagnosticsSink) -> Self {
        let store = lock(&self.inner.store).clone();
        let rebuilt = Self::build(self.inner.name.clone(), encoder, capacity, diagnostics);
        *lock(&rebuilt.inner.store) = store;
        rebuilt
    }

    /// Uses `encoder` for produced change sets.
    pub fn with_encoder(self, encoder: Arc<dyn Encoder>) -> Self {
        let capacity = self.inner.capacity;
        let diagnostics = Arc::clone(&self.inner.diagnostics);
        self.rebuild(encoder, capacity, diagnostics)
    }

    /// Sets the hand-off buffer size (default 1).
    pub fn with_capacity(self, capacity: usize) -> Self {
        let encoder = Arc::clone(self.inner.engine.encoder());
        let diagnostics = Arc::clone(&self.inner.diagnostics);
        self.rebuild(encoder, capacity, diagnostics)
    }

    /// Routes dropped-event errors to `sink`.
    pub fn with_diagnostics(self, sink: DiagnosticsSink) -> Self {
        let encoder = Arc::clone(self.inner.engine.encoder());
        let capacity = self.inner.capacity;
        self.rebuild(encoder, capacity, sink)
    }

    /// Pre-populates `namespace/key` without notifying anyone.
    pub fn with_value(self, namespace: &str, key: &str, value: impl Into<Value>) -> Self {
        {
            let mut store = lock(&self.inner.store);
            let event = ChangeEvent::added(namespace, key, value);
            if let Err(e) = crate::domain::merge::apply_event(&mut store, &event) {
                (self.inner.diagnostics)(&self.inner.name, &e);
            }
        }
        self
    }

    /// Publishes one change event.
    ///
    /// The backend store is updated first; if a watcher is active, the event
    /// is merged into the last delivered payload and handed off. This call
    /// blocks while the hand-off buffer is full.
    pub fn publish(&self, event: ChangeEvent) {
        self.publish_batch(vec![event]);
    }

    /// Publishes a batch of events as one backend callback.
    pub fn publish_batch(&self, events: Vec<ChangeEvent>) {
        {
            let mut store = lock(&self.inner.store);
            for event in &events {
                if let Err(e) = crate::domain::merge::apply_event(&mut store, event) {
                    (self.inner.diagnostics)(&self.inner.name, &e);
                }
            }
        }

        let _handoff = lock(&self.inner.handoff);
        let Some(sender) = self.active_sender() else {
            tracing::debug!(
                "No active watcher on '{}', {} event(s) stored only",
                self.inner.name,
                events.len()
            );
            return;
        };

        if let Some(change_set) = self.inner.engine.apply_all(events) {
            if sender.send(change_set).is_err() {
                tracing::debug!("Watcher on '{}' stopped during hand-off", self.inner.name);
            }
        }
    }

    /// Sets `namespace/key`, reporting `Added` or `Modified` as appropriate.
    pub fn set(&self, namespace: &str, key: &str, value: impl Into<Value>) {
        let exists = lock(&self.inner.store)
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .is_some();
        let event = if exists {
            ChangeEvent::modified(namespace, key, value)
        } else {
            ChangeEvent::added(namespace, key, value)
        };
        self.publish(event);
    }

    /// Deletes `namespace/key`.
    pub fn delete(&self, namespace: &str, key: &str) {
        self.publish(ChangeEvent::deleted(namespace, key));
    }

    /// Replaces the whole backend payload without notifying watchers.
    ///
    /// The new payload becomes visible on the next `read`, e.g. through a sync.
    pub fn replace(&self, tree: Value) {
        *lock(&self.inner.store) = tree;
    }

    /// Returns `true` while a watcher handed out by this source is active.
    pub fn is_watching(&self) -> bool {
        self.active_sender().is_some()
    }

    fn active_sender(&self) -> Option<ChangeSender> {
        lock(&self.inner.active)
            .as_ref()
            .filter(|tx| !tx.is_stopped())
            .cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn read(&self) -> Result<ChangeSet> {
        let tree = lock(&self.inner.store).clone();
        if !tree.is_object() {
            return Err(ConfigError::DecodeError {
                format: self.inner.engine.encoder().name().to_string(),
                message: format!("payload of '{}' is not a mapping", self.inner.name),
                source: None,
            });
        }
        self.inner.engine.seed_tree(&tree)
    }

    fn watch(&self) -> Result<Box<dyn Watcher>> {
        let mut active = lock(&self.inner.active);
        if active.as_ref().is_some_and(|tx| !tx.is_stopped()) {
            return Err(ConfigError::WatcherError {
                message: "Watcher is already running".to_string(),
                source: None,
            });
        }

        let (sender, watcher) = channel(self.inner.name.clone(), self.inner.capacity);
        *active = Some(sender);
        tracing::info!("Watching in-memory source '{}'", self.inner.name);
        Ok(Box::new(watcher))
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.inner.name)
            .field("watching", &self.is_watching())
            .finish()
    }
}
