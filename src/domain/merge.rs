// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds key-level change events into a source's full payload.
//!
//! Push backends report individual key changes, but the rest of the system
//! only deals in full payloads. A [`MergeEngine`] keeps the last change set a
//! source produced and, for every event or batch of events, runs a
//! decode → mutate → encode cycle that yields the next full change set.
//!
//! The cycle runs under the engine's mutex, so two concurrent backend
//! callbacks for the same source never lose each other's update.

use crate::domain::change_event::{ChangeEvent, ChangeType};
use crate::domain::change_set::ChangeSet;
use crate::domain::errors::{ConfigError, Result};
use crate::ports::diagnostics::{tracing_sink, DiagnosticsSink};
use crate::ports::encoder::Encoder;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Applies one event to a decoded tree in place.
///
/// Returns `Ok(true)` if the tree changed. A missing namespace is created on
/// `Added`/`Modified`; deleting from a missing namespace is a no-op.
/// Unrecognized change types are logged and leave the tree untouched.
///
/// # Errors
///
/// `DecodeError` if the root or the namespace is not a mapping.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::merge::apply_event;
/// use snapcfg::domain::ChangeEvent;
/// use serde_json::json;
///
/// let mut tree = json!({});
/// apply_event(&mut tree, &ChangeEvent::added("default", "a", "1")).unwrap();
/// apply_event(&mut tree, &ChangeEvent::deleted("default", "a")).unwrap();
/// assert_eq!(tree, json!({"default": {}}));
/// ```
pub fn apply_event(tree: &mut Value, event: &ChangeEvent) -> Result<bool> {
    let root = tree.as_object_mut().ok_or_else(|| ConfigError::DecodeError {
        format: "tree".to_string(),
        message: "snapshot root is not a mapping".to_string(),
        source: None,
    })?;

    match &event.change_type {
        ChangeType::Added | ChangeType::Modified => {
            let namespace = root
                .entry(event.namespace.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            let keys = namespace_map(namespace, &event.namespace)?;
            let value = event.value.clone().unwrap_or(Value::Null);
            if keys.get(&event.key) == Some(&value) {
                return Ok(false);
            }
            keys.insert(event.key.clone(), value);
            Ok(true)
        }
        ChangeType::Deleted => match root.get_mut(&event.namespace) {
            Some(namespace) => {
                let keys = namespace_map(namespace, &event.namespace)?;
                Ok(keys.remove(&event.key).is_some())
            }
            None => Ok(false),
        },
        ChangeType::Unrecognized(tag) => {
            tracing::warn!(
                "Ignoring change '{}' for {}/{}",
                tag,
                event.namespace,
                event.key
            );
            Ok(false)
        }
    }
}

fn namespace_map<'a>(value: &'a mut Value, name: &str) -> Result<&'a mut Map<String, Value>> {
    value.as_object_mut().ok_or_else(|| ConfigError::DecodeError {
        format: "tree".to_string(),
        message: format!("namespace '{}' is not a mapping", name),
        source: None,
    })
}

/// Per-source merge state.
///
/// # Examples
///
/// ```
/// use snapcfg::adapters::encoders::JsonEncoder;
/// use snapcfg::domain::{ChangeEvent, MergeEngine};
/// use std::sync::Arc;
///
/// let engine = MergeEngine::new("memory", Arc::new(JsonEncoder));
/// let cs = engine.apply(ChangeEvent::added("default", "a", "1")).unwrap();
/// assert_eq!(cs.data(), br#"{"default":{"a":"1"}}"#);
/// ```
pub struct MergeEngine {
    source: String,
    encoder: Arc<dyn Encoder>,
    base: Mutex<Option<ChangeSet>>,
    diagnostics: DiagnosticsSink,
}

impl MergeEngine {
    /// Creates an engine for `source` that encodes with `encoder`.
    pub fn new(source: impl Into<String>, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            source: source.into(),
            encoder,
            base: Mutex::new(None),
            diagnostics: tracing_sink(),
        }
    }

    /// Replaces the sink that receives dropped-event errors.
    pub fn with_diagnostics(mut self, sink: DiagnosticsSink) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Name of the source this engine merges for.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The encoder used for every produced change set.
    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    fn lock(&self) -> MutexGuard<'_, Option<ChangeSet>> {
        self.base.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encodes a full tree into a change set for this source.
    pub fn encode(&self, tree: &Value) -> Result<ChangeSet> {
        let data = self.encoder.encode(tree)?;
        Ok(ChangeSet::new(self.encoder.name(), self.source.as_str(), data))
    }

    /// Installs `change_set` as the base for later events.
    ///
    /// Sources call this after every full read.
    pub fn seed(&self, change_set: ChangeSet) {
        *self.lock() = Some(change_set);
    }

    /// Encodes `tree` and installs it as the base.
    pub fn seed_tree(&self, tree: &Value) -> Result<ChangeSet> {
        let cs = self.encode(tree)?;
        self.seed(cs.clone());
        Ok(cs)
    }

    /// The last change set produced or seeded.
    pub fn current(&self) -> Option<ChangeSet> {
        self.lock().clone()
    }

    /// Drops the base; the next event starts from an empty tree.
    pub fn reset(&self) {
        *self.lock() = None;
    }

    /// Returns `true` if the base holds `namespace/key`.
    ///
    /// Used by backends that cannot tell an add from a modify.
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        let base = self.lock();
        let Some(cs) = base.as_ref() else {
            return false;
        };
        match self.encoder.decode(cs.data()) {
            Ok(tree) => tree
                .get(namespace)
                .and_then(|ns| ns.get(key))
                .is_some(),
            Err(_) => false,
        }
    }

    /// Merges one event. See [`MergeEngine::apply_all`].
    pub fn apply(&self, event: ChangeEvent) -> Option<ChangeSet> {
        self.apply_all(std::iter::once(event))
    }

    /// Merges a batch of events delivered by one backend callback.
    ///
    /// Returns the new change set, or `None` when nothing changed or the
    /// cycle failed. Failures are reported to the diagnostics sink and the
    /// base stays at its last known good value.
    pub fn apply_all<I>(&self, events: I) -> Option<ChangeSet>
    where
        I: IntoIterator<Item = ChangeEvent>,
    {
        match self.try_apply_all(events) {
            Ok(result) => result,
            Err(e) => {
                (self.diagnostics)(&self.source, &e);
                None
            }
        }
    }

    /// Like [`MergeEngine::apply_all`] but returns base decode and encode failures.
    ///
    /// A single event that cannot be applied is still reported and skipped;
    /// the rest of the batch is merged.
    pub fn try_apply_all<I>(&self, events: I) -> Result<Option<ChangeSet>>
    where
        I: IntoIterator<Item = ChangeEvent>,
    {
        let mut base = self.lock();

        let mut tree = match base.as_ref() {
            Some(cs) => self.encoder.decode(cs.data())?,
            None => Value::Object(Map::new()),
        };
        if !tree.is_object() {
            return Err(ConfigError::DecodeError {
                format: self.encoder.name().to_string(),
                message: format!("payload of '{}' is not a mapping", self.source),
                source: None,
            });
        }

        let mut changed = false;
        for event in events {
            match apply_event(&mut tree, &event) {
                Ok(c) => changed |= c,
                Err(e) => (self.diagnostics)(&self.source, &e),
            }
        }
        if !changed {
            tracing::debug!("No effective change for source '{}'", self.source);
            return Ok(None);
        }

        let cs = self.encode(&tree)?;
        tracing::debug!(
            "Merged change for source '{}' (checksum {})",
            self.source,
            cs.checksum()
        );
        *base = Some(cs.clone());
        Ok(Some(cs))
    }
}

impl std::fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("source", &self.source)
            .field("encoder", &self.encoder.name())
            .finish()
    }
}
