// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-key diffs delivered by push backends.

use serde_json::Value;
use std::fmt;

/// The kind of change a backend reported for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeType {
    /// The key did not exist before.
    Added,
    /// The key existed and its value changed.
    Modified,
    /// The key was removed.
    Deleted,
    /// A tag this crate does not understand. Events carrying it are dropped.
    Unrecognized(String),
}

impl ChangeType {
    /// Maps a backend's textual tag onto a change type.
    ///
    /// Matching is case-insensitive; anything else becomes
    /// [`ChangeType::Unrecognized`].
    ///
    /// # Examples
    ///
    /// ```
    /// use snapcfg::domain::ChangeType;
    ///
    /// assert_eq!(ChangeType::from_tag("ADDED"), ChangeType::Added);
    /// assert_eq!(ChangeType::from_tag("modified"), ChangeType::Modified);
    /// assert_eq!(
    ///     ChangeType::from_tag("RENAMED"),
    ///     ChangeType::Unrecognized("RENAMED".to_string())
    /// );
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "ADDED" => ChangeType::Added,
            "MODIFIED" => ChangeType::Modified,
            "DELETED" => ChangeType::Deleted,
            _ => ChangeType::Unrecognized(tag.to_string()),
        }
    }

    /// The canonical tag for this change type.
    pub fn as_tag(&self) -> &str {
        match self {
            ChangeType::Added => "ADDED",
            ChangeType::Modified => "MODIFIED",
            ChangeType::Deleted => "DELETED",
            ChangeType::Unrecognized(tag) => tag,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// One key-level change inside a namespace.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::{ChangeEvent, ChangeType};
///
/// let event = ChangeEvent::added("default", "a", "1");
/// assert_eq!(event.change_type, ChangeType::Added);
/// assert_eq!(event.value, Some(serde_json::json!("1")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Namespace (group) the key lives in.
    pub namespace: String,
    /// Key inside the namespace.
    pub key: String,
    /// What happened to the key.
    pub change_type: ChangeType,
    /// New value for additions and modifications.
    pub value: Option<Value>,
}

impl ChangeEvent {
    /// Creates an event from its parts.
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        change_type: ChangeType,
        value: Option<Value>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            change_type,
            value,
        }
    }

    /// An `ADDED` event.
    pub fn added(namespace: impl Into<String>, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(namespace, key, ChangeType::Added, Some(value.into()))
    }

    /// A `MODIFIED` event.
    pub fn modified(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(namespace, key, ChangeType::Modified, Some(value.into()))
    }

    /// A `DELETED` event.
    pub fn deleted(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(namespace, key, ChangeType::Deleted, None)
    }

    /// An event with a backend tag that is parsed with [`ChangeType::from_tag`].
    pub fn tagged(
        namespace: impl Into<String>,
        key: impl Into<String>,
        tag: &str,
        value: Option<Value>,
    ) -> Self {
        Self::new(namespace, key, ChangeType::from_tag(tag), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in ["ADDED", "MODIFIED", "DELETED"] {
            assert_eq!(ChangeType::from_tag(tag).as_tag(), tag);
        }
    }

    #[test]
    fn test_unrecognized_keeps_original_tag() {
        let ct = ChangeType::from_tag("Touched");
        assert_eq!(ct, ChangeType::Unrecognized("Touched".to_string()));
        assert_eq!(ct.to_string(), "Touched");
    }

    #[test]
    fn test_constructors() {
        let deleted = ChangeEvent::deleted("ns", "k");
        assert_eq!(deleted.change_type, ChangeType::Deleted);
        assert!(deleted.value.is_none());

        let tagged = ChangeEvent::tagged("ns", "k", "modified", Some(Value::from(2)));
        assert_eq!(tagged.change_type, ChangeType::Modified);
        assert_eq!(tagged.value, Some(Value::from(2)));
    }
}
