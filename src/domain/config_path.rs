// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path newtype used to address values inside a snapshot.
//!
//! A [`ConfigPath`] is an ordered list of segments: the namespace first, then
//! the key, then any nested map keys or array indexes.

use std::fmt;

/// An ordered sequence of path segments.
///
/// Converting from a single `&str` yields a one-segment path because keys such
/// as `app.yaml` legitimately contain dots. Use [`ConfigPath::parse_dotted`] to
/// split on dots.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::ConfigPath;
///
/// let path = ConfigPath::from(["default", "db.yaml", "host"]);
/// assert_eq!(path.segments().len(), 3);
///
/// let dotted = ConfigPath::parse_dotted("default.timeout");
/// assert_eq!(dotted.segments(), ["default", "timeout"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConfigPath(Vec<String>);

impl ConfigPath {
    /// Creates a path from owned segments.
    pub fn new(segments: Vec<String>) -> Self {
        ConfigPath(segments)
    }

    /// Splits a dotted string into segments. Empty segments are skipped.
    pub fn parse_dotted(path: &str) -> Self {
        ConfigPath(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` for the empty path, which addresses the whole tree.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        ConfigPath(segments)
    }

    /// Converts the path into its inner segments.
    pub fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for ConfigPath {
    fn from(s: &str) -> Self {
        ConfigPath(vec![s.to_string()])
    }
}

impl From<String> for ConfigPath {
    fn from(s: String) -> Self {
        ConfigPath(vec![s])
    }
}

impl From<Vec<String>> for ConfigPath {
    fn from(segments: Vec<String>) -> Self {
        ConfigPath(segments)
    }
}

impl From<&[&str]> for ConfigPath {
    fn from(segments: &[&str]) -> Self {
        ConfigPath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ConfigPath {
    fn from(segments: [&str; N]) -> Self {
        ConfigPath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}
