// SPDX-License-Identifier: MIT OR Apache-2.0

//! The immutable change set exchanged between sources, watchers and the store.
//!
//! A [`ChangeSet`] carries one fully encoded version of a source's payload.
//! Its checksum is the lowercase hex SHA-256 of the encoded bytes and is
//! computed exactly once, at construction.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::SystemTime;

/// Computes the checksum used for every change set: hex-encoded SHA-256.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::change_set::checksum_of;
///
/// assert_eq!(
///     checksum_of(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn checksum_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// One encoded version of a configuration payload.
///
/// Fields are private so a change set cannot be mutated after its checksum
/// has been computed. Two change sets are equal when their checksums are equal,
/// regardless of timestamp or source.
///
/// Deserializing recomputes the checksum from `data`; a transmitted checksum is
/// ignored.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::ChangeSet;
///
/// let a = ChangeSet::new("json", "memory", br#"{"default":{}}"#.to_vec());
/// let b = ChangeSet::new("json", "other", br#"{"default":{}}"#.to_vec());
/// assert_eq!(a, b);
/// assert_eq!(a.checksum().len(), 64);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "ChangeSetRepr")]
pub struct ChangeSet {
    timestamp: SystemTime,
    format: String,
    source: String,
    data: Vec<u8>,
    checksum: String,
}

#[derive(Deserialize)]
struct ChangeSetRepr {
    timestamp: SystemTime,
    format: String,
    source: String,
    data: Vec<u8>,
}

impl From<ChangeSetRepr> for ChangeSet {
    fn from(repr: ChangeSetRepr) -> Self {
        Self::with_timestamp(repr.timestamp, repr.format, repr.source, repr.data)
    }
}

impl ChangeSet {
    /// Creates a change set stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `format` - Name of the encoder that produced `data`
    /// * `source` - Name of the source the payload came from
    /// * `data` - The encoded payload
    pub fn new(format: impl Into<String>, source: impl Into<String>, data: Vec<u8>) -> Self {
        Self::with_timestamp(SystemTime::now(), format, source, data)
    }

    /// Creates a change set with an explicit timestamp.
    pub fn with_timestamp(
        timestamp: SystemTime,
        format: impl Into<String>,
        source: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let checksum = checksum_of(&data);
        Self {
            timestamp,
            format: format.into(),
            source: source.into(),
            data,
            checksum,
        }
    }

    /// When the change set was produced.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Name of the encoder used for `data`.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Name of the source that produced the payload.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The encoded payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Hex SHA-256 of `data`.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Consumes the change set and returns its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl PartialEq for ChangeSet {
    fn eq(&self, other: &Self) -> bool {
        self.checksum == other.checksum
    }
}

impl Eq for ChangeSet {}

impl fmt::Debug for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSet")
            .field("format", &self.format)
            .field("source", &self.source)
            .field("len", &self.data.len())
            .field("checksum", &self.checksum)
            .finish()
    }
}
