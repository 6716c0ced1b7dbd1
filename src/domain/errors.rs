// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the change-propagation crate.
//!
//! This module defines the error types that can occur when reading sources,
//! merging change events, watching backends and querying the snapshot.
//! All errors use `thiserror` for proper error handling and conversion.

use thiserror::Error;

/// Boxed underlying error carried by most variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for configuration operations.
///
/// It is marked as `#[non_exhaustive]` to allow for future additions without
/// breaking backwards compatibility.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::errors::ConfigError;
///
/// fn next_change() -> Result<(), ConfigError> {
///     Err(ConfigError::WatcherStopped)
/// }
///
/// assert!(next_change().unwrap_err().is_watcher_stopped());
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The watcher has been stopped; no further change sets will be delivered.
    #[error("Watcher stopped")]
    WatcherStopped,

    /// The backend behind a source could not be reached.
    #[error("Configuration source '{source_name}' unreachable: {message}")]
    SourceUnreachable {
        /// The name of the source
        source_name: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// A payload could not be decoded by the named encoder.
    #[error("Failed to decode {format} payload: {message}")]
    DecodeError {
        /// The encoder name (e.g. `json`)
        format: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// A tree could not be encoded by the named encoder.
    #[error("Failed to encode {format} payload: {message}")]
    EncodeError {
        /// The encoder name
        format: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// Any other failure inside a configuration source.
    #[error("Configuration source '{source_name}' error: {message}")]
    SourceError {
        /// The name of the source that encountered the error
        source_name: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// Two sources with the same name were loaded into one store.
    #[error("Configuration source '{source_name}' is already loaded")]
    DuplicateSource {
        /// The conflicting source name
        source_name: String,
    },

    /// An error occurred while setting up or running a watcher.
    #[error("Configuration watcher error: {message}")]
    WatcherError {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// Failed to parse a declarative input such as the watch list.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<BoxError>,
    },

    /// An I/O error occurred while reading configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Returns `true` for the terminal "watcher stopped" condition.
    pub fn is_watcher_stopped(&self) -> bool {
        matches!(self, ConfigError::WatcherStopped)
    }

    /// Creates a `DecodeError` from any underlying error.
    pub fn decode<E>(format: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConfigError::DecodeError {
            format: format.to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Creates an `EncodeError` from any underlying error.
    pub fn encode<E>(format: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConfigError::EncodeError {
            format: format.to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
