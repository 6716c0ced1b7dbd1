// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing core types and logic.
//!
//! This module contains the change set, snapshot and merge types that every
//! other layer exchanges. It is independent of any particular backend.

pub mod change_event;
pub mod change_set;
pub mod config_path;
pub mod config_value;
pub mod errors;
pub mod merge;
pub mod options;
pub mod service;
pub mod snapshot;
pub mod watch_request;

// Re-export commonly used types
pub use change_event::{ChangeEvent, ChangeType};
pub use change_set::ChangeSet;
pub use config_path::ConfigPath;
pub use config_value::ConfigValue;
pub use errors::{ConfigError, Result};
pub use merge::MergeEngine;
pub use options::BackendOptions;
pub use service::ConfigurationService;
pub use snapshot::Snapshot;
pub use watch_request::{WatchList, WatchRequest};
