// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration change propagation.
//!
//! This crate pulls an initial configuration payload from one or more
//! backends, subscribes to their change notifications, merges incremental
//! diffs into a single in-memory snapshot and serves that snapshot through a
//! stable query API.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: change sets, change events, snapshots, the merge engine
//!   and the query API (`ConfigurationService`)
//! - **Ports**: trait definitions for the seams (`Source`, `Watcher`, `Encoder`)
//! - **Adapters**: encoders, the watcher hand-off and concrete sources
//!   (in-memory, file, etcd, Redis)
//! - **Service**: the `Config` aggregator and the `Loader` that builds it
//!
//! # Delivery models
//!
//! Pull backends (files) re-read their whole payload on change and deliver it
//! only if its checksum moved. Push backends (etcd, Redis, the in-memory
//! source) deliver single-key events, which each source folds into its last
//! full payload with a [`MergeEngine`](domain::MergeEngine). Either way the
//! aggregator receives complete change sets and republishes one snapshot.
//!
//! # Feature Flags
//!
//! - `yaml`: YAML encoder and watch list files (default)
//! - `reload`: file watching for `FileSource`
//! - `etcd`: etcd source
//! - `redis`: Redis source
//! - `remote`: all remote sources (etcd + redis)
//! - `full`: everything
//!
//! # Quick Start
//!
//! ```rust
//! use snapcfg::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> snapcfg::domain::Result<()> {
//! let backend = MemorySource::new("memory").with_value("default", "timeout", "300ms");
//! let config = Loader::new().with_source(backend.clone()).load()?;
//!
//! let timeout = config.get_path(&["default", "timeout"]).duration(Duration::ZERO);
//! assert_eq!(timeout, Duration::from_millis(300));
//!
//! // Push a change; the snapshot follows.
//! let changes = config.watch(ConfigPath::from(["default", "timeout"]));
//! backend.set("default", "timeout", "1s");
//! let value = changes.recv()?;
//! assert_eq!(value.duration(Duration::ZERO), Duration::from_secs(1));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::domain::{
        ChangeEvent, ChangeSet, ChangeType, ConfigError, ConfigPath, ConfigValue,
        ConfigurationService, Result, Snapshot,
    };
    pub use crate::ports::{Encoder, Source, Watcher};
    pub use crate::service::{Config, Loader, ValueWatcher};

    pub use crate::adapters::{FileSource, JsonEncoder, MemorySource};
    #[cfg(feature = "yaml")]
    pub use crate::adapters::YamlEncoder;
}
