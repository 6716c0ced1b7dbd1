// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer: the live configuration store and its startup orchestration.
//!
//! [`Config`] is the aggregator that owns the current snapshot and implements
//! [`ConfigurationService`](crate::domain::ConfigurationService). [`Loader`]
//! builds one from an ordered list of sources.

pub mod config;
pub mod loader;
pub mod value_watcher;

pub use config::Config;
pub use loader::Loader;
pub use value_watcher::ValueWatcher;
