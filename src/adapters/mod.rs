// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer: concrete encoders, watchers and configuration sources.
//!
//! `MemorySource` is a push backend driven by the owning code, `FileSource`
//! is a pull backend that re-reads a file on change, and the optional etcd
//! and Redis sources are push backends fed by their server's change feed.

pub mod encoders;
pub mod file;
pub mod memory;
pub mod watchers;

#[cfg(feature = "etcd")]
pub mod etcd;
#[cfg(feature = "redis")]
pub mod redis;
#[cfg(any(feature = "etcd", feature = "redis"))]
pub(crate) mod runtime;

pub use encoders::JsonEncoder;
#[cfg(feature = "yaml")]
pub use encoders::YamlEncoder;
pub use file::FileSource;
pub use memory::MemorySource;

#[cfg(feature = "etcd")]
pub use etcd::EtcdSource;
#[cfg(feature = "redis")]
pub use self::redis::RedisSource;
#[cfg(feature = "reload")]
pub use watchers::FileWatcher;
