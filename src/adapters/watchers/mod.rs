// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watcher implementations for configuration change delivery.
//!
//! Every backend delivers through the bounded [`channel`]; the file watcher
//! adds poll-and-diff reloading for file sources.

pub mod channel;
#[cfg(feature = "reload")]
pub mod file_watcher;

pub use channel::{channel, ChangeSender, ChannelWatcher, DEFAULT_CAPACITY};
#[cfg(feature = "reload")]
pub use file_watcher::{FileWatchGuard, FileWatcher};
