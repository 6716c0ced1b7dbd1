// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! This module contains the trait definitions (ports) that define the interfaces
//! between the change-propagation core and its backends. These traits are
//! implemented by adapters in the adapters layer.

pub mod diagnostics;
pub mod encoder;
pub mod source;
pub mod watcher;

// Re-export commonly used types
pub use diagnostics::{tracing_sink, DiagnosticsSink};
pub use encoder::Encoder;
pub use source::Source;
pub use watcher::Watcher;
