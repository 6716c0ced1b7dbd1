// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared tokio runtime for the remote backends.
//!
//! The `Source` and `Watcher` ports are synchronous. Remote clients are async,
//! so their calls are driven to completion on one lazily created runtime. If
//! the caller is itself inside a runtime, the call is moved to a helper
//! thread because nested `block_on` panics.

use crate::domain::{ConfigError, Result};
use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::{Handle, Runtime};

static SHARED: Lazy<std::io::Result<Runtime>> = Lazy::new(Runtime::new);

/// The shared runtime.
pub(crate) fn shared(source_name: &str) -> Result<&'static Runtime> {
    SHARED.as_ref().map_err(|e| ConfigError::SourceError {
        source_name: source_name.to_string(),
        message: format!("Failed to create tokio runtime: {}", e),
        source: None,
    })
}

/// Runs `future` to completion from synchronous code.
pub(crate) fn block_on<F, T>(source_name: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let runtime = shared(source_name)?;
    if Handle::try_current().is_ok() {
        std::thread::spawn(move || runtime.block_on(future))
            .join()
            .map_err(|_| ConfigError::SourceError {
                source_name: source_name.to_string(),
                message: "Failed to join blocking thread".to_string(),
                source: None,
            })?
    } else {
        runtime.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_outside_runtime() {
        let value = block_on("test", async { Ok(21 * 2) }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_block_on_inside_runtime() {
        let outer = Runtime::new().unwrap();
        let value = outer.block_on(async { block_on("test", async { Ok("nested") }) });
        assert_eq!(value.unwrap(), "nested");
    }

    #[test]
    fn test_errors_pass_through() {
        let result: Result<()> = block_on("test", async { Err(ConfigError::WatcherStopped) });
        assert!(result.unwrap_err().is_watcher_stopped());
    }
}
