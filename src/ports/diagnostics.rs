// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink for failures that happen off the caller's thread.
//!
//! Merge and consumer loops run inside backend callbacks or background
//! threads, so their errors cannot be returned. They are handed to a
//! [`DiagnosticsSink`] together with the name of the source involved.

use crate::domain::ConfigError;
use std::sync::Arc;

/// Receives `(source name, error)` for every asynchronous failure.
pub type DiagnosticsSink = Arc<dyn Fn(&str, &ConfigError) + Send + Sync>;

/// The default sink: logs each failure at `warn` level.
pub fn tracing_sink() -> DiagnosticsSink {
    Arc::new(|source: &str, error: &ConfigError| {
        tracing::warn!("Configuration source '{}' dropped a change: {}", source, error);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_custom_sink_receives_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: DiagnosticsSink = Arc::new(move |source, error| {
            seen_clone
                .lock()
                .unwrap()
                .push(format!("{}: {}", source, error));
        });

        sink("etcd", &ConfigError::WatcherStopped);
        assert_eq!(*seen.lock().unwrap(), vec!["etcd: Watcher stopped"]);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        tracing_sink()("memory", &ConfigError::WatcherStopped);
    }
}
