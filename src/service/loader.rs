// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot startup orchestration.

use crate::adapters::encoders::default_encoder;
use crate::domain::Result;
use crate::ports::{tracing_sink, DiagnosticsSink, Encoder, Source};
use crate::service::config::Config;
use std::sync::Arc;

/// Builds a [`Config`] from an ordered list of sources.
///
/// Each source is read, merged and watched in the order it was added. The
/// first failure closes the partially built `Config` and is returned.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::MemorySource;
/// use snapcfg::domain::ConfigurationService;
/// use snapcfg::service::Loader;
///
/// # fn main() -> snapcfg::domain::Result<()> {
/// let config = Loader::new()
///     .with_source(MemorySource::new("defaults").with_value("http", "port", 8080))
///     .with_source(MemorySource::new("overrides").with_value("http", "host", "0.0.0.0"))
///     .load()?;
///
/// assert_eq!(config.get_path(&["http", "port"]).int(0), 8080);
/// assert_eq!(config.get_path(&["http", "host"]).string(""), "0.0.0.0");
/// # Ok(())
/// # }
/// ```
pub struct Loader {
    encoder: Arc<dyn Encoder>,
    diagnostics: DiagnosticsSink,
    sources: Vec<Arc<dyn Source>>,
}

impl Loader {
    /// Creates a loader with the JSON encoder and the tracing diagnostics sink.
    pub fn new() -> Self {
        Self {
            encoder: default_encoder(),
            diagnostics: tracing_sink(),
            sources: Vec::new(),
        }
    }

    /// Encoder for the aggregated snapshot.
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Sink for errors raised on consumer threads.
    pub fn with_diagnostics(mut self, sink: DiagnosticsSink) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Appends a source.
    pub fn with_source<S: Source + 'static>(self, source: S) -> Self {
        self.with_shared_source(Arc::new(source))
    }

    /// Appends a source that is also held elsewhere.
    pub fn with_shared_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    /// Number of sources added so far.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no source was added.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Loads every source into a new [`Config`].
    pub fn load(self) -> Result<Config> {
        let config = Config::new(self.encoder, self.diagnostics);
        for source in self.sources {
            let name = source.name().to_string();
            if let Err(e) = config.load(source) {
                tracing::error!("Failed to load configuration source '{}': {}", name, e);
                config.close();
                return Err(e);
            }
        }
        tracing::info!(
            "Configuration loaded from {} source(s)",
            config.source_names().len()
        );
        Ok(config)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
