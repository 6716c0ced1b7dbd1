// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed pull source.
//!
//! The file holds the whole snapshot as a mapping of namespaces, in YAML or
//! JSON (chosen by extension). Changes are detected by poll-and-diff: each
//! file event triggers a full re-read, and a change set is delivered only if
//! the checksum differs from the last one delivered. Without the `reload`
//! feature the watcher stays idle and updates are picked up by a sync.

use crate::adapters::encoders::{default_encoder, for_extension};
use crate::adapters::watchers::{channel, ChangeSender, ChannelWatcher, DEFAULT_CAPACITY};
use crate::domain::{ChangeSet, ConfigError, Result};
use crate::ports::{tracing_sink, DiagnosticsSink, Encoder, Source, Watcher};
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Maximum allowed configuration file size (10MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration source reading a YAML or JSON file.
///
/// # Examples
///
/// ```rust,no_run
/// use snapcfg::adapters::FileSource;
/// use snapcfg::ports::Source;
///
/// // Load from a specific file
/// let source = FileSource::from_file("/etc/myapp/config.yaml").unwrap();
/// let initial = source.read().unwrap();
///
/// // Load from the default OS location
/// let source = FileSource::from_default_location("myapp", "com.example").unwrap();
/// ```
pub struct FileSource {
    name: String,
    file_path: PathBuf,
    encoder: Arc<dyn Encoder>,
    diagnostics: DiagnosticsSink,
    debounce: Option<Duration>,
    capacity: usize,
    last_checksum: Arc<Mutex<Option<String>>>,
    active: Mutex<Option<ChangeSender>>,
}

impl FileSource {
    /// Creates a source for an existing file. The source is named `file`.
    ///
    /// # Errors
    ///
    /// `SourceUnreachable` if the path cannot be resolved, `SourceError` if no
    /// built-in encoder handles its extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();

        let canonical_path =
            file_path
                .canonicalize()
                .map_err(|e| ConfigError::SourceUnreachable {
                    source_name: "file".to_string(),
                    message: format!("Invalid or inaccessible path: {}", display_name(&file_path)),
                    source: Some(Box::new(e)),
                })?;
        input_encoder(&canonical_path)?;

        Ok(Self {
            name: "file".to_string(),
            file_path: canonical_path,
            encoder: default_encoder(),
            diagnostics: tracing_sink(),
            debounce: None,
            capacity: DEFAULT_CAPACITY,
            last_checksum: Arc::new(Mutex::new(None)),
            active: Mutex::new(None),
        })
    }

    /// Creates a source for `config.yaml` in the OS-appropriate config directory.
    ///
    /// # Arguments
    ///
    /// * `app_name` - The application name (e.g., "myapp")
    /// * `qualifier` - The organization/qualifier (e.g., "com.example")
    pub fn from_default_location(app_name: &str, qualifier: &str) -> Result<Self> {
        Self::with_filename(app_name, qualifier, "config.yaml")
    }

    /// Creates a source for `filename` in the OS-appropriate config directory.
    pub fn with_filename(app_name: &str, qualifier: &str, filename: &str) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from(qualifier, "", app_name).ok_or_else(|| ConfigError::SourceError {
                source_name: "file".to_string(),
                message: "Failed to determine project directories".to_string(),
                source: None,
            })?;

        Self::from_file(proj_dirs.config_dir().join(filename))
    }

    /// Renames the source. Needed when loading several files into one store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Encoder used for produced change sets (default JSON).
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Routes reload failures to `sink`.
    pub fn with_diagnostics(mut self, sink: DiagnosticsSink) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Quiet period after the last file event before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Hand-off buffer size (default 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// The canonical path of the file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn load(name: &str, path: &Path, encoder: &dyn Encoder) -> Result<ChangeSet> {
        let metadata = fs::metadata(path).map_err(|e| ConfigError::SourceUnreachable {
            source_name: name.to_string(),
            message: format!("Failed to read file metadata: {}", display_name(path)),
            source: Some(Box::new(e)),
        })?;

        if metadata.len() > MAX_FILE_SIZE {
            return Err(ConfigError::SourceError {
                source_name: name.to_string(),
                message: format!(
                    "Configuration file too large: {} bytes (max {} bytes)",
                    metadata.len(),
                    MAX_FILE_SIZE
                ),
                source: None,
            });
        }

        let content = fs::read(path).map_err(|e| ConfigError::SourceUnreachable {
            source_name: name.to_string(),
            message: format!("Failed to read configuration file: {}", display_name(path)),
            source: Some(Box::new(e)),
        })?;

        let tree = match input_encoder(path)?.decode(&content)? {
            Value::Null => Value::Object(Map::new()),
            tree @ Value::Object(_) => tree,
            _ => {
                return Err(ConfigError::DecodeError {
                    format: encoder.name().to_string(),
                    message: format!(
                        "{} must contain a mapping of namespaces",
                        display_name(path)
                    ),
                    source: None,
                })
            }
        };

        let data = encoder.encode(&tree)?;
        Ok(ChangeSet::new(encoder.name(), name, data))
    }

    fn remember(last: &Mutex<Option<String>>, change_set: &ChangeSet) -> bool {
        let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(change_set.checksum()) {
            return false;
        }
        *last = Some(change_set.checksum().to_string());
        true
    }

    #[cfg(feature = "reload")]
    fn start_reload(&self, sender: ChangeSender, watcher: &ChannelWatcher) -> Result<()> {
        use crate::adapters::watchers::FileWatcher;

        let name = self.name.clone();
        let path = self.file_path.clone();
        let encoder = Arc::clone(&self.encoder);
        let diagnostics = Arc::clone(&self.diagnostics);
        let last = Arc::clone(&self.last_checksum);

        let guard = FileWatcher::new(&self.file_path, self.debounce)?.spawn(sender, move || {
            match Self::load(&name, &path, encoder.as_ref()) {
                Ok(change_set) => Self::remember(&last, &change_set).then_some(change_set),
                Err(e) => {
                    diagnostics(&name, &e);
                    None
                }
            }
        })?;
        watcher.set_on_stop(move || guard.shutdown());
        Ok(())
    }

    #[cfg(not(feature = "reload"))]
    fn start_reload(&self, _sender: ChangeSender, _watcher: &ChannelWatcher) -> Result<()> {
        tracing::debug!(
            "File reloading disabled; '{}' changes are picked up on sync",
            self.name
        );
        Ok(())
    }
}

fn input_encoder(path: &Path) -> Result<Arc<dyn Encoder>> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(for_extension)
        .ok_or_else(|| ConfigError::SourceError {
            source_name: "file".to_string(),
            message: format!("Unsupported configuration file type: {}", display_name(path)),
            source: None,
        })
}

fn display_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<ChangeSet> {
        let change_set = Self::load(&self.name, &self.file_path, self.encoder.as_ref())?;
        Self::remember(&self.last_checksum, &change_set);
        Ok(change_set)
    }

    fn watch(&self) -> Result<Box<dyn Watcher>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|tx| !tx.is_stopped()) {
            return Err(ConfigError::WatcherError {
                message: "Watcher is already running".to_string(),
                source: None,
            });
        }

        let (sender, watcher) = channel(self.name.clone(), self.capacity);
        self.start_reload(sender.clone(), &watcher)?;
        *active = Some(sender);
        Ok(Box::new(watcher))
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("name", &self.name)
            .field("file_path", &self.file_path)
            .field("encoder", &self.encoder.name())
            .finish()
    }
}
