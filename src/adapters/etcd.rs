// SPDX-License-Identifier: MIT OR Apache-2.0

//! etcd configuration source.
//!
//! Keys are laid out as `{prefix}{namespace}/{key}` and values are stored as
//! strings. The initial payload is a prefix range read; changes arrive
//! through etcd's native watch API and are folded into the payload by the
//! source's merge engine.

use crate::adapters::encoders::default_encoder;
use crate::adapters::runtime;
use crate::adapters::watchers::{channel, ChangeSender, ChannelWatcher, DEFAULT_CAPACITY};
use crate::domain::{
    BackendOptions, ChangeEvent, ChangeSet, ChangeType, ConfigError, MergeEngine, Result,
    WatchList,
};
use crate::ports::{tracing_sink, DiagnosticsSink, Encoder, Source, Watcher};
use etcd_client::{
    Client, ConnectOptions, EventType, GetOptions, WatchOptions, WatchResponse, WatchStream,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// Delay before re-establishing a failed watch.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Splits `{prefix}{namespace}/{key}` into `(namespace, key)`.
///
/// Returns `None` for keys outside the prefix or without a namespace
/// separator.
pub fn split_key<'a>(prefix: &str, full_key: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = full_key.strip_prefix(prefix)?;
    let (namespace, key) = rest.split_once('/')?;
    (!namespace.is_empty() && !key.is_empty()).then_some((namespace, key))
}

#[derive(Clone)]
struct Connection {
    endpoints: Vec<String>,
    credentials: Option<(String, String)>,
}

impl Connection {
    fn options(&self) -> Option<ConnectOptions> {
        self.credentials
            .as_ref()
            .map(|(user, password)| ConnectOptions::new().with_user(user.clone(), password.clone()))
    }

    async fn connect(&self, source_name: &str) -> Result<Client> {
        Client::connect(&self.endpoints, self.options())
            .await
            .map_err(|e| ConfigError::SourceUnreachable {
                source_name: source_name.to_string(),
                message: format!("Failed to connect to etcd: {}", e),
                source: Some(Box::new(e)),
            })
    }
}

/// Configuration source backed by etcd.
///
/// # Examples
///
/// ```rust,no_run
/// use snapcfg::adapters::EtcdSource;
/// use snapcfg::ports::Source;
///
/// # fn main() -> snapcfg::domain::Result<()> {
/// let source = EtcdSource::connect(vec!["localhost:2379"], "myapp/")?;
/// let initial = source.read()?;
/// let watcher = source.watch()?;
/// # Ok(())
/// # }
/// ```
pub struct EtcdSource {
    name: String,
    prefix: String,
    connection: Connection,
    client: Client,
    watch_list: Arc<WatchList>,
    engine: Arc<MergeEngine>,
    diagnostics: DiagnosticsSink,
    capacity: usize,
    revision: Arc<Mutex<i64>>,
    active: Mutex<Option<ChangeSender>>,
}

impl EtcdSource {
    /// Connects to etcd.
    ///
    /// # Arguments
    ///
    /// * `endpoints` - List of etcd endpoints (e.g., `["localhost:2379"]`)
    /// * `prefix` - Key prefix all namespaces live under (e.g., `"myapp/"`)
    ///
    /// # Errors
    ///
    /// `SourceUnreachable` if no endpoint answers.
    pub fn connect<S: AsRef<str>>(endpoints: Vec<S>, prefix: &str) -> Result<Self> {
        Self::connect_with(
            Connection {
                endpoints: endpoints.iter().map(|s| s.as_ref().to_string()).collect(),
                credentials: None,
            },
            prefix,
        )
    }

    /// Connects using [`BackendOptions`].
    ///
    /// `address` may list several endpoints separated by commas. A non-empty
    /// `access_key` enables user authentication with `secret_key` as the
    /// password, and a non-empty `watch_config` loads the watch list.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        let connection = Connection {
            endpoints: options
                .address
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            credentials: (!options.access_key.is_empty())
                .then(|| (options.access_key.clone(), options.secret_key.clone())),
        };
        let source = Self::connect_with(connection, &options.prefix)?;
        source.with_watch_config(&options.watch_config)
    }

    #[cfg(feature = "yaml")]
    fn with_watch_config(self, path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(self);
        }
        Ok(self.with_watch_list(WatchList::from_yaml_file(path)?))
    }

    #[cfg(not(feature = "yaml"))]
    fn with_watch_config(self, path: &str) -> Result<Self> {
        if !path.is_empty() {
            tracing::warn!("Ignoring watch list {}: yaml support is disabled", path);
        }
        Ok(self)
    }

    fn connect_with(connection: Connection, prefix: &str) -> Result<Self> {
        let conn = connection.clone();
        let client = runtime::block_on("etcd", async move { conn.connect("etcd").await })?;
        tracing::info!("Connected to etcd at {:?}", connection.endpoints);

        Ok(Self {
            name: "etcd".to_string(),
            prefix: prefix.to_string(),
            connection,
            client,
            watch_list: Arc::new(WatchList::default()),
            engine: Arc::new(MergeEngine::new("etcd", default_encoder())),
            diagnostics: tracing_sink(),
            capacity: DEFAULT_CAPACITY,
            revision: Arc::new(Mutex::new(0)),
            active: Mutex::new(None),
        })
    }

    fn rebuild_engine(&mut self, encoder: Arc<dyn Encoder>) {
        self.engine = Arc::new(
            MergeEngine::new(self.name.clone(), encoder)
                .with_diagnostics(Arc::clone(&self.diagnostics)),
        );
    }

    /// Renames the source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        let encoder = Arc::clone(self.engine.encoder());
        self.rebuild_engine(encoder);
        self
    }

    /// Only `(group, dataId)` pairs in `watch_list` are read and watched.
    pub fn with_watch_list(mut self, watch_list: WatchList) -> Self {
        self.watch_list = Arc::new(watch_list);
        self
    }

    /// Encoder used for produced change sets (default JSON).
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.rebuild_engine(encoder);
        self
    }

    /// Routes dropped-event errors to `sink`.
    pub fn with_diagnostics(mut self, sink: DiagnosticsSink) -> Self {
        self.diagnostics = sink;
        let encoder = Arc::clone(self.engine.encoder());
        self.rebuild_engine(encoder);
        self
    }

    /// Hand-off buffer size (default 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// The key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Translates one watch response into change events.
    fn events(prefix: &str, watch_list: &WatchList, response: &WatchResponse) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        for event in response.events() {
            let Some(kv) = event.kv() else {
                continue;
            };
            let Ok(full_key) = kv.key_str() else {
                continue;
            };
            let Some((namespace, key)) = split_key(prefix, full_key) else {
                tracing::debug!("Ignoring etcd key outside layout: {}", full_key);
                continue;
            };
            if !watch_list.matches(namespace, key) {
                continue;
            }

            tracing::debug!("etcd key changed: {}/{}", namespace, key);
            let change = match event.event_type() {
                EventType::Put => {
                    let value = kv.value_str().unwrap_or_default().to_string();
                    let change_type = if kv.version() == 1 {
                        ChangeType::Added
                    } else {
                        ChangeType::Modified
                    };
                    ChangeEvent::new(namespace, key, change_type, Some(Value::String(value)))
                }
                EventType::Delete => ChangeEvent::deleted(namespace, key),
            };
            events.push(change);
        }
        events
    }

    fn spawn_watch(
        &self,
        sender: ChangeSender,
        watcher: &ChannelWatcher,
        mut stream: WatchStream,
        mut handle: etcd_client::Watcher,
        start_revision: i64,
    ) -> Result<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let name = self.name.clone();
        let prefix = self.prefix.clone();
        let connection = self.connection.clone();
        let watch_list = Arc::clone(&self.watch_list);
        let engine = Arc::clone(&self.engine);
        let runtime = runtime::shared(&self.name)?;

        let watch_thread = thread::Builder::new()
            .name(format!("etcd-watch-{}", name))
            .spawn(move || {
                runtime.block_on(async move {
                    let mut next_revision = start_revision;
                    loop {
                        tokio::select! {
                            _ = &mut stop_rx => {
                                let _ = handle.cancel().await;
                                tracing::debug!("etcd watcher stopping");
                                return;
                            }
                            message = stream.message() => match message {
                                Ok(Some(response)) => {
                                    if let Some(header) = response.header() {
                                        next_revision = header.revision() + 1;
                                    }
                                    if !response.canceled() {
                                        let events = Self::events(&prefix, &watch_list, &response);
                                        if events.is_empty() {
                                            continue;
                                        }
                                        if let Some(change_set) = engine.apply_all(events) {
                                            if sender.send(change_set).is_err() {
                                                return;
                                            }
                                        }
                                        continue;
                                    }
                                    tracing::error!("etcd watch on '{}' was cancelled by the server", prefix);
                                }
                                Ok(None) => tracing::error!("etcd watch stream on '{}' closed", prefix),
                                Err(e) => tracing::error!("etcd watch on '{}' failed: {}", prefix, e),
                            }
                        }

                        // Re-establish the watch from the next unseen revision.
                        loop {
                            tokio::select! {
                                _ = &mut stop_rx => return,
                                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                            }
                            match Self::open_watch(&connection, &name, &prefix, next_revision).await {
                                Ok((h, s)) => {
                                    handle = h;
                                    stream = s;
                                    tracing::info!("Re-established etcd watch on prefix: {}", prefix);
                                    break;
                                }
                                Err(e) => tracing::error!("Failed to re-establish etcd watch: {}", e),
                            }
                        }
                    }
                });
            })?;

        watcher.set_on_stop(move || {
            let _ = stop_tx.send(());
            if watch_thread.join().is_err() {
                tracing::error!("Failed to join etcd watch thread");
            }
        });
        Ok(())
    }

    async fn open_watch(
        connection: &Connection,
        name: &str,
        prefix: &str,
        start_revision: i64,
    ) -> Result<(etcd_client::Watcher, WatchStream)> {
        let mut client = connection.connect(name).await?;
        let mut options = WatchOptions::new().with_prefix();
        if start_revision > 0 {
            options = options.with_start_revision(start_revision);
        }
        client
            .watch(prefix, Some(options))
            .await
            .map_err(|e| ConfigError::WatcherError {
                message: format!("Failed to create etcd watch: {}", e),
                source: Some(Box::new(e)),
            })
    }
}

impl Source for EtcdSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<ChangeSet> {
        let mut client = self.client.clone();
        let prefix = self.prefix.clone();
        let name = self.name.clone();

        let response = runtime::block_on(&self.name, async move {
            client
                .get(prefix, Some(GetOptions::new().with_prefix()))
                .await
                .map_err(|e| ConfigError::SourceUnreachable {
                    source_name: name,
                    message: format!("Failed to fetch keys from etcd: {}", e),
                    source: Some(Box::new(e)),
                })
        })?;

        let mut tree = Map::new();
        for kv in response.kvs() {
            let (Ok(full_key), Ok(value)) = (kv.key_str(), kv.value_str()) else {
                continue;
            };
            let Some((namespace, key)) = split_key(&self.prefix, full_key) else {
                continue;
            };
            if !self.watch_list.matches(namespace, key) {
                continue;
            }
            if let Value::Object(keys) = tree
                .entry(namespace.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
            {
                keys.insert(key.to_string(), Value::String(value.to_string()));
            }
        }

        if let Some(header) = response.header() {
            *self.revision.lock().unwrap_or_else(PoisonError::into_inner) = header.revision();
        }
        self.engine.seed_tree(&Value::Object(tree))
    }

    fn watch(&self) -> Result<Box<dyn Watcher>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|tx| !tx.is_stopped()) {
            return Err(ConfigError::WatcherError {
                message: "Watcher is already running".to_string(),
                source: None,
            });
        }

        let read_revision = *self.revision.lock().unwrap_or_else(PoisonError::into_inner);
        let start_revision = if read_revision > 0 { read_revision + 1 } else { 0 };

        let connection = self.connection.clone();
        let name = self.name.clone();
        let prefix = self.prefix.clone();
        let (handle, stream) = runtime::block_on(&self.name, async move {
            Self::open_watch(&connection, &name, &prefix, start_revision).await
        })?;
        tracing::info!("Starting etcd watch on prefix: {}", self.prefix);

        let (sender, watcher) = channel(self.name.clone(), self.capacity);
        self.spawn_watch(sender.clone(), &watcher, stream, handle, start_revision)?;
        *active = Some(sender);
        Ok(Box::new(watcher))
    }
}

impl std::fmt::Debug for EtcdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdSource")
            .field("name", &self.name)
            .field("endpoints", &self.connection.endpoints)
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("app/", "app/default/a"), Some(("default", "a")));
        assert_eq!(
            split_key("app/", "app/default/db.yaml"),
            Some(("default", "db.yaml"))
        );
        assert_eq!(split_key("", "ns/k/deeper"), Some(("ns", "k/deeper")));
        assert_eq!(split_key("app/", "other/default/a"), None);
        assert_eq!(split_key("app/", "app/flat"), None);
        assert_eq!(split_key("app/", "app//a"), None);
    }
}
