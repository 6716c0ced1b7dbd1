// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests for pull-style reloading of file sources.

mod common;

use snapcfg::adapters::FileSource;
use snapcfg::domain::{ConfigError, ConfigurationService};
use snapcfg::service::Loader;
use std::fs;
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_sync_rereads_file() {
    let file = config_file(".json", r#"{"ns": {"x": "1"}}"#);
    let config = Loader::new()
        .with_source(FileSource::from_file(file.path()).unwrap())
        .load()
        .unwrap();
    assert_eq!(config.get_path(&["ns", "x"]).string(""), "1");

    fs::write(file.path(), r#"{"ns": {"x": "2"}}"#).unwrap();
    config.sync().unwrap();
    assert_eq!(config.get_path(&["ns", "x"]).string(""), "2");
}

#[test]
fn test_sync_keeps_snapshot_when_file_breaks() {
    let file = config_file(".json", r#"{"ns": {"x": "1"}}"#);
    let config = Loader::new()
        .with_source(FileSource::from_file(file.path()).unwrap())
        .load()
        .unwrap();
    let version = config.version();

    fs::write(file.path(), "{ broken").unwrap();
    assert!(matches!(
        config.sync(),
        Err(ConfigError::DecodeError { .. })
    ));
    assert_eq!(config.version(), version);
    assert_eq!(config.get_path(&["ns", "x"]).string(""), "1");
}

#[cfg(feature = "yaml")]
#[test]
fn test_two_files_merge() {
    let base = config_file(".yaml", "http:\n  port: 8080\n  host: 127.0.0.1\n");
    let local = config_file(".json", r#"{"http": {"host": "0.0.0.0"}}"#);

    let config = Loader::new()
        .with_source(FileSource::from_file(base.path()).unwrap().with_name("base"))
        .with_source(FileSource::from_file(local.path()).unwrap().with_name("local"))
        .load()
        .unwrap();

    assert_eq!(config.get_path(&["http", "port"]).int(0), 8080);
    assert_eq!(config.get_path(&["http", "host"]).string(""), "0.0.0.0");
}

#[test]
fn test_close_releases_file_watch() {
    let file = config_file(".json", "{}");
    let source = std::sync::Arc::new(FileSource::from_file(file.path()).unwrap());
    let config = Loader::new().with_shared_source(source.clone()).load().unwrap();
    config.close();

    // The watcher was stopped, so the source can be watched again.
    use snapcfg::ports::Source;
    source.watch().unwrap().stop().unwrap();
}

#[cfg(feature = "reload")]
mod file_watch {
    use super::*;
    use crate::common::{eventually, init_tracing};
    use snapcfg::domain::ConfigPath;
    use std::time::Duration;

    #[test]
    fn test_file_edit_propagates() {
        init_tracing();
        let file = config_file(".json", r#"{"ns": {"x": "1"}}"#);
        let config = Loader::new()
            .with_source(
                FileSource::from_file(file.path())
                    .unwrap()
                    .with_debounce(Duration::from_millis(50)),
            )
            .load()
            .unwrap();
        let watcher = config.watch(ConfigPath::from(["ns", "x"]));

        // Let the notify registration settle before editing.
        std::thread::sleep(Duration::from_millis(200));
        fs::write(file.path(), r#"{"ns": {"x": "2"}}"#).unwrap();

        // File system timing varies; only check delivery if an event arrived.
        if let Ok(Some(value)) = watcher.recv_timeout(Duration::from_secs(3)) {
            assert_eq!(value.string(""), "2");
            assert!(eventually(Duration::from_secs(1), || config.version() >= 2));
        }
        config.close();
    }

    #[test]
    fn test_unchanged_rewrite_is_not_delivered() {
        let file = config_file(".json", r#"{"ns": {"x": "1"}}"#);
        let config = Loader::new()
            .with_source(
                FileSource::from_file(file.path())
                    .unwrap()
                    .with_debounce(Duration::from_millis(50)),
            )
            .load()
            .unwrap();
        let version = config.version();

        std::thread::sleep(Duration::from_millis(200));
        fs::write(file.path(), r#"{ "ns": { "x": "1" } }"#).unwrap();
        std::thread::sleep(Duration::from_millis(500));

        assert_eq!(config.version(), version);
        config.close();
    }
}
