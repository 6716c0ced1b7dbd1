// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the etcd source using Docker containers.

mod common;

#[cfg(feature = "etcd")]
mod etcd_tests {
    use serde_json::json;
    use snapcfg::adapters::EtcdSource;
    use snapcfg::domain::{BackendOptions, ConfigurationService, WatchList, WatchRequest};
    use snapcfg::ports::Source;
    use snapcfg::service::Loader;
    use std::time::Duration;
    use testcontainers::{core::WaitFor, runners::AsyncRunner, ContainerAsync, GenericImage, ImageExt};
    use tokio::runtime::Runtime;

    use crate::common::{self as docker_helpers, eventually};

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// A running etcd container plus a runtime to drive the raw client.
    struct Fixture {
        _container: ContainerAsync<GenericImage>,
        rt: Runtime,
        endpoint: String,
    }

    impl Fixture {
        fn put(&self, key: &str, value: &str) {
            let endpoint = self.endpoint.clone();
            self.rt.block_on(async move {
                let mut client = etcd_client::Client::connect([endpoint], None).await.unwrap();
                client.put(key, value, None).await.unwrap();
            });
        }

        fn delete(&self, key: &str) {
            let endpoint = self.endpoint.clone();
            self.rt.block_on(async move {
                let mut client = etcd_client::Client::connect([endpoint], None).await.unwrap();
                client.delete(key, None).await.unwrap();
            });
        }
    }

    /// Starts etcd and seeds two namespaces under `test/`.
    fn setup_etcd_test() -> Option<Fixture> {
        if !docker_helpers::is_docker_available() {
            docker_helpers::print_docker_unavailable_warning("etcd integration test");
            return None;
        }

        let rt = Runtime::new().ok()?;
        let etcd_image = GenericImage::new("quay.io/coreos/etcd", "v3.5.0")
            .with_exposed_port(2379.into())
            .with_wait_for(WaitFor::message_on_stderr("ready to serve client requests"))
            .with_env_var("ETCD_ADVERTISE_CLIENT_URLS", "http://0.0.0.0:2379")
            .with_env_var("ETCD_LISTEN_CLIENT_URLS", "http://0.0.0.0:2379");

        let (container, port) = rt.block_on(async {
            let container = etcd_image.start().await.ok()?;
            let port = container.get_host_port_ipv4(2379).await.ok()?;
            // Give etcd a moment to fully start
            tokio::time::sleep(Duration::from_secs(2)).await;
            Some((container, port))
        })?;

        let fixture = Fixture {
            _container: container,
            rt,
            endpoint: format!("127.0.0.1:{}", port),
        };
        fixture.put("test/default/a", "1");
        fixture.put("test/db/host", "localhost");
        fixture.put("test/db/port", "5432");
        fixture.put("elsewhere/default/a", "ignored");
        Some(fixture)
    }

    #[test]
    fn test_etcd_read() {
        let Some(fixture) = setup_etcd_test() else {
            return;
        };

        let source = EtcdSource::connect(vec![fixture.endpoint.as_str()], "test/").unwrap();
        let cs = source.read().unwrap();
        assert_eq!(cs.source(), "etcd");

        let tree: serde_json::Value = serde_json::from_slice(cs.data()).unwrap();
        assert_eq!(
            tree,
            json!({"default": {"a": "1"}, "db": {"host": "localhost", "port": "5432"}})
        );
    }

    #[test]
    fn test_etcd_watch_put_and_delete() {
        let Some(fixture) = setup_etcd_test() else {
            return;
        };

        let source = EtcdSource::connect(vec![fixture.endpoint.as_str()], "test/").unwrap();
        let config = Loader::new().with_source(source).load().unwrap();
        assert_eq!(config.get_path(&["default", "a"]).string(""), "1");

        fixture.put("test/default/a", "2");
        assert!(eventually(TIMEOUT, || {
            config.get_path(&["default", "a"]).string("") == "2"
        }));

        fixture.put("test/cache/ttl", "60");
        assert!(eventually(TIMEOUT, || {
            config.get_path(&["cache", "ttl"]).int(0) == 60
        }));

        fixture.delete("test/db/host");
        assert!(eventually(TIMEOUT, || {
            !config.get_path(&["db", "host"]).exists()
        }));
        assert_eq!(config.get_path(&["db", "port"]).string(""), "5432");
        config.close();
    }

    #[test]
    fn test_etcd_watch_list_filters() {
        let Some(fixture) = setup_etcd_test() else {
            return;
        };

        let source = EtcdSource::connect(vec![fixture.endpoint.as_str()], "test/")
            .unwrap()
            .with_watch_list(WatchList::new(vec![WatchRequest::new("db", "host")]));
        let config = Loader::new().with_source(source).load().unwrap();
        assert_eq!(config.map().len(), 1);
        assert_eq!(config.get_path(&["db", "host"]).string(""), "localhost");
        assert!(!config.get_path(&["db", "port"]).exists());

        fixture.put("test/db/port", "6543");
        fixture.put("test/db/host", "db.internal");
        assert!(eventually(TIMEOUT, || {
            config.get_path(&["db", "host"]).string("") == "db.internal"
        }));
        assert!(!config.get_path(&["db", "port"]).exists());
    }

    #[test]
    fn test_etcd_from_options() {
        let Some(fixture) = setup_etcd_test() else {
            return;
        };

        let options = BackendOptions {
            address: fixture.endpoint.clone(),
            prefix: "test/".to_string(),
            ..Default::default()
        };
        let source = EtcdSource::from_options(&options).unwrap();
        assert_eq!(source.prefix(), "test/");
        let tree: serde_json::Value = serde_json::from_slice(source.read().unwrap().data()).unwrap();
        assert_eq!(tree["db"]["port"], "5432");
    }

    #[test]
    fn test_etcd_watch_stop_is_idempotent() {
        let Some(fixture) = setup_etcd_test() else {
            return;
        };

        let source = EtcdSource::connect(vec![fixture.endpoint.as_str()], "test/").unwrap();
        source.read().unwrap();
        let watcher = source.watch().unwrap();
        watcher.stop().unwrap();
        watcher.stop().unwrap();
        assert!(watcher.next().unwrap_err().is_watcher_stopped());

        // A new watch is allowed once the previous one stopped.
        source.watch().unwrap().stop().unwrap();
    }
}
