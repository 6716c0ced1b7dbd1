// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for integration tests: a scriptable pull source and the
//! Docker availability check used by the container-backed tests.

#![allow(dead_code)]

use serde_json::Value;
use snapcfg::adapters::watchers::{channel, ChangeSender};
use snapcfg::domain::{ChangeSet, ConfigError, Result};
use snapcfg::ports::{Source, Watcher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Cached result of Docker availability check.
static DOCKER_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Checks if Docker is available on the system.
///
/// This check is cached after the first call.
pub fn is_docker_available() -> bool {
    *DOCKER_AVAILABLE.get_or_init(|| {
        std::process::Command::new("docker")
            .args(["ps"])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    })
}

/// Prints a warning message that a test is skipped due to Docker being unavailable.
pub fn print_docker_unavailable_warning(test_name: &str) {
    eprintln!("\n⚠️  SKIPPED: {} - Docker is not available", test_name);
    eprintln!("   To run this test, ensure Docker is installed and running.");
    eprintln!("   Installation: https://docs.docker.com/get-docker/\n");
}

/// Installs a test-writer tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("snapcfg=debug")
        .try_init();
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// A pull-style source whose payload the test controls.
///
/// `set_payload` changes what the next `read` returns without notifying
/// anyone; `push` also delivers the full payload to the active watcher.
#[derive(Clone)]
pub struct MockSource {
    name: String,
    payload: Arc<Mutex<Value>>,
    reads: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    sender: Arc<Mutex<Option<ChangeSender>>>,
}

impl MockSource {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload: Arc::new(Mutex::new(payload)),
            reads: Arc::new(AtomicUsize::new(0)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_payload(&self, payload: Value) {
        *self.payload.lock().unwrap() = payload;
    }

    pub fn push(&self, payload: Value) {
        self.set_payload(payload.clone());
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(encode(&self.name, &payload));
        }
    }

    /// Pushes raw bytes tagged with `format`, bypassing encoding.
    pub fn push_raw(&self, format: &str, data: &[u8]) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(ChangeSet::new(format, self.name.clone(), data.to_vec()));
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

fn encode(name: &str, payload: &Value) -> ChangeSet {
    ChangeSet::new("json", name, serde_json::to_vec(payload).unwrap())
}

impl Source for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<ChangeSet> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ConfigError::SourceUnreachable {
                source_name: self.name.clone(),
                message: "mock backend is down".to_string(),
                source: None,
            });
        }
        Ok(encode(&self.name, &self.payload.lock().unwrap()))
    }

    fn watch(&self) -> Result<Box<dyn Watcher>> {
        let (sender, watcher) = channel(self.name.clone(), 4);
        *self.sender.lock().unwrap() = Some(sender);
        Ok(Box::new(watcher))
    }
}

/// Wraps a source and stalls after every `read`, widening the window between
/// reading a payload and applying it.
pub struct SlowSource<S> {
    inner: S,
    delay: Duration,
}

impl<S: Source> SlowSource<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<S: Source> Source for SlowSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&self) -> Result<ChangeSet> {
        let change_set = self.inner.read()?;
        std::thread::sleep(self.delay);
        Ok(change_set)
    }

    fn watch(&self) -> Result<Box<dyn Watcher>> {
        self.inner.watch()
    }
}
