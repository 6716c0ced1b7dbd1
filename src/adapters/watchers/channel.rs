// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded hand-off between a backend and the store's consumer thread.
//!
//! Every backend adapter pushes change sets through a [`ChangeSender`] and
//! returns the matching [`ChannelWatcher`] from `Source::watch`. The buffer
//! is bounded, so a backend that produces faster than the store consumes is
//! blocked in [`ChangeSender::send`].

use crate::domain::{ChangeSet, ConfigError, Result};
use crate::ports::Watcher;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Default number of change sets buffered between backend and consumer.
pub const DEFAULT_CAPACITY: usize = 1;

type StopHook = Box<dyn FnOnce() + Send>;

struct State {
    queue: VecDeque<ChangeSet>,
    stopped: bool,
    on_stop: Option<StopHook>,
}

struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a connected sender/watcher pair.
///
/// A `capacity` of zero is raised to one.
///
/// # Examples
///
/// ```rust
/// use snapcfg::adapters::watchers::channel;
/// use snapcfg::domain::ChangeSet;
/// use snapcfg::ports::Watcher;
///
/// let (tx, watcher) = channel("memory", 1);
/// tx.send(ChangeSet::new("json", "memory", b"{}".to_vec())).unwrap();
/// assert_eq!(watcher.next().unwrap().data(), b"{}");
///
/// watcher.stop().unwrap();
/// assert!(watcher.next().unwrap_err().is_watcher_stopped());
/// assert!(tx.send(ChangeSet::new("json", "memory", b"{}".to_vec())).is_err());
/// ```
pub fn channel(source: impl Into<String>, capacity: usize) -> (ChangeSender, ChannelWatcher) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            queue: VecDeque::new(),
            stopped: false,
            on_stop: None,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        capacity: capacity.max(1),
    });
    (
        ChangeSender {
            shared: Arc::clone(&shared),
        },
        ChannelWatcher {
            shared,
            source: source.into(),
        },
    )
}

/// Producer end, held by the backend.
#[derive(Clone)]
pub struct ChangeSender {
    shared: Arc<Shared>,
}

impl ChangeSender {
    /// Hands a change set to the watcher, blocking while the buffer is full.
    ///
    /// # Errors
    ///
    /// `WatcherStopped` once the watcher is stopped; the change set is dropped.
    pub fn send(&self, change_set: ChangeSet) -> Result<()> {
        let mut state = self.shared.lock();
        loop {
            if state.stopped {
                return Err(ConfigError::WatcherStopped);
            }
            if state.queue.len() < self.shared.capacity {
                state.queue.push_back(change_set);
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            state = self
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns `true` once the watcher has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }
}

impl std::fmt::Debug for ChangeSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSender")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Consumer end, returned from `Source::watch`.
pub struct ChannelWatcher {
    shared: Arc<Shared>,
    source: String,
}

impl ChannelWatcher {
    /// Registers the backend release hook, run exactly once on the first `stop`.
    ///
    /// If the watcher is already stopped the hook runs immediately.
    pub fn set_on_stop<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.stopped {
            drop(state);
            hook();
        } else {
            state.on_stop = Some(Box::new(hook));
        }
    }

    /// Name of the source feeding this watcher.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` once stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }

    /// Number of change sets waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }
}

impl Watcher for ChannelWatcher {
    fn next(&self) -> Result<ChangeSet> {
        let mut state = self.shared.lock();
        loop {
            if state.stopped {
                return Err(ConfigError::WatcherStopped);
            }
            if let Some(change_set) = state.queue.pop_front() {
                self.shared.not_full.notify_one();
                return Ok(change_set);
            }
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn stop(&self) -> Result<()> {
        let hook = {
            let mut state = self.shared.lock();
            if state.stopped {
                return Ok(());
            }
            state.stopped = true;
            state.queue.clear();
            state.on_stop.take()
        };
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        tracing::debug!("Watcher for source '{}' stopped", self.source);

        // The hook may join a backend thread blocked in send; the lock is released.
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}

impl Drop for ChannelWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for ChannelWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelWatcher")
            .field("source", &self.source)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn cs(data: &str) -> ChangeSet {
        ChangeSet::new("json", "test", data.as_bytes().to_vec())
    }

    #[test]
    fn test_fifo_delivery() {
        let (tx, watcher) = channel("test", 4);
        tx.send(cs("1")).unwrap();
        tx.send(cs("2")).unwrap();
        tx.send(cs("3")).unwrap();
        assert_eq!(watcher.pending(), 3);
        assert_eq!(watcher.next().unwrap().data(), b"1");
        assert_eq!(watcher.next().unwrap().data(), b"2");
        assert_eq!(watcher.next().unwrap().data(), b"3");
    }

    #[test]
    fn test_stop_twice_succeeds() {
        let (_tx, watcher) = channel("test", 1);
        assert!(watcher.stop().is_ok());
        assert!(watcher.stop().is_ok());
        assert!(watcher.is_stopped());
    }

    #[test]
    fn test_stop_discards_pending() {
        let (tx, watcher) = channel("test", 2);
        tx.send(cs("1")).unwrap();
        watcher.stop().unwrap();
        assert!(watcher.next().unwrap_err().is_watcher_stopped());
        assert!(tx.is_stopped());
    }

    #[test]
    fn test_stop_unblocks_next() {
        let (_tx, watcher) = channel("test", 1);
        let watcher = Arc::new(watcher);
        let blocked = Arc::clone(&watcher);
        let handle = thread::spawn(move || blocked.next());

        thread::sleep(Duration::from_millis(50));
        watcher.stop().unwrap();
        let result = handle.join().unwrap();
        assert!(result.unwrap_err().is_watcher_stopped());
    }

    #[test]
    fn test_stop_unblocks_full_send() {
        let (tx, watcher) = channel("test", 1);
        tx.send(cs("1")).unwrap();
        let handle = thread::spawn(move || tx.send(cs("2")));

        thread::sleep(Duration::from_millis(50));
        watcher.stop().unwrap();
        assert!(handle.join().unwrap().unwrap_err().is_watcher_stopped());
    }

    #[test]
    fn test_send_blocks_until_consumed() {
        let (tx, watcher) = channel("test", 1);
        tx.send(cs("1")).unwrap();
        let handle = thread::spawn(move || {
            tx.send(cs("2")).unwrap();
        });

        assert_eq!(watcher.next().unwrap().data(), b"1");
        assert_eq!(watcher.next().unwrap().data(), b"2");
        handle.join().unwrap();
    }

    #[test]
    fn test_hook_runs_once_under_concurrent_stop() {
        let (_tx, watcher) = channel("test", 1);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        watcher.set_on_stop(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let watcher = Arc::new(watcher);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let w = Arc::clone(&watcher);
                thread::spawn(move || w.stop())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_after_stop_runs_immediately() {
        let (_tx, watcher) = channel("test", 1);
        watcher.stop().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        watcher.set_on_stop(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let (tx, watcher) = channel("test", 0);
        tx.send(cs("1")).unwrap();
        assert_eq!(watcher.next().unwrap().data(), b"1");
    }

    #[test]
    fn test_drop_stops() {
        let (tx, watcher) = channel("test", 1);
        drop(watcher);
        assert!(tx.is_stopped());
    }
}
