//! The wait queue that matches inbound messages to blocked request call
//! sites.
//!
//! One producer path (the receive loop) inserts with [`WaitQueue::deliver`];
//! any number of tasks block in [`WaitQueue::wait`] for the key their
//! request carried. A single generation counter is bumped on every delivery
//! and on shutdown; every blocked waiter re-checks its own key after each
//! bump and re-arms with its remaining timeout.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kestrel_proto::{CorrelationKey, Message};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::WaitQueueConfig;
use crate::error::ConfigError;
use crate::jobs;

pub(crate) struct PendingEntry {
    pub(crate) message: Message,
    pub(crate) arrived: Instant,
}

pub(crate) struct QueueState {
    pub(crate) pending: HashMap<CorrelationKey, VecDeque<PendingEntry>>,
    pub(crate) open: bool,
}

impl QueueState {
    fn new() -> Self {
        Self { pending: HashMap::new(), open: true }
    }

    /// Removes and returns the oldest pending message for `key`.
    fn take_first(&mut self, key: &CorrelationKey) -> Option<Message> {
        let entries = self.pending.get_mut(key)?;
        let entry = entries.pop_front();
        if entries.is_empty() {
            self.pending.remove(key);
        }
        entry.map(|entry| entry.message)
    }

    /// Drops every entry that has been pending for `max_age` or longer.
    pub(crate) fn evict_stale(&mut self, max_age: Duration) -> usize {
        let mut evicted = 0;
        self.pending.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.arrived.elapsed() < max_age);
            evicted += before - entries.len();
            !entries.is_empty()
        });
        evicted
    }

    fn discard_all(&mut self) -> usize {
        let discarded = self.pending.values().map(VecDeque::len).sum();
        self.pending.clear();
        discarded
    }
}

pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) max_age: Duration,
    pub(crate) state: Mutex<QueueState>,
    pub(crate) wakeup: watch::Sender<u64>,
}

impl Shared {
    pub(crate) fn new<T: Into<String>>(name: T, max_age: Duration) -> Self {
        let (wakeup, _) = watch::channel(0);
        Self { name: name.into(), max_age, state: Mutex::new(QueueState::new()), wakeup }
    }

    fn notify(&self) {
        self.wakeup.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// Holds delivered messages until a matching [`wait`](WaitQueue::wait)
/// claims them, FIFO per correlation key.
///
/// Owned by a session, one per connection, shared behind an [`Arc`] between
/// the receive loop and request call sites. The housekeeper task spawned by
/// [`new`](WaitQueue::new) evicts messages nobody claims; it is cancelled by
/// [`shutdown`](WaitQueue::shutdown) or when the queue is dropped.
pub struct WaitQueue {
    shared: Arc<Shared>,
    default_timeout: Duration,
    cancel: CancellationToken,
}

impl WaitQueue {
    /// Validates `config` and spawns the housekeeper, so this must be called
    /// within a Tokio runtime.
    pub fn new(config: WaitQueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        if config.sweep_interval > config.max_age {
            log::warn!(
                "mwq({}): sweep interval {:?} exceeds max age {:?}, stale messages may linger",
                config.name,
                config.sweep_interval,
                config.max_age
            );
        }

        let shared = Arc::new(Shared::new(config.name, config.max_age));
        let cancel = CancellationToken::new();
        jobs::spawn_housekeeper(shared.clone(), config.sweep_interval, cancel.clone());

        log::debug!(
            "mwq({}): created, max age {:?}, sweep every {:?}",
            shared.name,
            shared.max_age,
            config.sweep_interval
        );

        Ok(Self { shared, default_timeout: config.default_timeout, cancel })
    }

    /// Inserts an inbound message and wakes blocked waiters.
    ///
    /// Fire-and-forget: never blocks beyond a brief lock, never fails. A
    /// message delivered after shutdown is dropped.
    pub fn deliver(&self, message: Message) {
        let key = message.key();

        {
            let Ok(mut state) = self.shared.state.lock() else { return };

            if !state.open {
                log::trace!("mwq({}): dropping {} delivered after shutdown", self.shared.name, key);
                return;
            }

            state
                .pending
                .entry(key)
                .or_default()
                .push_back(PendingEntry { message, arrived: Instant::now() });
        }

        self.shared.notify();
        log::trace!("mwq({}): delivered {}", self.shared.name, key);
    }

    /// Waits until a message matching `(code, id)` is pending and claims the
    /// oldest one.
    ///
    /// Returns `None` once `timeout` elapses without a match, or immediately
    /// if the queue has been shut down; callers cannot tell the two apart. A
    /// zero timeout is a non-blocking poll of the pending set.
    pub async fn wait(&self, code: u16, id: u32, timeout: Duration) -> Option<Message> {
        let key = CorrelationKey::new(code, id);
        let deadline = Instant::now() + timeout;
        let mut wakeup = self.shared.wakeup.subscribe();

        loop {
            {
                let Ok(mut state) = self.shared.state.lock() else { return None };

                if !state.open {
                    return None;
                }

                if let Some(message) = state.take_first(&key) {
                    log::trace!("mwq({}): claimed {}", self.shared.name, key);
                    return Some(message);
                }
            }

            // Wake-ups for other keys land here too; the deadline still holds.
            if Instant::now() >= deadline {
                log::trace!("mwq({}): wait for {} timed out", self.shared.name, key);
                return None;
            }

            match time::timeout_at(deadline, wakeup.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return None,
                Err(_) => {
                    log::trace!("mwq({}): wait for {} timed out", self.shared.name, key);
                    return None;
                }
            }
        }
    }

    /// [`wait`](Self::wait) with the configured default timeout.
    pub async fn wait_default(&self, code: u16, id: u32) -> Option<Message> {
        self.wait(code, id, self.default_timeout).await
    }

    /// Discards all pending messages without closing the queue.
    ///
    /// Used when a session reconnects: replies from the previous connection
    /// must not satisfy requests issued on the new one. Blocked waiters stay
    /// blocked.
    pub fn clear(&self) {
        let discarded = match self.shared.state.lock() {
            Ok(mut state) => state.discard_all(),
            Err(_) => return,
        };

        if discarded > 0 {
            log::debug!("mwq({}): cleared {} pending messages", self.shared.name, discarded);
        }
    }

    /// Closes the queue: stops the housekeeper, discards pending messages,
    /// and releases every blocked waiter with `None`. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();

        let discarded = match self.shared.state.lock() {
            Ok(mut state) if state.open => {
                state.open = false;
                Some(state.discard_all())
            }
            _ => None,
        };

        if let Some(discarded) = discarded {
            self.shared.notify();
            log::debug!(
                "mwq({}): shut down, discarded {} pending messages",
                self.shared.name,
                discarded
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.lock().map(|state| state.open).unwrap_or(false)
    }

    /// Number of delivered messages not yet claimed or evicted.
    pub fn pending_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| state.pending.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }
}

impl Drop for WaitQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: u16, id: u32, payload: &[u8]) -> PendingEntry {
        PendingEntry {
            message: Message::new(code, id, payload.to_vec()),
            arrived: Instant::now(),
        }
    }

    #[test]
    fn take_first_pops_in_arrival_order_and_drops_empty_keys() {
        let mut state = QueueState::new();
        let key = CorrelationKey::new(10, 1);
        state.pending.entry(key).or_default().push_back(entry(10, 1, b"a"));
        state.pending.entry(key).or_default().push_back(entry(10, 1, b"b"));

        assert_eq!(state.take_first(&key).map(Message::into_payload), Some(b"a".to_vec()));
        assert_eq!(state.take_first(&key).map(Message::into_payload), Some(b"b".to_vec()));
        assert!(state.take_first(&key).is_none());
        assert!(state.pending.is_empty());
    }

    #[test]
    fn take_first_ignores_other_keys() {
        let mut state = QueueState::new();
        let key = CorrelationKey::new(10, 1);
        state.pending.entry(key).or_default().push_back(entry(10, 1, b"a"));

        assert!(state.take_first(&CorrelationKey::new(10, 2)).is_none());
        assert!(state.take_first(&CorrelationKey::new(11, 1)).is_none());
        assert_eq!(state.pending.len(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn evict_stale_removes_only_aged_entries() {
        let mut state = QueueState::new();
        state.pending.entry(CorrelationKey::new(10, 1)).or_default().push_back(entry(10, 1, b"old"));

        time::advance(Duration::from_secs(6)).await;
        state.pending.entry(CorrelationKey::new(10, 2)).or_default().push_back(entry(10, 2, b"new"));

        assert_eq!(state.evict_stale(Duration::from_secs(5)), 1);
        assert!(!state.pending.contains_key(&CorrelationKey::new(10, 1)));
        assert!(state.pending.contains_key(&CorrelationKey::new(10, 2)));
    }

    #[test]
    fn discard_all_counts_every_entry() {
        let mut state = QueueState::new();
        state.pending.entry(CorrelationKey::new(10, 1)).or_default().push_back(entry(10, 1, b"a"));
        state.pending.entry(CorrelationKey::new(10, 1)).or_default().push_back(entry(10, 1, b"b"));
        state.pending.entry(CorrelationKey::new(20, 9)).or_default().push_back(entry(20, 9, b"c"));

        assert_eq!(state.discard_all(), 3);
        assert!(state.pending.is_empty());
    }
}
