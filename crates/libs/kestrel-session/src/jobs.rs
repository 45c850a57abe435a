//! Background housekeeping for the wait queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::queue::Shared;

/// Spawns the periodic sweep owned by a wait queue. The loop exits when
/// `cancel` fires; no sweep runs after that.
pub(crate) fn spawn_housekeeper(
    shared: Arc<Shared>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::trace!("mwq({}): housekeeper started", shared.name);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(interval) => sweep_expired(&shared),
            }
        }
        log::trace!("mwq({}): housekeeper stopped", shared.name);
    })
}

/// One sweep: evict every pending message older than the hold time.
///
/// An unavailable pending set skips this sweep; the schedule continues.
pub(crate) fn sweep_expired(shared: &Shared) {
    let Ok(mut state) = shared.state.lock() else {
        log::warn!("mwq({}): pending set unavailable, skipping sweep", shared.name);
        return;
    };

    let evicted = state.evict_stale(shared.max_age);
    if evicted > 0 {
        log::debug!("mwq({}): evicted {} stale messages", shared.name, evicted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PendingEntry;
    use kestrel_proto::{CorrelationKey, Message};
    use tokio::time::Instant;

    fn insert(shared: &Shared, code: u16, id: u32) {
        let mut state = shared.state.lock().expect("state lock");
        state.pending.entry(CorrelationKey::new(code, id)).or_default().push_back(PendingEntry {
            message: Message::new(code, id, Vec::new()),
            arrived: Instant::now(),
        });
    }

    fn pending(shared: &Shared) -> usize {
        let state = shared.state.lock().expect("state lock");
        state.pending.values().map(|entries| entries.len()).sum()
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn sweep_keeps_fresh_entries() {
        let shared = Shared::new("test", Duration::from_secs(5));
        insert(&shared, 10, 1);

        time::advance(Duration::from_secs(3)).await;
        sweep_expired(&shared);

        assert_eq!(pending(&shared), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn sweep_evicts_entries_past_the_hold_time() {
        let shared = Shared::new("test", Duration::from_secs(5));
        insert(&shared, 10, 1);

        time::advance(Duration::from_secs(3)).await;
        insert(&shared, 10, 2);

        time::advance(Duration::from_secs(3)).await;
        sweep_expired(&shared);

        assert_eq!(pending(&shared), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn housekeeper_stops_on_cancellation() {
        let shared = Arc::new(Shared::new("test", Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let handle = spawn_housekeeper(shared, Duration::from_secs(1), cancel.clone());

        cancel.cancel();
        handle.await.expect("housekeeper join");
    }
}
