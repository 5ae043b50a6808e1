//! Idempotent wake-up timers.
//!
//! Actors ask to be woken at a point in time; asking again while a wake-up
//! is already pending is a no-op and never moves the existing one. Due
//! entries are held in a min-ordered heap and delivered over a channel to
//! whatever dispatch loop the service runs.

use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Heap entry ordered by due time, ties broken by arming order. The key
/// itself takes no part in the ordering.
struct DueEntry<K> {
    at: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for DueEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<K> Eq for DueEntry<K> {}

impl<K> PartialOrd for DueEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for DueEntry<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap pops the earliest entry first.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner<K> {
    heap: BinaryHeap<DueEntry<K>>,
    pending: HashMap<K, Instant>,
    seq: u64,
}

/// Min-heap timer service with idempotent arming.
pub struct WakeScheduler<K> {
    inner: Mutex<Inner<K>>,
    notify: Notify,
    tx: mpsc::Sender<K>,
}

impl<K: Clone + Eq + Hash + Send + 'static> WakeScheduler<K> {
    /// Creates the scheduler and the receiving end that due keys are
    /// delivered on.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<K>) {
        let (tx, rx) = mpsc::channel(capacity);
        let scheduler = Arc::new(Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                pending: HashMap::new(),
                seq: 0,
            }),
            notify: Notify::new(),
            tx,
        });
        (scheduler, rx)
    }

    /// Arms a wake-up for `key` at `at`. Returns `false` without touching
    /// anything if one is already pending for the key.
    pub async fn ensure_wake_at(&self, key: K, at: Instant) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.pending.contains_key(&key) {
            return false;
        }
        inner.pending.insert(key.clone(), at);
        let seq = inner.seq;
        inner.seq += 1;
        inner.heap.push(DueEntry { at, seq, key });
        drop(inner);

        self.notify.notify_one();
        true
    }

    pub async fn ensure_wake_after(&self, key: K, delay: Duration) -> bool {
        self.ensure_wake_at(key, Instant::now() + delay).await
    }

    /// Due time of the pending wake-up for `key`, if any.
    pub async fn scheduled_for(&self, key: &K) -> Option<Instant> {
        self.inner.lock().await.pending.get(key).copied()
    }

    /// Runs until cancelled, delivering each key when its due time passes.
    /// A key is removed from the pending set before delivery, so handlers
    /// may re-arm themselves from inside the wake.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        loop {
            let next_at = { self.inner.lock().await.heap.peek().map(|e| e.at) };

            match next_at {
                Some(at) => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        // An earlier wake-up may have been armed meanwhile.
                        _ = self.notify.notified() => continue,
                        _ = tokio::time::sleep_until(at) => {}
                    }

                    let due = {
                        let mut inner = self.inner.lock().await;
                        let now = Instant::now();
                        let mut due = Vec::new();
                        while inner.heap.peek().is_some_and(|e| e.at <= now) {
                            let entry = match inner.heap.pop() {
                                Some(e) => e,
                                None => break,
                            };
                            inner.pending.remove(&entry.key);
                            due.push(entry.key);
                        }
                        due
                    };

                    for key in due {
                        if self.tx.send(key).await.is_err() {
                            debug!("wake receiver dropped, scheduler stopping");
                            return;
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
    }
}
