//! Host side of the change ledger.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sleipnir_shared::constants::DEFAULT_PRIORITY;

use crate::memory::HandleStrategy;

use super::{Batch, Instance, Memento, Priority};

/// Total order of submitted batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    timestamp: Duration,
    priority: Priority,
    sequence: u64,
}

struct PendingQueue<M: Memento> {
    batches: BTreeMap<QueueKey, Batch<M>>,
    next_sequence: u64,
}

impl<M: Memento> PendingQueue<M> {
    fn drain_until(&mut self, until: Duration) -> Vec<Batch<M>> {
        let mut due = Vec::new();
        while let Some(entry) = self.batches.first_entry() {
            if entry.key().timestamp > until {
                break;
            }
            due.push(entry.remove());
        }
        due
    }
}

/// Multi-producer, single-consumer queue of write batches.
///
/// Lives behind an [`Arc`]; every [`Instance`] holds a clone.
///
/// ## Usage
///
/// ```rust,ignore
/// let ledger = Changes::new(Arc::new(SlotAllocator::new()));
///
/// // producer
/// let mut batch = ledger.clone_instance(DEFAULT_PRIORITY);
/// let body = batch.add(memento);
/// batch.push(world_time);
///
/// // consumer
/// let mut due = ledger.pull(physics_time);
/// integrator.integrate(&mut bodies, &mut due);
/// ```
pub struct Changes<M: Memento> {
    queue: Mutex<PendingQueue<M>>,
    handles: Arc<dyn HandleStrategy<M::Handle>>,
}

impl<M: Memento> Changes<M> {
    /// Creates a ledger minting handles through `handles`.
    #[must_use]
    pub fn new(handles: Arc<dyn HandleStrategy<M::Handle>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(PendingQueue {
                batches: BTreeMap::new(),
                next_sequence: 0,
            }),
            handles,
        })
    }

    /// Creates an empty write batch bound to this ledger.
    #[must_use]
    pub fn clone_instance(self: &Arc<Self>, priority: Priority) -> Instance<M> {
        Instance::new(Arc::clone(self), priority)
    }

    /// Drains every submitted batch with a timestamp at or before `until` and
    /// merges them, in queue order, into one instance.
    #[must_use]
    pub fn pull(self: &Arc<Self>, until: Duration) -> Instance<M> {
        let due = self.queue.lock().drain_until(until);

        let mut merged = Instance::new(Arc::clone(self), DEFAULT_PRIORITY);
        for mut batch in due {
            merged.append_batch(&mut batch);
        }
        merged
    }

    /// Drains every submitted batch regardless of timestamp.
    #[must_use]
    pub fn pull_all(self: &Arc<Self>) -> Instance<M> {
        self.pull(Duration::MAX)
    }

    /// Number of submitted batches waiting to be pulled.
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.queue.lock().batches.len()
    }

    /// Timestamp of the earliest waiting batch.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.queue
            .lock()
            .batches
            .first_key_value()
            .map(|(key, _)| key.timestamp)
    }

    /// The handle strategy shared by every instance of this ledger.
    #[must_use]
    pub fn handles(&self) -> &Arc<dyn HandleStrategy<M::Handle>> {
        &self.handles
    }

    pub(crate) fn submit(&self, batch: Batch<M>, priority: Priority, timestamp: Duration) {
        let mut queue = self.queue.lock();
        let sequence = queue.next_sequence;
        queue.next_sequence += 1;
        queue.batches.insert(
            QueueKey {
                timestamp,
                priority,
                sequence,
            },
            batch,
        );
    }
}

impl<M: Memento> std::fmt::Debug for Changes<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Changes")
            .field("pending_batches", &self.pending_batches())
            .finish_non_exhaustive()
    }
}
