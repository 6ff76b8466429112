use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::core::db::{
    document::{Query, Snapshot},
    error::StoreResult,
};

/// Receiving end of a live query.
///
/// Yields the current snapshot first, then one snapshot per change. An error
/// item ends the stream. Dropping the subscription unregisters it.
#[derive(Debug)]
pub struct Subscription {
    receiver: UnboundedReceiver<StoreResult<Snapshot>>,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<StoreResult<Snapshot>> {
        self.receiver.recv().await
    }
}

struct Listener {
    id: u64,
    query: Query,
    sender: UnboundedSender<StoreResult<Snapshot>>,
}

/// Fan-out of snapshots to the live subscriptions of a store.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.lock().len())
            .finish()
    }
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a query with its initial result. A failed initial result is
    /// delivered and the subscription is closed straight away.
    pub(crate) fn register(&self, query: Query, initial: StoreResult<Snapshot>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let failed = initial.is_err();
        let _ = sender.send(initial);
        if !failed {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            debug!(listener = id, collection = query.collection_name(), "listener registered");
            self.lock().push(Listener { id, query, sender });
        }
        Subscription { receiver }
    }

    /// Live queries on `collection`. Listeners whose subscription was dropped are pruned.
    pub(crate) fn queries_for(&self, collection: &str) -> Vec<(u64, Query)> {
        let mut listeners = self.lock();
        listeners.retain(|listener| !listener.sender.is_closed());
        listeners
            .iter()
            .filter(|listener| listener.query.collection_name() == collection)
            .map(|listener| (listener.id, listener.query.clone()))
            .collect()
    }

    /// Send a result to one listener. Errors end the subscription.
    pub(crate) fn deliver(&self, id: u64, result: StoreResult<Snapshot>) {
        let mut listeners = self.lock();
        let Some(index) = listeners.iter().position(|listener| listener.id == id) else {
            return;
        };
        let failed = result.is_err();
        let delivered = listeners[index].sender.send(result).is_ok();
        if failed || !delivered {
            debug!(listener = id, "listener removed");
            listeners.remove(index);
        }
    }

    pub(crate) fn active(&self, collection: &str) -> usize {
        self.queries_for(collection).len()
    }
}
