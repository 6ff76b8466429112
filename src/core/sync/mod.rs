//! Local mirrors of remote collections.
//!
//! Each module owns at most one live subscription. Every snapshot replaces the
//! whole mirror; writes are forwarded to the gateway and come back through the
//! subscription.

mod attendees;
mod projects;

use std::{
    marker::PhantomData,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::core::{
    auth::AuthProvider,
    db::{Direction, DocumentStore, DocumentWrite, Gateway, Query, Snapshot, StoreResult},
};

pub use attendees::Attendees;
pub use projects::{
    LOAD_FAILED, PROJECT_NOT_FOUND, ProjectDetail, ProjectDetailState, Projects,
};

/// A record type kept in sync with one collection.
pub trait SyncedRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Server-assigned timestamp field; the mirror is sorted on it, newest first.
    const ORDER_FIELD: &'static str;
    /// Shown when the live subscription fails.
    const LOAD_ERROR: &'static str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Release capability for a live subscription.
///
/// Releasing twice is a no-op; dropping the handle releases it.
#[derive(Debug)]
pub struct ListenerHandle {
    collection: &'static str,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    fn new(collection: &'static str, task: JoinHandle<()>) -> Self {
        Self {
            collection,
            task: Some(task),
        }
    }

    pub fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(collection = self.collection, "listener released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn decode_snapshot<T: SyncedRecord>(snapshot: &Snapshot) -> Vec<T> {
    snapshot
        .documents
        .iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(collection = T::COLLECTION, id = %doc.id, error = %err, "skipping malformed document");
                None
            }
        })
        .collect()
}

/// Live mirror of the collection of `T` plus the writes against it.
pub struct CollectionSync<T, S, A> {
    gateway: Gateway<S, A>,
    state: Arc<watch::Sender<CollectionState<T>>>,
    listener: Mutex<Option<ListenerHandle>>,
    _record: PhantomData<fn() -> T>,
}

impl<T, S, A> CollectionSync<T, S, A>
where
    T: SyncedRecord,
    S: DocumentStore,
    A: AuthProvider,
{
    pub fn new(gateway: Gateway<S, A>) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        Self {
            gateway,
            state: Arc::new(state),
            listener: Mutex::new(None),
            _record: PhantomData,
        }
    }

    fn listener(&self) -> MutexGuard<'_, Option<ListenerHandle>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the live subscription, replacing any previous one.
    ///
    /// Failures end the subscription and are recorded in `error`; there is no retry.
    pub async fn init_listener(&self) {
        self.release();
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let query =
            Query::collection(T::COLLECTION).order_by(T::ORDER_FIELD, Direction::Descending);
        let mut subscription = self.gateway.listen(query).await;
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(result) = subscription.next().await {
                match result {
                    Ok(snapshot) => {
                        let items = decode_snapshot::<T>(&snapshot);
                        debug!(collection = T::COLLECTION, count = items.len(), "snapshot");
                        state.send_modify(|state| {
                            state.items = items;
                            state.loading = false;
                        });
                    }
                    Err(err) => {
                        error!(collection = T::COLLECTION, error = %err, "listener failed");
                        state.send_modify(|state| {
                            state.error = Some(T::LOAD_ERROR.to_string());
                            state.loading = false;
                        });
                        break;
                    }
                }
            }
        });

        // A concurrent init may have stored a handle meanwhile; replacing drops it.
        *self.listener() = Some(ListenerHandle::new(T::COLLECTION, task));
    }

    /// Release the live subscription, if any. Safe to call repeatedly.
    pub fn release(&self) {
        let handle = self.listener().take();
        if let Some(mut handle) = handle {
            handle.release();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener().as_ref().is_some_and(ListenerHandle::is_active)
    }

    /// Create a record with a server-assigned timestamp and return its id.
    ///
    /// The mirror is not touched; the new record arrives with the next snapshot.
    pub async fn add(&self, record: &T) -> StoreResult<String> {
        let write = DocumentWrite::from_record(record)?.with_server_timestamp(T::ORDER_FIELD);
        self.gateway
            .add_document(T::COLLECTION, write)
            .await
            .inspect_err(|err| error!(collection = T::COLLECTION, error = %err, "add failed"))
    }

    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        self.gateway
            .delete_document(T::COLLECTION, id)
            .await
            .inspect_err(|err| error!(collection = T::COLLECTION, id, error = %err, "delete failed"))
    }

    pub fn state(&self) -> CollectionState<T> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }
}
