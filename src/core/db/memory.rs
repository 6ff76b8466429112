use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::db::{
    DocumentStore,
    document::{Document, DocumentWrite, Query, Snapshot, Timestamp, new_document_id},
    error::{StoreError, StoreResult},
    listeners::{ListenerRegistry, Subscription},
};

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Map<String, Value>>>,
    denied: HashSet<String>,
    last_timestamp: Option<Timestamp>,
}

impl MemoryState {
    fn check(&self, collection: &str) -> StoreResult<()> {
        if self.denied.contains(collection) {
            return Err(StoreError::PermissionDenied(collection.to_string()));
        }
        Ok(())
    }

    fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn run(&self, query: &Query) -> StoreResult<Snapshot> {
        self.check(query.collection_name())?;
        Ok(Snapshot::new(
            query.apply(self.documents(query.collection_name())),
        ))
    }

    fn next_timestamp(&mut self) -> Timestamp {
        let ts = Timestamp::next_server_time(self.last_timestamp);
        self.last_timestamp = Some(ts);
        ts
    }
}

/// In-process document store with live queries.
///
/// Writes notify listeners before they return, so a write's snapshot is
/// always queued by the time its caller resumes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    listeners: ListenerRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every call on `collection` with a permission error. Live
    /// listeners on it receive the error and are closed.
    pub fn deny(&self, collection: &str) {
        let mut state = self.lock();
        state.denied.insert(collection.to_string());
        for (id, _) in self.listeners.queries_for(collection) {
            self.listeners
                .deliver(id, Err(StoreError::PermissionDenied(collection.to_string())));
        }
    }

    pub fn allow(&self, collection: &str) {
        self.lock().denied.remove(collection);
    }

    /// Number of live subscriptions on `collection`.
    pub fn listener_count(&self, collection: &str) -> usize {
        self.listeners.active(collection)
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn notify(&self, state: &MemoryState, collection: &str) {
        for (id, query) in self.listeners.queries_for(collection) {
            self.listeners.deliver(id, state.run(&query));
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn get_documents(&self, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(self.lock().run(query)?.documents)
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let state = self.lock();
        state.check(collection)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn add_document(&self, collection: &str, write: DocumentWrite) -> StoreResult<String> {
        let mut state = self.lock();
        state.check(collection)?;
        let id = new_document_id();
        let now = state.next_timestamp();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), write.resolve(now));
        debug!(collection, id = %id, "document added");
        self.notify(&state, collection);
        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        state.check(collection)?;
        let now = state.next_timestamp();
        let Some(existing) = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        existing.extend(write.resolve(now));
        debug!(collection, id, "document updated");
        self.notify(&state, collection);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut state = self.lock();
        state.check(collection)?;
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            debug!(collection, id, "document deleted");
            self.notify(&state, collection);
        }
        Ok(())
    }

    async fn listen(&self, query: Query) -> Subscription {
        let state = self.lock();
        let initial = state.run(&query);
        self.listeners.register(query, initial)
    }
}
