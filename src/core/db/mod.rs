mod document;
mod error;
mod listeners;
mod memory;
mod sqlite;
mod state;

use std::{future::Future, sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    config::Config,
    core::auth::{AuthError, AuthProvider, AuthStateStream, UserIdentity},
};

pub use document::{
    Direction, Document, DocumentWrite, Query, Snapshot, Target, Timestamp,
};
pub use error::{StoreError, StoreResult};
pub use listeners::Subscription;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// The hosted document database as seen by this crate.
pub trait DocumentStore: Send + Sync + 'static {
    /// Collection read, filtered and ordered by `query`.
    fn get_documents(
        &self,
        query: &Query,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Create a document and return the id the store assigned to it.
    fn add_document(
        &self,
        collection: &str,
        write: DocumentWrite,
    ) -> impl Future<Output = StoreResult<String>> + Send;

    /// Merge fields into an existing document. Fails with `NotFound` if it is missing.
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Open a live query. The current snapshot is delivered first.
    fn listen(&self, query: Query) -> impl Future<Output = Subscription> + Send;
}

struct GatewayInner<S, A> {
    store: S,
    auth: A,
    call_timeout: Option<Duration>,
}

/// Shared handle to the document store and the auth service.
///
/// Cloning is cheap; every store and sync module receives its own clone.
pub struct Gateway<S, A> {
    inner: Arc<GatewayInner<S, A>>,
}

impl<S, A> Clone for Gateway<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A> std::fmt::Debug for Gateway<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("call_timeout", &self.inner.call_timeout)
            .finish()
    }
}

impl<S: DocumentStore, A: AuthProvider> Gateway<S, A> {
    pub fn new(store: S, auth: A, config: &Config) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                store,
                auth,
                call_timeout: config.call_timeout,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn auth(&self) -> &A {
        &self.inner.auth
    }

    /// Without a configured timeout a stalled call waits forever.
    async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        let result = match self.inner.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(StoreError::Timeout(limit))),
            None => fut.await,
        };
        if let Err(err) = &result {
            debug!(op, error = %err, "remote call failed");
        }
        result
    }

    pub async fn get_documents(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.call("get_documents", self.inner.store.get_documents(query))
            .await
    }

    pub async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.call("get_document", self.inner.store.get_document(collection, id))
            .await
    }

    pub async fn add_document(&self, collection: &str, write: DocumentWrite) -> StoreResult<String> {
        self.call("add_document", self.inner.store.add_document(collection, write))
            .await
    }

    pub async fn update_document(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> StoreResult<()> {
        self.call(
            "update_document",
            self.inner.store.update_document(collection, id, write),
        )
        .await
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.call("delete_document", self.inner.store.delete_document(collection, id))
            .await
    }

    pub async fn listen(&self, query: Query) -> Subscription {
        self.inner.store.listen(query).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity, AuthError> {
        self.inner
            .auth
            .sign_in_with_email_and_password(email, password)
            .await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.auth.sign_out().await
    }

    pub fn on_auth_state_changed(&self) -> AuthStateStream {
        self.inner.auth.on_auth_state_changed()
    }
}
