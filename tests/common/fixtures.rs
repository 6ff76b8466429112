use std::{future::Future, time::Duration};

use folio_admin::{
    Config,
    core::{
        auth::{MemoryAuth, UserIdentity},
        db::{
            Document, DocumentStore, DocumentWrite, Gateway, MemoryStore, Query, SqliteStore,
            StoreResult, Subscription,
        },
    },
    models::{Project, ProjectStatus},
};
use tokio::sync::{Semaphore, watch};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct horse";

/// How long a test waits for asynchronous state before failing.
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub type TestGateway = Gateway<MemoryStore, MemoryAuth>;

pub fn test_config() -> Config {
    Config {
        call_timeout: Some(WAIT_LIMIT),
        ..Config::default()
    }
}

/// A gateway over an empty in-memory store and a provider with the admin account.
pub fn memory_gateway() -> (TestGateway, UserIdentity) {
    memory_gateway_with(MemoryAuth::new())
}

pub fn memory_gateway_with(auth: MemoryAuth) -> (TestGateway, UserIdentity) {
    let admin = auth.register(ADMIN_EMAIL, ADMIN_PASSWORD, Some("Admin"));
    (Gateway::new(MemoryStore::new(), auth, &test_config()), admin)
}

pub fn sample_project(name: &str) -> Project {
    Project {
        status: Some(ProjectStatus::Active),
        description: format!("{name} description"),
        tech_frontend: "Vue".to_string(),
        ..Project::named(name)
    }
}

/// Store `project` directly, bypassing the sync modules. Returns its id.
pub async fn seed_project<S: DocumentStore>(store: &S, project: &Project) -> String {
    let write = DocumentWrite::from_record(project)
        .expect("Failed to build project write")
        .with_server_timestamp("createdAt");
    store
        .add_document("projects", write)
        .await
        .expect("Failed to seed project")
}

/// Wait until `receiver` holds a value matching `predicate` and return it.
pub async fn wait_for<T: Clone>(
    receiver: &mut watch::Receiver<T>,
    predicate: impl FnMut(&T) -> bool,
) -> T {
    tokio::time::timeout(WAIT_LIMIT, receiver.wait_for(predicate))
        .await
        .expect("Timed out waiting for state")
        .expect("State sender dropped")
        .clone()
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Condition never became true");
}

/// Creates a SqliteStore in a temporary directory.
/// Returns both the store and the directory (which must be kept alive).
pub async fn create_sqlite_store() -> (SqliteStore, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let store = SqliteStore::open(dir.path().join("folio.db"))
        .await
        .expect("Failed to open test store");
    (store, dir)
}

/// Memory store whose updates wait until the test lets them through.
#[derive(Debug)]
pub struct GatedStore {
    inner: MemoryStore,
    gate: Semaphore,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            gate: Semaphore::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Let one pending or future update proceed.
    pub fn release_update(&self) {
        self.gate.add_permits(1);
    }
}

impl DocumentStore for GatedStore {
    fn get_documents(&self, query: &Query) -> impl Future<Output = StoreResult<Vec<Document>>> + Send {
        self.inner.get_documents(query)
    }

    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send {
        self.inner.get_document(collection, id)
    }

    fn add_document(
        &self,
        collection: &str,
        write: DocumentWrite,
    ) -> impl Future<Output = StoreResult<String>> + Send {
        self.inner.add_document(collection, write)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> StoreResult<()> {
        let permit = self.gate.acquire().await.expect("Gate closed");
        permit.forget();
        self.inner.update_document(collection, id, write).await
    }

    fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        self.inner.delete_document(collection, id)
    }

    fn listen(&self, query: Query) -> impl Future<Output = Subscription> + Send {
        self.inner.listen(query)
    }
}

pub fn gated_gateway(config: &Config) -> Gateway<GatedStore, MemoryAuth> {
    Gateway::new(GatedStore::new(), MemoryAuth::new(), config)
}
