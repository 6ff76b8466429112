use std::path::Path;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::db::{
    DocumentStore,
    document::{Document, DocumentWrite, Query, Snapshot, Target, Timestamp, new_document_id},
    error::{StoreError, StoreResult},
    listeners::{ListenerRegistry, Subscription},
    state::StoreState,
};

/// Document store persisted in a SQLite file.
///
/// Each document is one row of JSON. Writes and listener registration are
/// serialized so every subscription sees snapshots in commit order.
#[derive(Debug)]
pub struct SqliteStore {
    state: StoreState,
    listeners: ListenerRegistry,
    write_lock: Mutex<Option<Timestamp>>,
}

fn parse_data(data: &str) -> StoreResult<Map<String, Value>> {
    Ok(serde_json::from_str(data)?)
}

impl SqliteStore {
    pub async fn open<P: AsRef<Path>>(database_file: P) -> StoreResult<Self> {
        let state = StoreState::new(database_file).await?;
        info!(path = ?state.database_file(), "document store opened");
        Ok(Self {
            state,
            listeners: ListenerRegistry::default(),
            write_lock: Mutex::new(None),
        })
    }

    /// Flush and close the underlying pool. Required before dropping in an
    /// async context if the WAL should be folded into the database file.
    pub async fn close(&self) -> StoreResult<()> {
        self.state.close().await
    }

    pub fn listener_count(&self, collection: &str) -> usize {
        self.listeners.active(collection)
    }

    async fn run(&self, query: &Query) -> StoreResult<Snapshot> {
        let mut conn = self.state.conn().await?;
        let rows: Vec<(String, String)> = match query.target() {
            Target::Collection => {
                sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1")
                    .bind(query.collection_name())
                    .fetch_all(&mut **conn)
                    .await?
            }
            Target::Document(id) => {
                sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
                    .bind(query.collection_name())
                    .bind(id)
                    .fetch_all(&mut **conn)
                    .await?
            }
        };
        let documents = rows
            .into_iter()
            .map(|(id, data)| Ok(Document::new(id, parse_data(&data)?)))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Snapshot::new(query.apply(documents)))
    }

    async fn notify(&self, collection: &str) {
        for (id, query) in self.listeners.queries_for(collection) {
            let result = self.run(&query).await;
            self.listeners.deliver(id, result);
        }
    }

    async fn fetch_data(&self, collection: &str, id: &str) -> StoreResult<Option<String>> {
        let mut conn = self.state.conn().await?;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
        Ok(row.map(|(data,)| data))
    }
}

impl DocumentStore for SqliteStore {
    async fn get_documents(&self, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(self.run(query).await?.documents)
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        match self.fetch_data(collection, id).await? {
            Some(data) => Ok(Some(Document::new(id, parse_data(&data)?))),
            None => Ok(None),
        }
    }

    async fn add_document(&self, collection: &str, write: DocumentWrite) -> StoreResult<String> {
        let mut last_timestamp = self.write_lock.lock().await;
        let now = Timestamp::next_server_time(*last_timestamp);
        *last_timestamp = Some(now);

        let id = new_document_id();
        let data = serde_json::to_string(&write.resolve(now))?;
        {
            let mut conn = self.state.conn().await?;
            sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(&id)
                .bind(data)
                .execute(&mut **conn)
                .await?;
        }
        debug!(collection, id = %id, "document added");
        self.notify(collection).await;
        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        write: DocumentWrite,
    ) -> StoreResult<()> {
        let mut last_timestamp = self.write_lock.lock().await;
        let Some(existing) = self.fetch_data(collection, id).await? else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        let now = Timestamp::next_server_time(*last_timestamp);
        *last_timestamp = Some(now);

        let mut data = parse_data(&existing)?;
        data.extend(write.resolve(now));
        let data = serde_json::to_string(&data)?;
        {
            let mut conn = self.state.conn().await?;
            sqlx::query("UPDATE documents SET data = $1 WHERE collection = $2 AND id = $3")
                .bind(data)
                .bind(collection)
                .bind(id)
                .execute(&mut **conn)
                .await?;
        }
        debug!(collection, id, "document updated");
        self.notify(collection).await;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let _write = self.write_lock.lock().await;
        let removed = {
            let mut conn = self.state.conn().await?;
            sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .execute(&mut **conn)
                .await?
                .rows_affected()
        };
        if removed > 0 {
            debug!(collection, id, "document deleted");
            self.notify(collection).await;
        }
        Ok(())
    }

    async fn listen(&self, query: Query) -> Subscription {
        let _write = self.write_lock.lock().await;
        let initial = self.run(&query).await;
        self.listeners.register(query, initial)
    }
}
