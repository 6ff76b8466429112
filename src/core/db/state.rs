use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use tokio::sync::{RwLock, RwLockReadGuard};

use std::{
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use crate::core::db::error::StoreResult;

pub(super) struct StoreState {
    database_file: PathBuf,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("database_file", &self.database_file)
            .finish()
    }
}

async fn connect(database_file: &Path) -> StoreResult<SqlitePool> {
    let connect_opts = SqliteConnectOptions::new()
        .filename(database_file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_opts)
        .await?)
}

impl StoreState {
    pub(super) async fn new<P: AsRef<Path>>(database_file: P) -> StoreResult<Self> {
        let database_file = database_file.as_ref().to_path_buf();
        let pool = connect(&database_file).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            database_file,
            pool: RwLock::new(pool),
        })
    }

    pub(super) fn database_file(&self) -> &Path {
        &self.database_file
    }

    /// Acquire a pooled connection and hold the pool read lock for the entire lifetime
    /// of the returned guard.
    pub(super) async fn conn(&self) -> StoreResult<DbConnGuard<'_>> {
        let pool_guard = self.pool.read().await;

        // Acquire while the read lock is held; the guard keeps it held.
        let conn = pool_guard.acquire().await?;

        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    /// Waits for in-flight queries, checkpoints the WAL and closes the pool.
    /// Any later query fails.
    pub(super) async fn close(&self) -> StoreResult<()> {
        let pool_guard = self.pool.write().await;
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;
        pool_guard.close().await;
        Ok(())
    }
}

pub struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
