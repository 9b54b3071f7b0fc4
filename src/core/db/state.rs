use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::debug;

pub(super) struct CatalogState {
    database_path: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for CatalogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogState")
            .field("database_path", &self.database_path)
            .finish()
    }
}

impl CatalogState {
    pub(super) async fn new<P: AsRef<Path>>(database_path: P) -> anyhow::Result<Self> {
        let database_path = database_path.as_ref().to_path_buf();

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create catalog directory {:?}", parent)
                })?;
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await
            .with_context(|| format!("Failed to open catalog {:?}", database_path))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(path = %database_path.display(), "catalog opened");

        Ok(Self {
            database_path,
            pool,
        })
    }

    pub(super) async fn conn(&self) -> anyhow::Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub(super) fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Checkpoint the WAL and close every pooled connection
    pub(super) async fn close(&self) -> anyhow::Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&self.pool)
            .await?;
        self.pool.close().await;
        Ok(())
    }
}
