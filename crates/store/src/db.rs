//! The SQLite pool behind a [`Repository`](crate::Repository).

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// How long a linker waits for another linker's write transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// Settings sqlx has no connect option for, run on every new connection.
const CONNECTION_PRAGMAS: &[&str] = &[
    // Merge chain walks read the same few items rows repeatedly.
    "PRAGMA cache_size = -16384",
    // Merges repoint sources, children and resources in bulk updates.
    "PRAGMA temp_store = MEMORY",
    "PRAGMA wal_autocheckpoint = 1000",
];

/// Handle to the catalog database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::configure(conn, meta).await }))
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (creating if needed) the catalog file and bring its schema up to
    /// date.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), max_connections))]
    pub async fn connect(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, max_connections).await
    }

    /// A throwaway catalog, gone once the pool closes. Available outside
    /// this crate so the library's tests can use it.
    pub async fn connect_in_memory() -> Result<Self> {
        // Each connection to ":memory:" is its own database.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // Merge pointers, parent links and resource ownership are
            // foreign keys with ON DELETE SET NULL.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    async fn configure(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        for pragma in CONNECTION_PRAGMAS {
            sqlx::query(*pragma).execute(&mut *conn).await?;
        }
        Ok(())
    }

    #[instrument("migrating catalog schema", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked out connections to come back, then close the pool.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let db = Database::connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1, "foreign_keys should be ON");
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1000);
        let row: (i64,) = sqlx::query_as("PRAGMA cache_size").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, -16384);
        db.close().await;
    }

    #[tokio::test]
    async fn test_connect_file_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let db = Database::connect(&path, 2).await.unwrap();
        assert!(path.exists());
        let tables: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap();
        assert!(tables.contains(&"items".to_string()));
        assert!(tables.contains(&"external_resources".to_string()));
        assert!(tables.contains(&"item_log".to_string()));
        db.close().await;
    }
}
