//! SQLite-backed link store.
//!
//! Uniqueness is enforced by a UNIQUE index on the `link` column and
//! `INSERT ... ON CONFLICT(link) DO NOTHING`, so the check-and-insert is a
//! single atomic statement no matter how many sessions share the pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::{AcceptOutcome, Link, LinkStore, StoreError, is_valid_table_name};

/// Persistent record of every link ever accepted.
///
/// Uses SQLite with WAL mode so concurrent sessions writing through the same
/// pool do not block readers.
#[derive(Clone)]
pub struct SqliteLinkStore {
    pool: SqlitePool,
    table: String,
    path: PathBuf,
}

impl SqliteLinkStore {
    /// Open the database at `path`, creating it if missing.
    ///
    /// The table itself is created by [`LinkStore::ensure_unique_index`].
    pub async fn connect(path: &Path, table: &str) -> Result<Self, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Connect(format!("{}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect(format!("{}: {e}", path.display())))?;

        info!(target: "linkharvest::store", "Opened link store at {} (table {table})", path.display());

        Ok(Self {
            pool,
            table: table.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Number of recorded links
    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Look up a recorded link by its exact value
    pub async fn find(&self, url: &str) -> Result<Option<Link>, StoreError> {
        let row: Option<(String, Option<String>)> = sqlx::query_as(&format!(
            "SELECT link, category FROM {} WHERE link = ?",
            self.table
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(url, category)| Link { url, category }))
    }
}

#[async_trait]
impl LinkStore for SqliteLinkStore {
    async fn ensure_unique_index(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link TEXT NOT NULL,
                category TEXT,
                discovered_at INTEGER NOT NULL
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        // Fails if the table already holds duplicates, which must stop startup
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_link ON {table}(link)",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        info!(target: "linkharvest::store", "Unique index on '{}.link' is in place", self.table);
        Ok(())
    }

    async fn accept(&self, link: &Link) -> Result<AcceptOutcome, StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Closed);
        }

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (link, category, discovered_at)
            VALUES (?, ?, ?)
            ON CONFLICT(link) DO NOTHING
            "#,
            self.table
        ))
        .bind(&link.url)
        .bind(link.category.as_deref())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(target: "linkharvest::store", "Recorded new link: {}", link.url);
            Ok(AcceptOutcome::Inserted)
        } else {
            Ok(AcceptOutcome::Duplicate)
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        info!(target: "linkharvest::store", "Closed link store at {}", self.path.display());
    }
}
