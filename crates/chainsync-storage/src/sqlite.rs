//! SQLite storage backend for chainsync.
//!
//! Persists transactions and the checkpoint to a single SQLite file.
//! Uses `sqlx` with WAL mode so readers are not blocked by the writer.
//!
//! # Usage
//! ```rust,no_run
//! use chainsync_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./chainsync.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use chainsync_core::checkpoint::{Checkpoint, CheckpointStore};
use chainsync_core::error::SyncError;
use chainsync_core::store::TransactionStore;
use chainsync_core::types::TransactionRecord;

/// SQLite-backed storage for transactions and checkpoints.
pub struct SqliteStorage {
    pool: SqlitePool,
}

fn storage_err(e: sqlx::Error) -> SyncError {
    SyncError::Storage(e.to_string())
}

/// Map a single-row write error, recognising primary-key/unique violations.
fn write_err(e: sqlx::Error, hash: &str) -> SyncError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => SyncError::DuplicateKey {
            hash: hash.to_string(),
        },
        _ => storage_err(e),
    }
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./chainsync.db"`) or a full
    /// SQLite URL (`"sqlite:./chainsync.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, SyncError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Limited to one connection, since every connection to `:memory:` is a
    /// separate database. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                key          TEXT    NOT NULL PRIMARY KEY,
                block_number INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                hash         TEXT NOT NULL PRIMARY KEY,
                from_address TEXT NOT NULL,
                to_address   TEXT,
                value        TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tx_from ON transactions (from_address);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tx_to ON transactions (to_address);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    // ─── Lookups ────────────────────────────────────────────────────────────────

    /// Fetch a stored transaction by hash.
    pub async fn transaction(&self, hash: &str) -> Result<Option<TransactionRecord>, SyncError> {
        let row = sqlx::query(
            "SELECT hash, from_address, to_address, value FROM transactions WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| TransactionRecord {
            hash: r.get("hash"),
            from_address: r.get("from_address"),
            to_address: r.get("to_address"),
            value: r.get("value"),
        }))
    }

    /// Total number of stored transactions.
    pub async fn transaction_count(&self) -> Result<u64, SyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

// ─── TransactionStore impl ──────────────────────────────────────────────────

#[async_trait]
impl TransactionStore for SqliteStorage {
    async fn existing_hashes(&self, hashes: &[String]) -> Result<HashSet<String>, SyncError> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT hash FROM transactions WHERE hash IN (");
        let mut list = qb.separated(", ");
        for hash in hashes {
            list.push_bind(hash);
        }
        list.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(storage_err)?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("hash")).collect())
    }

    async fn save_batch(&self, records: &[TransactionRecord]) -> Result<(), SyncError> {
        if records.is_empty() {
            return Ok(());
        }

        // A single multi-row INSERT is atomic.
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("INSERT INTO transactions (hash, from_address, to_address, value) ");
        qb.push_values(records, |mut row, r| {
            row.push_bind(&r.hash)
                .push_bind(&r.from_address)
                .push_bind(&r.to_address)
                .push_bind(&r.value);
        });

        qb.build()
            .execute(&self.pool)
            .await
            .map_err(|e| {
                // The offending row is unknown; the caller retries row by row.
                SyncError::Storage(format!("batch of {} rejected: {e}", records.len()))
            })?;

        debug!(count = records.len(), "transaction batch stored");
        Ok(())
    }

    async fn save(&self, record: &TransactionRecord) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO transactions (hash, from_address, to_address, value)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.hash)
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(&record.value)
        .execute(&self.pool)
        .await
        .map_err(|e| write_err(e, &record.hash))?;

        Ok(())
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(&self, key: &str) -> Result<Option<Checkpoint>, SyncError> {
        let row = sqlx::query(
            "SELECT key, block_number, updated_at FROM checkpoints WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| Checkpoint {
            key: r.get("key"),
            block_number: r.get::<i64, _>("block_number") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints (key, block_number, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(&checkpoint.key)
        .bind(checkpoint.block_number as i64)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(key = %checkpoint.key, block = checkpoint.block_number, "checkpoint saved");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM checkpoints WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
