//! SQLite-backed storage
//!
//! Documents and log records are stored as JSON text. Every write completes
//! before the call returns, so an acknowledged reading survives a crash.

use async_trait::async_trait;
use patak_common::{time, Error, Result};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

use super::Storage;

#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file and its tables
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        // WAL keeps dashboard reads from blocking the single writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        // One connection: every pooled connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_documents_table(&pool).await?;
        create_log_entries_table(&pool).await?;
        Ok(Self { pool })
    }
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            key TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_log_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            log TEXT NOT NULL,
            body TEXT NOT NULL,
            appended_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_log_entries_log ON log_entries(log, seq)")
        .execute(pool)
        .await?;
    Ok(())
}

fn decode(key: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| Error::Internal(format!("Corrupt record under '{}': {}", key, e)))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        body.map(|b| decode(key, &b)).transpose()
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let body = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO documents (key, body, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(body)
        .bind(time::format_timestamp(time::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append(&self, log: &str, record: &Value) -> Result<()> {
        let body = serde_json::to_string(record)?;
        sqlx::query("INSERT INTO log_entries (log, body, appended_at) VALUES (?, ?, ?)")
            .bind(log)
            .bind(body)
            .bind(time::format_timestamp(time::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scan(&self, log: &str) -> Result<Vec<Value>> {
        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT body FROM log_entries WHERE log = ? ORDER BY seq")
                .bind(log)
                .fetch_all(&self.pool)
                .await?;

        bodies.iter().map(|b| decode(log, b)).collect()
    }
}
