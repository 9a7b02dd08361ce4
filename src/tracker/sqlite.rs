//! SQLite-backed completion tracker.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::CompletionTracker;
use crate::error::DatabaseError;
use crate::types::ItemId;
use crate::{Error, Result};

/// Persists finished item ids so a later run can skip them
///
/// Ids are stored as SQLite `INTEGER` (i64); the u64 <-> i64 cast is
/// bit-preserving in both directions.
#[derive(Debug, Clone)]
pub struct SqliteTracker {
    pool: SqlitePool,
}

impl SqliteTracker {
    /// Open the tracker database, creating it and its schema if missing
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let tracker = Self { pool };
        tracker.run_migrations().await?;
        Ok(tracker)
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        // MAX() yields a single NULL row on an empty table
        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?;

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: finished items table
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying completion tracker migration v1");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS finished_items (
                item_id INTEGER PRIMARY KEY,
                finished_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create finished_items table: {}",
                e
            )))
        })?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, ?)")
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration v1: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record `id` as finished
    ///
    /// Unlike [`CompletionTracker::finish`], this surfaces storage errors.
    pub async fn mark_finished(&self, id: ItemId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO finished_items (item_id, finished_at)
            VALUES (?, ?)
            "#,
        )
        .bind(id.0 as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark item {} finished: {}",
                id, e
            )))
        })?;

        Ok(())
    }

    /// Whether `id` was recorded as finished, in this run or an earlier one
    pub async fn is_finished(&self, id: ItemId) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT item_id FROM finished_items WHERE item_id = ?")
                .bind(id.0 as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to look up item {}: {}",
                        id, e
                    )))
                })?;

        Ok(found.is_some())
    }

    /// All finished ids, ascending by stored value
    pub async fn finished_ids(&self) -> Result<Vec<ItemId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT item_id FROM finished_items ORDER BY item_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list finished items: {}",
                        e
                    )))
                })?;

        Ok(ids.into_iter().map(|id| ItemId(id as u64)).collect())
    }
}

#[async_trait]
impl CompletionTracker for SqliteTracker {
    async fn finish(&self, id: ItemId) {
        if let Err(e) = self.mark_finished(id).await {
            tracing::error!(item_id = id.0, error = %e, "Failed to record finished item");
        }
    }
}
