//! SQLite request log used for per-chat cooldowns and usage stats.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;

const SECS_PER_DAY: i64 = 86_400;
const MAX_CONNECTIONS: u32 = 5;

/// Every connection to an in-memory SQLite URL opens its own empty database.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Database connection for the bot.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given URL, creating it if needed.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = if is_in_memory(database_url) {
            // Keep the one connection alive for the lifetime of the pool
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                wallet_count INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_requests_chat
            ON analysis_requests(chat_id, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record an accepted `/analyze` request now.
    pub async fn record_request(&self, chat_id: i64, wallet_count: usize) -> Result<(), DbError> {
        self.record_request_at(chat_id, wallet_count, chrono::Utc::now().timestamp())
            .await
    }

    /// Record a request with an explicit unix timestamp.
    pub async fn record_request_at(
        &self,
        chat_id: i64,
        wallet_count: usize,
        created_at: i64,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO analysis_requests (chat_id, wallet_count, created_at) VALUES (?, ?, ?)",
        )
        .bind(chat_id)
        .bind(wallet_count as i64)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Unix time of the chat's latest request.
    pub async fn last_request_at(&self, chat_id: i64) -> Result<Option<i64>, DbError> {
        let last = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(created_at) FROM analysis_requests WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(last)
    }

    pub async fn request_count(&self, chat_id: i64) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM analysis_requests WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Delete requests older than `days`. Returns the number of rows removed.
    pub async fn cleanup_old_requests(&self, days: i64) -> Result<u64, DbError> {
        let cutoff = chrono::Utc::now().timestamp() - days * SECS_PER_DAY;
        let result = sqlx::query("DELETE FROM analysis_requests WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
