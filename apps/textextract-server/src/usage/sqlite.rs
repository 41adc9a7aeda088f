//! SQLite usage store

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use super::store::UsageStore;
use super::UsageError;

const SCHEMA_SQL: &str = r#"
-- One row per processed image
CREATE TABLE IF NOT EXISTS usage_records (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    usage_date TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_usage_user_date ON usage_records(user_id, usage_date);

-- Premium entitlement, written by the billing integration
CREATE TABLE IF NOT EXISTS user_entitlements (
    user_id TEXT PRIMARY KEY,
    is_premium INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Usage store backed by a SQLite database
#[derive(Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
}

impl SqliteUsageStore {
    /// Open (or create) the database at `database_url` and ensure the schema
    pub async fn connect(database_url: &str) -> Result<Self, UsageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Wrap an existing pool, creating tables if needed
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, UsageError> {
        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn count_for_day(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM usage_records
            WHERE user_id = ? AND usage_date = ?
            "#,
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u32)
    }

    async fn record(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (id, user_id, usage_date, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(date.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.count_for_day(user_id, date).await
    }

    async fn is_premium(&self, user_id: &str) -> Result<bool, UsageError> {
        let premium: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT is_premium
            FROM user_entitlements
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(premium.unwrap_or(0) != 0)
    }

    async fn set_premium(&self, user_id: &str, premium: bool) -> Result<(), UsageError> {
        sqlx::query(
            r#"
            INSERT INTO user_entitlements (user_id, is_premium, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                is_premium = excluded.is_premium,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(i64::from(premium))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
