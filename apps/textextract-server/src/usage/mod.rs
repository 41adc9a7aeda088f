//! Usage tracking and entitlement gate
//!
//! Free users may process a fixed number of images per local calendar day;
//! premium users are unlimited. The storage backend is chosen once at startup.

mod sqlite;
mod store;

pub use sqlite::SqliteUsageStore;
pub use store::{MemoryUsageStore, UsageStore};

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;

/// Images a free user may process per day
pub const FREE_DAILY_LIMIT: u32 = 3;

/// `dailyLimit` sentinel for premium users
pub const UNLIMITED: i32 = -1;

/// User id applied when a request does not identify its user
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Entitlement decision plus the usage record it was based on
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatus {
    pub user_id: String,
    pub date: NaiveDate,
    pub image_count: u32,
    pub daily_limit: i32,
    pub is_premium: bool,
    pub can_process: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Usage gate over an injectable store
#[derive(Clone)]
pub struct UsageService {
    store: Arc<dyn UsageStore>,
    free_daily_limit: u32,
}

impl UsageService {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            free_daily_limit: FREE_DAILY_LIMIT,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryUsageStore::new()))
    }

    /// Pick the backend from `DATABASE_URL`.
    ///
    /// A `sqlite:` URL selects the relational store (connection errors are
    /// returned); anything else, or no URL, selects the in-memory store.
    pub async fn from_database_url(database_url: Option<&str>) -> Result<Self, UsageError> {
        match database_url {
            Some(url) if url.starts_with("sqlite:") => {
                let store = SqliteUsageStore::connect(url).await?;
                tracing::info!("Usage tracking backed by SQLite");
                Ok(Self::new(Arc::new(store)))
            }
            Some(url) => {
                let scheme = url.split(':').next().unwrap_or_default();
                tracing::warn!(
                    "Unsupported DATABASE_URL scheme '{}', usage tracking will be kept in memory",
                    scheme
                );
                Ok(Self::in_memory())
            }
            None => {
                tracing::info!("No DATABASE_URL set, usage tracking will be kept in memory");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Whether `user_id` may process another image today
    pub async fn check(&self, user_id: &str) -> Result<UsageStatus, UsageError> {
        self.check_on(user_id, today()).await
    }

    pub async fn check_on(&self, user_id: &str, date: NaiveDate) -> Result<UsageStatus, UsageError> {
        let image_count = self.store.count_for_day(user_id, date).await?;

        if self.store.is_premium(user_id).await? {
            return Ok(UsageStatus {
                user_id: user_id.to_string(),
                date,
                image_count,
                daily_limit: UNLIMITED,
                is_premium: true,
                can_process: true,
                reason: None,
            });
        }

        let can_process = image_count < self.free_daily_limit;
        let reason = (!can_process).then(|| {
            format!(
                "You've reached your daily limit of {} free images. Upgrade to Premium for unlimited text extraction.",
                self.free_daily_limit
            )
        });

        Ok(UsageStatus {
            user_id: user_id.to_string(),
            date,
            image_count,
            daily_limit: self.free_daily_limit as i32,
            is_premium: false,
            can_process,
            reason,
        })
    }

    /// Record one processed image for today; returns the new count
    pub async fn record_processed(&self, user_id: &str) -> Result<u32, UsageError> {
        self.store.record(user_id, today()).await
    }

    pub async fn record_processed_on(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError> {
        self.store.record(user_id, date).await
    }

    /// Set by the billing integration when a subscription starts or ends
    pub async fn set_premium(&self, user_id: &str, premium: bool) -> Result<(), UsageError> {
        tracing::info!("Setting premium={} for user {}", premium, user_id);
        self.store.set_premium(user_id, premium).await
    }
}

/// Current local calendar day
fn today() -> NaiveDate {
    Local::now().date_naive()
}
