//! Usage storage backends

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;

use super::UsageError;

/// Storage seam for per-user daily counts and premium flags
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Images processed by `user_id` on `date`
    async fn count_for_day(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError>;

    /// Record one processed image and return the new count for the day
    async fn record(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError>;

    async fn is_premium(&self, user_id: &str) -> Result<bool, UsageError>;

    async fn set_premium(&self, user_id: &str, premium: bool) -> Result<(), UsageError>;
}

/// Process-local store; everything is lost on restart
#[derive(Default)]
pub struct MemoryUsageStore {
    counts: RwLock<HashMap<(String, NaiveDate), u32>>,
    premium: RwLock<HashSet<String>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn count_for_day(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError> {
        Ok(self
            .counts
            .read()
            .get(&(user_id.to_string(), date))
            .copied()
            .unwrap_or(0))
    }

    /// Days before `date` can no longer be queried by the gate and are dropped
    async fn record(&self, user_id: &str, date: NaiveDate) -> Result<u32, UsageError> {
        let mut counts = self.counts.write();
        counts.retain(|(_, day), _| *day >= date);
        let count = counts.entry((user_id.to_string(), date)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn is_premium(&self, user_id: &str) -> Result<bool, UsageError> {
        Ok(self.premium.read().contains(user_id))
    }

    async fn set_premium(&self, user_id: &str, premium: bool) -> Result<(), UsageError> {
        let mut set = self.premium.write();
        if premium {
            set.insert(user_id.to_string());
        } else {
            set.remove(user_id);
        }
        Ok(())
    }
}
