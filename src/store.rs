use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::{FeedId, HistoryEntry};

/// A persisted history entry with its bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub feed: FeedId,
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub created_at_ns: i64,
    pub updated_at_ns: i64,
}

/// Keyed storage for classified draws. The key is (feed, period).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn exists(&self, feed: &FeedId, period: i64) -> Result<bool>;

    async fn get(&self, feed: &FeedId, period: i64) -> Result<Option<HistoryEntry>>;

    /// Insert or overwrite every mutable field; `created_at` survives overwrites.
    async fn upsert(&self, feed: &FeedId, entry: &HistoryEntry) -> Result<()>;

    /// Newest period first.
    async fn recent(&self, feed: &FeedId, limit: usize) -> Result<Vec<HistoryRecord>>;
}

pub fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
