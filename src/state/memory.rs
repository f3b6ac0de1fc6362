use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::store::{now_ns, HistoryRecord, HistoryStore};
use crate::types::{FeedId, HistoryEntry};

/// DashMap-backed history for tests and database-less runs.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: DashMap<(FeedId, i64), HistoryRecord>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn exists(&self, feed: &FeedId, period: i64) -> Result<bool> {
        Ok(self.records.contains_key(&(feed.clone(), period)))
    }

    async fn get(&self, feed: &FeedId, period: i64) -> Result<Option<HistoryEntry>> {
        Ok(self.records.get(&(feed.clone(), period)).map(|r| r.entry.clone()))
    }

    async fn upsert(&self, feed: &FeedId, entry: &HistoryEntry) -> Result<()> {
        let now = now_ns();
        self.records
            .entry((feed.clone(), entry.period))
            .and_modify(|r| {
                r.entry = entry.clone();
                r.updated_at_ns = now;
            })
            .or_insert_with(|| HistoryRecord {
                feed: feed.clone(),
                entry: entry.clone(),
                created_at_ns: now,
                updated_at_ns: now,
            });
        Ok(())
    }

    async fn recent(&self, feed: &FeedId, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut out: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| &r.key().0 == feed)
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| b.entry.period.cmp(&a.entry.period));
        out.truncate(limit);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BettingResult, Outcome};

    fn entry(period: i64, numbers: &str) -> HistoryEntry {
        HistoryEntry {
            period,
            numbers: numbers.to_string(),
            total_number: None,
            prediction: String::new(),
            outcome: Outcome::Pending,
            kill: false,
            betting_result: BettingResult::Unknown,
            open_result: None,
        }
    }

    #[tokio::test]
    async fn keyed_by_feed_and_period() {
        let store = MemoryHistoryStore::new();
        let (sf1, sf3) = (FeedId::new("sf1"), FeedId::new("sf3"));
        store.upsert(&sf1, &entry(7, "-")).await.unwrap();
        store.upsert(&sf3, &entry(7, "-")).await.unwrap();
        store.upsert(&sf1, &entry(7, "1+1+1=3")).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&sf1, 7).await.unwrap().unwrap().numbers, "1+1+1=3");
        assert_eq!(store.get(&sf3, 7).await.unwrap().unwrap().numbers, "-");
        assert!(!store.exists(&sf1, 8).await.unwrap());
    }

    #[tokio::test]
    async fn recent_sorts_and_limits() {
        let store = MemoryHistoryStore::new();
        let sf1 = FeedId::new("sf1");
        for p in [3, 9, 5] {
            store.upsert(&sf1, &entry(p, "-")).await.unwrap();
        }
        let got: Vec<i64> = store.recent(&sf1, 2).await.unwrap().iter().map(|r| r.entry.period).collect();
        assert_eq!(got, vec![9, 5]);
    }
}
