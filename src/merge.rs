use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::analysis::enrich;
use crate::error::Result;
use crate::store::HistoryStore;
use crate::types::{ExtractedRow, FeedId};

/// Per-feed tally of one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Inserted, or pending rows that were rewritten.
    pub saved: usize,
    /// Already final, or pending and unchanged.
    pub skipped: usize,
    /// Period not an integer.
    pub dropped: usize,
    /// Store errors; logged and not retried.
    pub failed: usize,
}

enum Decision {
    Saved,
    Skipped,
}

/// Merges extracted rows into a [`HistoryStore`] without ever rewriting a
/// finalized record.
pub struct HistoryUpserter {
    store: Arc<dyn HistoryStore>,
}

impl HistoryUpserter {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub async fn merge(&self, feed: &FeedId, rows: &[ExtractedRow]) -> MergeReport {
        let mut report = MergeReport::default();
        for row in rows {
            let Some(period) = row.period else {
                warn!(feed = %feed, period = %row.period_text, "dropping row with malformed period");
                report.dropped += 1;
                continue;
            };
            if row.outcome_conflict {
                warn!(
                    feed = %feed,
                    period,
                    prediction = %row.prediction_raw,
                    outcome = %row.outcome,
                    "outcome signals disagree, keeping the text reading"
                );
            }
            match self.merge_row(feed, period, row).await {
                Ok(Decision::Saved) => report.saved += 1,
                Ok(Decision::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(feed = %feed, period, "history upsert failed: {e}");
                    report.failed += 1;
                }
            }
        }
        debug!(
            feed = %feed,
            saved = report.saved,
            skipped = report.skipped,
            dropped = report.dropped,
            failed = report.failed,
            "merge complete"
        );
        report
    }

    async fn merge_row(&self, feed: &FeedId, period: i64, row: &ExtractedRow) -> Result<Decision> {
        let fresh = enrich(period, row);
        match self.store.get(feed, period).await? {
            None => {
                self.store.upsert(feed, &fresh).await?;
                Ok(Decision::Saved)
            }
            Some(existing) if !existing.is_pending() => Ok(Decision::Skipped),
            Some(existing) if existing == fresh => Ok(Decision::Skipped),
            Some(_) => {
                self.store.upsert(feed, &fresh).await?;
                Ok(Decision::Saved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::state::MemoryHistoryStore;
    use crate::store::HistoryRecord;
    use crate::types::{BettingResult, HistoryEntry, Outcome};

    fn row(period: Option<i64>, numbers: &str, outcome: Outcome) -> ExtractedRow {
        ExtractedRow {
            period_text: period.map(|p| p.to_string()).unwrap_or_else(|| "abc".into()),
            period,
            numbers: numbers.into(),
            prediction_raw: "单(√)".into(),
            prediction: "单".into(),
            outcome,
            outcome_conflict: false,
        }
    }

    fn upserter() -> (HistoryUpserter, Arc<MemoryHistoryStore>) {
        let store = Arc::new(MemoryHistoryStore::new());
        (HistoryUpserter::new(store.clone()), store)
    }

    #[tokio::test]
    async fn merge_is_idempotent() {
        let (up, store) = upserter();
        let sf1 = FeedId::new("sf1");
        let rows = vec![row(Some(100), "1+2+9=12", Outcome::Hit)];

        assert_eq!(up.merge(&sf1, &rows).await.saved, 1);
        let first = store.get(&sf1, 100).await.unwrap();

        let second = up.merge(&sf1, &rows).await;
        assert_eq!(second, MergeReport { saved: 0, skipped: 1, dropped: 0, failed: 0 });
        assert_eq!(store.get(&sf1, 100).await.unwrap(), first);
    }

    #[tokio::test]
    async fn finalized_records_are_never_rewritten() {
        let (up, store) = upserter();
        let sf1 = FeedId::new("sf1");
        up.merge(&sf1, &[row(Some(100), "1+2+9=12", Outcome::Hit)]).await;

        let report = up.merge(&sf1, &[row(Some(100), "---", Outcome::Pending)]).await;
        assert_eq!(report.saved, 0);
        let kept = store.get(&sf1, 100).await.unwrap().unwrap();
        assert_eq!(kept.numbers, "1+2+9=12");
        assert_eq!(kept.betting_result, BettingResult::HitProfit);
    }

    #[tokio::test]
    async fn pending_records_are_completed() {
        let (up, store) = upserter();
        let sf1 = FeedId::new("sf1");
        assert_eq!(up.merge(&sf1, &[row(Some(100), "-", Outcome::Pending)]).await.saved, 1);
        // re-observing the same pending row changes nothing
        assert_eq!(up.merge(&sf1, &[row(Some(100), "-", Outcome::Pending)]).await.saved, 0);

        let report = up.merge(&sf1, &[row(Some(100), "6+7+1=14", Outcome::Hit)]).await;
        assert_eq!(report.saved, 1);
        let done = store.get(&sf1, 100).await.unwrap().unwrap();
        assert_eq!(done.total_number, Some(14));
        assert!(done.kill);
        assert_eq!(done.betting_result, BettingResult::HitKilled);
    }

    #[tokio::test]
    async fn malformed_periods_are_dropped() {
        let (up, store) = upserter();
        let report = up.merge(&FeedId::new("sf1"), &[row(None, "1+2+9=12", Outcome::Hit)]).await;
        assert_eq!(report.dropped, 1);
        assert_eq!(store.len(), 0);
    }

    /// Fails writes for one period only.
    struct FlakyStore {
        inner: MemoryHistoryStore,
        bad_period: i64,
    }

    #[async_trait]
    impl HistoryStore for FlakyStore {
        async fn exists(&self, feed: &FeedId, period: i64) -> Result<bool> {
            self.inner.exists(feed, period).await
        }
        async fn get(&self, feed: &FeedId, period: i64) -> Result<Option<HistoryEntry>> {
            self.inner.get(feed, period).await
        }
        async fn upsert(&self, feed: &FeedId, entry: &HistoryEntry) -> Result<()> {
            if entry.period == self.bad_period {
                return Err(AppError::Io(std::io::Error::other("disk full")));
            }
            self.inner.upsert(feed, entry).await
        }
        async fn recent(&self, feed: &FeedId, limit: usize) -> Result<Vec<HistoryRecord>> {
            self.inner.recent(feed, limit).await
        }
    }

    #[tokio::test]
    async fn store_failure_does_not_abort_remaining_rows() {
        let store = Arc::new(FlakyStore { inner: MemoryHistoryStore::new(), bad_period: 101 });
        let up = HistoryUpserter::new(store.clone());
        let rows = vec![
            row(Some(100), "1+2+9=12", Outcome::Hit),
            row(Some(101), "1+2+9=12", Outcome::Hit),
            row(Some(102), "1+2+9=12", Outcome::Hit),
        ];
        let report = up.merge(&FeedId::new("sf1"), &rows).await;
        assert_eq!(report, MergeReport { saved: 2, skipped: 0, dropped: 0, failed: 1 });
    }
}
