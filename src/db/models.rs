//! Row type for the `draw_history` table (migrations/0001_draw_history.sql).
use crate::store::HistoryRecord;
use crate::types::{BettingResult, FeedId, HistoryEntry, Outcome, Parity};

#[derive(Debug, sqlx::FromRow)]
pub struct HistoryRow {
    pub feed: String,
    pub period: i64,
    pub numbers: String,
    pub prediction: String,
    pub outcome: String,
    pub total_number: Option<i64>,
    pub kill: i64,
    pub betting_result: String,
    pub open_result: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HistoryRow {
    pub fn entry(&self) -> HistoryEntry {
        HistoryEntry {
            period: self.period,
            numbers: self.numbers.clone(),
            total_number: self.total_number,
            prediction: self.prediction.clone(),
            outcome: Outcome::from_flag(&self.outcome),
            kill: self.kill != 0,
            betting_result: BettingResult::from_key(&self.betting_result),
            open_result: self.open_result.as_deref().and_then(Parity::from_label),
        }
    }

    pub fn into_record(self) -> HistoryRecord {
        HistoryRecord {
            feed: FeedId::new(self.feed.clone()),
            entry: self.entry(),
            created_at_ns: self.created_at,
            updated_at_ns: self.updated_at,
        }
    }
}
