use async_trait::async_trait;
use sqlx::SqlitePool;

use super::models::HistoryRow;
use crate::error::Result;
use crate::store::{now_ns, HistoryRecord, HistoryStore};
use crate::types::{FeedId, HistoryEntry};

const SELECT_COLUMNS: &str = "feed, period, numbers, prediction, outcome, total_number, kill, \
                              betting_result, open_result, created_at, updated_at";

/// SQLite-backed history, one table for every feed.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file and apply migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{path}?mode=rwc")).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn exists(&self, feed: &FeedId, period: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM draw_history WHERE feed = ? AND period = ?")
                .bind(feed.as_str())
                .bind(period)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn get(&self, feed: &FeedId, period: i64) -> Result<Option<HistoryEntry>> {
        let row: Option<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM draw_history WHERE feed = ? AND period = ?"
        ))
        .bind(feed.as_str())
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.entry()))
    }

    async fn upsert(&self, feed: &FeedId, e: &HistoryEntry) -> Result<()> {
        let now = now_ns();
        sqlx::query(
            r#"
            INSERT INTO draw_history (
                feed, period, numbers, prediction, outcome, total_number,
                kill, betting_result, open_result, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (feed, period) DO UPDATE SET
                numbers        = excluded.numbers,
                prediction     = excluded.prediction,
                outcome        = excluded.outcome,
                total_number   = excluded.total_number,
                kill           = excluded.kill,
                betting_result = excluded.betting_result,
                open_result    = excluded.open_result,
                updated_at     = excluded.updated_at
            "#,
        )
        .bind(feed.as_str())
        .bind(e.period)
        .bind(&e.numbers)
        .bind(&e.prediction)
        .bind(e.outcome.as_flag())
        .bind(e.total_number)
        .bind(i64::from(e.kill))
        .bind(e.betting_result.key())
        .bind(e.open_result.map(|p| p.label()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, feed: &FeedId, limit: usize) -> Result<Vec<HistoryRecord>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM draw_history WHERE feed = ? ORDER BY period DESC LIMIT ?"
        ))
        .bind(feed.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HistoryRow::into_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::types::{BettingResult, Outcome, Parity};

    async fn store() -> SqliteHistoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteHistoryStore::new(pool)
    }

    fn entry(period: i64, numbers: &str) -> HistoryEntry {
        HistoryEntry {
            period,
            numbers: numbers.to_string(),
            total_number: Some(12),
            prediction: "单".to_string(),
            outcome: Outcome::Miss,
            kill: false,
            betting_result: BettingResult::MissProfit,
            open_result: Some(Parity::Even),
        }
    }

    #[tokio::test]
    async fn upsert_then_get() {
        let s = store().await;
        let sf1 = FeedId::new("sf1");
        assert!(!s.exists(&sf1, 100).await.unwrap());

        s.upsert(&sf1, &entry(100, "1+2+9=12")).await.unwrap();
        assert!(s.exists(&sf1, 100).await.unwrap());
        assert_eq!(s.get(&sf1, 100).await.unwrap(), Some(entry(100, "1+2+9=12")));
        // same period on another feed is a different key
        assert!(!s.exists(&FeedId::new("sf3"), 100).await.unwrap());
    }

    #[tokio::test]
    async fn upsert_overwrites_and_keeps_created_at() {
        let s = store().await;
        let sf1 = FeedId::new("sf1");
        s.upsert(&sf1, &entry(100, "---")).await.unwrap();
        let before = s.recent(&sf1, 1).await.unwrap().remove(0);

        s.upsert(&sf1, &entry(100, "1+2+9=12")).await.unwrap();
        let after = s.recent(&sf1, 1).await.unwrap().remove(0);

        assert_eq!(after.entry.numbers, "1+2+9=12");
        assert_eq!(after.created_at_ns, before.created_at_ns);
        assert!(after.updated_at_ns >= before.updated_at_ns);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let s = store().await;
        let sf1 = FeedId::new("sf1");
        for p in [101, 103, 102] {
            s.upsert(&sf1, &entry(p, "1+2+9=12")).await.unwrap();
        }
        let periods: Vec<i64> =
            s.recent(&sf1, 2).await.unwrap().iter().map(|r| r.entry.period).collect();
        assert_eq!(periods, vec![103, 102]);
    }
}
