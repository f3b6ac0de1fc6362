use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::delay::CycleOutcome;
use crate::archive::Archive;
use crate::config::FeedConfig;
use crate::extract::HtmlExtractor;
use crate::fetcher::Fetcher;
use crate::merge::HistoryUpserter;
use crate::state::SnapshotCache;
use crate::types::{Countdown, CycleEvent, FeedId, FeedStage};

/// Runs one fetch → extract → classify → merge pass across every feed.
pub struct Collector {
    feeds: Vec<FeedConfig>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<HtmlExtractor>,
    upserter: Arc<HistoryUpserter>,
    snapshots: Arc<SnapshotCache>,
    archive: Option<Archive>,
    events: broadcast::Sender<CycleEvent>,
}

struct FeedCollected {
    countdown: Option<Countdown>,
    saved: usize,
}

impl Collector {
    pub fn new(
        feeds: Vec<FeedConfig>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<HtmlExtractor>,
        upserter: Arc<HistoryUpserter>,
        snapshots: Arc<SnapshotCache>,
        events: broadcast::Sender<CycleEvent>,
    ) -> Self {
        Self { feeds, fetcher, extractor, upserter, snapshots, archive: None, events }
    }

    pub fn with_archive(mut self, archive: Archive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    pub async fn run_cycle(&self, cycle: u64) -> CycleOutcome {
        let started = Instant::now();
        if let Some(archive) = &self.archive {
            archive.clean().await;
        }

        // join_all keeps configuration order, which decides the countdown source
        let results = join_all(self.feeds.iter().map(|feed| self.collect_feed(cycle, feed))).await;

        let mut saved = BTreeMap::new();
        let mut countdown = None;
        let mut succeeded = 0usize;
        for (feed, result) in self.feeds.iter().zip(&results) {
            if let Some(r) = result {
                succeeded += 1;
                saved.insert(feed.id.clone(), r.saved);
                countdown = countdown.or(r.countdown);
            }
        }

        let success = succeeded > 0;
        let total_saved: usize = saved.values().sum();
        info!(
            event = "CYCLE_END",
            cycle,
            feeds_ok = succeeded,
            feeds_total = self.feeds.len(),
            saved = total_saved,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle {cycle} finished: {succeeded}/{} feeds, {total_saved} entries saved",
            self.feeds.len(),
        );
        let _ = self.events.send(CycleEvent::CycleFinished {
            cycle,
            success,
            saved,
            elapsed: started.elapsed(),
        });

        if success {
            CycleOutcome::Completed { countdown }
        } else {
            CycleOutcome::Failed
        }
    }

    async fn collect_feed(&self, cycle: u64, feed: &FeedConfig) -> Option<FeedCollected> {
        let body = match self.fetcher.fetch(feed).await {
            Ok(body) => body,
            Err(e) => {
                self.feed_failed(cycle, &feed.id, FeedStage::Fetch, e.to_string());
                return None;
            }
        };

        if let Some(archive) = &self.archive {
            archive.save(&feed.id, &body).await;
        }

        let extraction = match self.extractor.extract(&body) {
            Ok(extraction) => extraction,
            Err(e) => {
                self.feed_failed(cycle, &feed.id, FeedStage::Extract, e.to_string());
                return None;
            }
        };

        let countdown = extraction.snapshot.countdown;
        let period = extraction.snapshot.period.clone();
        self.snapshots.put(&feed.id, extraction.snapshot);

        let report = self.upserter.merge(&feed.id, &extraction.rows).await;
        info!(
            feed = %feed.id,
            period = period.as_deref().unwrap_or("-"),
            rows = extraction.rows.len(),
            saved = report.saved,
            skipped = report.skipped,
            "feed collected"
        );
        let _ = self.events.send(CycleEvent::FeedCollected {
            cycle,
            feed: feed.id.clone(),
            period,
            rows: extraction.rows.len(),
            saved: report.saved,
        });

        Some(FeedCollected { countdown, saved: report.saved })
    }

    fn feed_failed(&self, cycle: u64, feed: &FeedId, stage: FeedStage, reason: String) {
        warn!(feed = %feed, stage = %stage, "feed failed: {reason}");
        let _ = self.events.send(CycleEvent::FeedFailed { cycle, feed: feed.clone(), stage, reason });
    }
}
