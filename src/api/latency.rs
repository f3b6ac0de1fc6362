//! Fetch latency histograms, overall and per feed.
//! The HTTP fetcher records successful attempts, the API reads.

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use hdrhistogram::Histogram;
use serde::Serialize;

use crate::types::FeedId;

/// Values stored in microseconds.
pub struct LatencyStats {
    overall: Mutex<Histogram<u64>>,
    per_feed: DashMap<FeedId, Histogram<u64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

/// Tracks 1us to 100s, 3 significant figures.
fn histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, 100_000_000, 3).expect("valid histogram bounds")
}

fn percentiles(h: &Histogram<u64>) -> Percentiles {
    if h.len() == 0 {
        return Percentiles::default();
    }
    Percentiles {
        samples: h.len(),
        p50_us: Some(h.value_at_quantile(0.5)),
        p95_us: Some(h.value_at_quantile(0.95)),
        p99_us: Some(h.value_at_quantile(0.99)),
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            overall: Mutex::new(histogram()),
            per_feed: DashMap::new(),
        }
    }

    pub fn record_feed(&self, feed: &FeedId, d: Duration) {
        let us = (d.as_micros().min(u128::from(u64::MAX)) as u64).max(1);
        if let Ok(mut h) = self.overall.lock() {
            let _ = h.record(us);
        }
        let _ = self
            .per_feed
            .entry(feed.clone())
            .or_insert_with(histogram)
            .record(us);
    }

    pub fn overall(&self) -> Percentiles {
        self.overall.lock().map(|h| percentiles(&h)).unwrap_or_default()
    }

    /// Sorted by feed id.
    pub fn by_feed(&self) -> Vec<(FeedId, Percentiles)> {
        let mut out: Vec<(FeedId, Percentiles)> = self
            .per_feed
            .iter()
            .map(|e| (e.key().clone(), percentiles(e.value())))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert_eq!(stats.overall(), Percentiles::default());
        assert!(stats.by_feed().is_empty());
    }

    #[test]
    fn records_overall_and_per_feed() {
        let stats = LatencyStats::new();
        let sf1 = FeedId::new("sf1");
        let sf3 = FeedId::new("sf3");
        stats.record_feed(&sf3, Duration::from_millis(40));
        stats.record_feed(&sf1, Duration::from_millis(10));
        stats.record_feed(&sf1, Duration::from_millis(20));

        assert_eq!(stats.overall().samples, 3);
        let feeds = stats.by_feed();
        assert_eq!(feeds[0].0, sf1);
        assert_eq!(feeds[0].1.samples, 2);
        assert_eq!(feeds[1].1.samples, 1);
        assert!(stats.overall().p99_us.unwrap() >= 39_000);
    }
}
