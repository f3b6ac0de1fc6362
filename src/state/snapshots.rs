use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::store::now_ns;
use crate::types::{DrawSnapshot, FeedId};

#[derive(Debug, Clone, Serialize)]
pub struct CachedSnapshot {
    pub snapshot: DrawSnapshot,
    pub fetched_at_ns: i64,
}

/// Latest extracted snapshot per feed. Written by the collector, read by the API.
#[derive(Default)]
pub struct SnapshotCache {
    latest: DashMap<FeedId, CachedSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, feed: &FeedId, snapshot: DrawSnapshot) {
        self.latest.insert(
            feed.clone(),
            CachedSnapshot { snapshot, fetched_at_ns: now_ns() },
        );
    }

    pub fn get(&self, feed: &FeedId) -> Option<CachedSnapshot> {
        self.latest.get(feed).map(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_snapshot_replaces_previous() {
        let cache = SnapshotCache::new();
        let sf1 = FeedId::new("sf1");
        assert!(cache.get(&sf1).is_none());

        cache.put(&sf1, DrawSnapshot { period: Some("1".into()), ..Default::default() });
        cache.put(&sf1, DrawSnapshot { period: Some("2".into()), ..Default::default() });
        assert_eq!(cache.get(&sf1).unwrap().snapshot.period.as_deref(), Some("2"));
    }
}
