use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::health::HealthState;
use super::latency::{LatencyStats, Percentiles};
use crate::analysis::win_rates_for_ranges;
use crate::config::FeedConfig;
use crate::error::AppError;
use crate::scheduler::{AdaptiveScheduler, SchedulerState, SchedulerStatus, TriggerResult};
use crate::state::snapshots::{CachedSnapshot, SnapshotCache};
use crate::store::{HistoryRecord, HistoryStore};
use crate::types::{BettingResult, FeedId};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 1_000;
const DEFAULT_RANGES: &[usize] = &[10, 20, 50];

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: AdaptiveScheduler,
    pub history: Arc<dyn HistoryStore>,
    pub snapshots: Arc<SnapshotCache>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/feeds", get(get_feeds))
        .route("/feeds/:feed/history", get(get_feed_history))
        .route("/feeds/:feed/stats", get(get_feed_stats))
        .route("/scheduler", get(get_scheduler))
        .route("/scheduler/trigger", post(post_trigger))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    /// Comma-separated window sizes, e.g. `10,20,50`.
    pub ranges: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub state: SchedulerState,
    pub cycles_total: u64,
    pub last_cycle_at_ns: Option<u64>,
    pub last_cycle_ok: Option<bool>,
    pub consecutive_failures: u64,
}

#[derive(Serialize)]
pub struct FeedResponse {
    pub id: FeedId,
    pub url: String,
    pub latest: Option<CachedSnapshot>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub feed: FeedId,
    pub period: i64,
    pub numbers: String,
    pub total_number: Option<i64>,
    pub prediction: String,
    pub outcome: &'static str,
    pub kill: bool,
    pub betting_result: BettingResult,
    pub betting_label: &'static str,
    pub open_result: Option<&'static str>,
    pub created_at_ns: i64,
    pub updated_at_ns: i64,
}

impl From<HistoryRecord> for HistoryResponse {
    fn from(r: HistoryRecord) -> Self {
        let e = r.entry;
        Self {
            feed: r.feed,
            period: e.period,
            numbers: e.numbers,
            total_number: e.total_number,
            prediction: e.prediction,
            outcome: e.outcome.as_flag(),
            kill: e.kill,
            betting_result: e.betting_result,
            betting_label: e.betting_result.label(),
            open_result: e.open_result.map(|p| p.label()),
            created_at_ns: r.created_at_ns,
            updated_at_ns: r.updated_at_ns,
        }
    }
}

#[derive(Serialize)]
pub struct WinRate {
    pub games: usize,
    /// Entries actually available, at most `games`.
    pub sample: usize,
    pub win_rate: f64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub feed: FeedId,
    pub win_rates: Vec<WinRate>,
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub result: TriggerResult,
}

#[derive(Serialize)]
pub struct FeedLatency {
    pub feed: FeedId,
    #[serde(flatten)]
    pub percentiles: Percentiles,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub overall: Percentiles,
    pub feeds: Vec<FeedLatency>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn find_feed<'a>(state: &'a ApiState, feed: &str) -> Result<&'a FeedConfig, AppError> {
    state
        .scheduler
        .collector()
        .feeds()
        .iter()
        .find(|f| f.id.as_str() == feed)
        .ok_or_else(|| AppError::UnknownFeed(feed.to_string()))
}

/// `"10, 20,x,0"` → `[10, 20]`; falls back to the defaults when nothing usable remains.
fn parse_ranges(raw: Option<&str>) -> Vec<usize> {
    let parsed: Vec<usize> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .collect();
    if parsed.is_empty() {
        DEFAULT_RANGES.to_vec()
    } else {
        parsed
    }
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    let ran = h.cycles_total() > 0;
    Json(HealthResponse {
        state: state.scheduler.status().state,
        cycles_total: h.cycles_total(),
        last_cycle_at_ns: ran.then(|| h.last_cycle_at_ns()),
        last_cycle_ok: ran.then(|| h.last_cycle_ok()),
        consecutive_failures: h.consecutive_failures(),
    })
}

async fn get_feeds(State(state): State<ApiState>) -> Json<Vec<FeedResponse>> {
    let feeds = state
        .scheduler
        .collector()
        .feeds()
        .iter()
        .map(|f| FeedResponse {
            id: f.id.clone(),
            url: f.url.clone(),
            latest: state.snapshots.get(&f.id),
        })
        .collect();
    Json(feeds)
}

async fn get_feed_history(
    State(state): State<ApiState>,
    Path(feed): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryResponse>>, AppError> {
    let feed = find_feed(&state, &feed)?.id.clone();
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    let records = state.history.recent(&feed, limit).await?;
    Ok(Json(records.into_iter().map(HistoryResponse::from).collect()))
}

async fn get_feed_stats(
    State(state): State<ApiState>,
    Path(feed): Path<String>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let feed = find_feed(&state, &feed)?.id.clone();
    let ranges = parse_ranges(params.ranges.as_deref());
    let widest = ranges.iter().copied().max().unwrap_or(0).min(MAX_HISTORY_LIMIT);

    let results: Vec<BettingResult> = state
        .history
        .recent(&feed, widest)
        .await?
        .into_iter()
        .map(|r| r.entry.betting_result)
        .collect();

    let win_rates = win_rates_for_ranges(&results, &ranges)
        .into_iter()
        .map(|(games, win_rate)| WinRate { games, sample: games.min(results.len()), win_rate })
        .collect();

    Ok(Json(StatsResponse { feed, win_rates }))
}

async fn get_scheduler(State(state): State<ApiState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

async fn post_trigger(State(state): State<ApiState>) -> Json<TriggerResponse> {
    Json(TriggerResponse { result: state.scheduler.trigger() })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        overall: state.latency.overall(),
        feeds: state
            .latency
            .by_feed()
            .into_iter()
            .map(|(feed, percentiles)| FeedLatency { feed, percentiles })
            .collect(),
    })
}
