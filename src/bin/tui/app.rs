use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Countdown {
    pub minutes: u32,
    pub seconds: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotOpened {
    pub big_odd: Option<u32>,
    pub small_odd: Option<u32>,
    pub small_even: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Snapshot {
    pub period: Option<String>,
    pub countdown: Option<Countdown>,
    pub numbers: Option<[i64; 3]>,
    pub sum: Option<i64>,
    pub big_small: Option<String>,
    pub odd_even: Option<String>,
    #[serde(default)]
    pub not_opened: NotOpened,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cached {
    pub snapshot: Snapshot,
    pub fetched_at_ns: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    pub id: String,
    pub latest: Option<Cached>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub period: i64,
    pub numbers: String,
    pub prediction: String,
    pub outcome: String,
    pub kill: bool,
    pub betting_result: String,
    pub betting_label: String,
    pub open_result: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchedulerResponse {
    pub state: String,
    pub cycle_count: u64,
    pub next_run_at: Option<DateTime<FixedOffset>>,
    pub last_delay_secs: Option<u64>,
    pub last_delay_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HealthResponse {
    pub last_cycle_ok: Option<bool>,
    pub consecutive_failures: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WinRate {
    pub games: usize,
    pub sample: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatsResponse {
    pub win_rates: Vec<WinRate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerResponse {
    pub result: String,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub feeds: Vec<FeedResponse>,
    pub scheduler: SchedulerResponse,
    pub health: HealthResponse,
    pub history: Vec<HistoryResponse>,
    pub stats: StatsResponse,
    pub selected: usize,
    /// Result of the last manual trigger, shown in the footer.
    pub notice: Option<String>,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            feeds: Vec::new(),
            scheduler: SchedulerResponse::default(),
            health: HealthResponse::default(),
            history: Vec::new(),
            stats: StatsResponse::default(),
            selected: 0,
            notice: None,
            base_url,
        }
    }

    pub fn selected_feed(&self) -> Option<&str> {
        self.feeds.get(self.selected).map(|f| f.id.as_str())
    }

    pub fn select_next(&mut self) {
        let max = self.feeds.len().saturating_sub(1);
        self.selected = (self.selected + 1).min(max);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let feeds_url = format!("{}/feeds", self.base_url);
        let scheduler_url = format!("{}/scheduler", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (feeds_res, scheduler_res, health_res) = tokio::join!(
            client.get(&feeds_url).send(),
            client.get(&scheduler_url).send(),
            client.get(&health_url).send(),
        );

        let feeds_resp = match feeds_res {
            Ok(r) => r,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        match feeds_resp.json::<Vec<FeedResponse>>().await {
            Ok(feeds) => {
                self.feeds = feeds;
                self.selected = self.selected.min(self.feeds.len().saturating_sub(1));
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
                return;
            }
        }

        if let Ok(r) = scheduler_res {
            if let Ok(s) = r.json::<SchedulerResponse>().await {
                self.scheduler = s;
            }
        }
        if let Ok(r) = health_res {
            if let Ok(h) = r.json::<HealthResponse>().await {
                self.health = h;
            }
        }
        self.refresh_selected(client).await;
    }

    /// History and win rates of the selected feed.
    pub async fn refresh_selected(&mut self, client: &reqwest::Client) {
        let Some(feed) = self.selected_feed().map(str::to_string) else {
            self.history.clear();
            return;
        };
        let history_url = format!("{}/feeds/{feed}/history?limit=100", self.base_url);
        let stats_url = format!("{}/feeds/{feed}/stats?ranges=10,20,50,100", self.base_url);
        let (history_res, stats_res) =
            tokio::join!(client.get(&history_url).send(), client.get(&stats_url).send());

        if let Ok(r) = history_res {
            if let Ok(h) = r.json::<Vec<HistoryResponse>>().await {
                self.history = h;
            }
        }
        if let Ok(r) = stats_res {
            if let Ok(s) = r.json::<StatsResponse>().await {
                self.stats = s;
            }
        }
    }

    pub async fn trigger(&mut self, client: &reqwest::Client) {
        let url = format!("{}/scheduler/trigger", self.base_url);
        self.notice = match client.post(&url).send().await {
            Ok(r) => match r.json::<TriggerResponse>().await {
                Ok(t) => Some(format!("trigger: {}", t.result)),
                Err(e) => Some(format!("trigger: parse error: {e}")),
            },
            Err(e) => Some(format!("trigger failed: {e}")),
        };
    }

    /// Seconds until the armed cycle, negative once overdue.
    pub fn next_run_in_secs(&self) -> Option<i64> {
        self.scheduler
            .next_run_at
            .map(|at| (at.with_timezone(&Utc) - Utc::now()).num_seconds())
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_countdown(c: Option<&Countdown>) -> String {
    match c {
        Some(c) => format!("{:02}:{:02}", c.minutes, c.seconds),
        None => "—".to_string(),
    }
}

pub fn format_numbers(numbers: Option<[i64; 3]>, sum: Option<i64>) -> String {
    match (numbers, sum) {
        (Some([a, b, c]), Some(s)) => format!("{a}+{b}+{c}={s}"),
        (Some([a, b, c]), None) => format!("{a}+{b}+{c}"),
        _ => "—".to_string(),
    }
}

pub fn format_count(n: Option<u32>) -> String {
    n.map_or("—".to_string(), |n| n.to_string())
}

pub fn format_secs(secs: Option<i64>) -> String {
    match secs {
        Some(s) if s <= 0 => "due".to_string(),
        Some(s) => format!("{:02}:{:02}", s / 60, s % 60),
        None => "—".to_string(),
    }
}

pub fn format_rate(r: &WinRate) -> String {
    format!("{:>5.1}%  ({}/{})", r.win_rate * 100.0, r.sample, r.games)
}

/// Convert nanosecond epoch timestamp to HH:MM:SS string.
pub fn format_time_ns(ns: i64) -> String {
    let secs = (ns / 1_000_000_000) as u64;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
