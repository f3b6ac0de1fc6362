use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::FeedId;

/// Page URL pattern; `{feed}` is replaced by the feed identifier.
pub const FEED_URL_TEMPLATE: &str = "http://www.redtaotao.com/jnd28_{feed}_msds.html";

/// Feeds polled when FEEDS is not set.
pub const DEFAULT_FEEDS: &[&str] = &["sf1", "sf3", "sf4", "sf5", "sf6", "sf7"];

/// Values a numbers cell carries while a draw has not been revealed yet.
pub const PENDING_SENTINELS: &[&str] = &["-", "---"];

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// DB_PATH value that selects the in-memory history store.
pub const MEMORY_DB: &str = ":memory:";

/// Channel capacity for cycle events.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Added to the remote countdown so the next poll lands after the site has rotated.
pub const TASK_BUFFER_SECS: u64 = 2;

/// Next-cycle delay when no feed yielded a usable countdown.
pub const TASK_DEFAULT_INTERVAL_SECS: u64 = 3;

/// Next-cycle delay after a failed cycle. Longer than the default to back off a dead source.
pub const TASK_FALLBACK_INTERVAL_SECS: u64 = 30;

/// Floor for every armed delay, including startup.
pub const MIN_CYCLE_DELAY_MS: u64 = 1_000;

/// Delay before the first cycle after process start.
pub const TASK_STARTUP_DELAY_SECS: u64 = 10;

pub const FETCH_TIMEOUT_MS: u64 = 5_000;
pub const FETCH_MAX_RETRIES: u32 = 3;
pub const FETCH_RETRY_WAIT_MS: u64 = 2_000;

/// One independently polled remote page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub id: FeedId,
    pub url: String,
}

impl FeedConfig {
    pub fn from_template(id: &str, template: &str) -> Self {
        Self {
            id: FeedId::new(id),
            url: template.replace("{feed}", id),
        }
    }
}

/// Delays that drive the adaptive scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTiming {
    pub buffer: Duration,
    pub default_interval: Duration,
    pub fallback_interval: Duration,
    pub startup_delay: Duration,
}

impl Default for ScheduleTiming {
    fn default() -> Self {
        Self {
            buffer: Duration::from_secs(TASK_BUFFER_SECS),
            default_interval: Duration::from_secs(TASK_DEFAULT_INTERVAL_SECS),
            fallback_interval: Duration::from_secs(TASK_FALLBACK_INTERVAL_SECS),
            startup_delay: Duration::from_secs(TASK_STARTUP_DELAY_SECS),
        }
    }
}

/// Timeout and retry policy owned by the HTTP fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_wait: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(FETCH_TIMEOUT_MS),
            max_retries: FETCH_MAX_RETRIES,
            retry_wait: Duration::from_millis(FETCH_RETRY_WAIT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Polled feeds in configuration order (FEEDS, comma-separated `id` or `id=url`).
    pub feeds: Vec<FeedConfig>,
    pub timing: ScheduleTiming,
    pub fetch: FetchPolicy,
    /// Redraw a countdown line on stderr between cycles (SHOW_COUNTDOWN)
    pub show_countdown: bool,
    /// Directory where fetched pages are kept for inspection (ARCHIVE_DIR)
    pub archive_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let template =
            std::env::var("FEED_URL_TEMPLATE").unwrap_or_else(|_| FEED_URL_TEMPLATE.to_string());
        let feeds = match std::env::var("FEEDS") {
            Ok(raw) => parse_feeds(&raw, &template)?,
            Err(_) => DEFAULT_FEEDS
                .iter()
                .map(|id| FeedConfig::from_template(id, &template))
                .collect(),
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "draws.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            feeds,
            timing: ScheduleTiming {
                buffer: Duration::from_secs(env_u64("TASK_BUFFER_SECS", TASK_BUFFER_SECS)),
                default_interval: Duration::from_secs(env_u64(
                    "TASK_DEFAULT_INTERVAL_SECS",
                    TASK_DEFAULT_INTERVAL_SECS,
                )),
                fallback_interval: Duration::from_secs(env_u64(
                    "TASK_FALLBACK_INTERVAL_SECS",
                    TASK_FALLBACK_INTERVAL_SECS,
                )),
                startup_delay: Duration::from_secs(env_u64(
                    "TASK_STARTUP_DELAY_SECS",
                    TASK_STARTUP_DELAY_SECS,
                )),
            },
            fetch: FetchPolicy {
                timeout: Duration::from_millis(env_u64("FETCH_TIMEOUT_MS", FETCH_TIMEOUT_MS)),
                max_retries: env_u64("FETCH_MAX_RETRIES", FETCH_MAX_RETRIES as u64) as u32,
                retry_wait: Duration::from_millis(env_u64(
                    "FETCH_RETRY_WAIT_MS",
                    FETCH_RETRY_WAIT_MS,
                )),
            },
            show_countdown: std::env::var("SHOW_COUNTDOWN")
                .map(|v| !matches!(v.trim(), "0" | "false" | "off"))
                .unwrap_or(true),
            archive_dir: std::env::var("ARCHIVE_DIR")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Parse `sf1,sf3=http://host/page.html,...`. Bare ids expand through `template`.
pub fn parse_feeds(raw: &str, template: &str) -> Result<Vec<FeedConfig>> {
    let mut feeds: Vec<FeedConfig> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let feed = match item.split_once('=') {
            Some((id, url)) => {
                let (id, url) = (id.trim(), url.trim());
                if id.is_empty() || url.is_empty() {
                    return Err(AppError::Config(format!("malformed FEEDS entry: {item}")));
                }
                FeedConfig { id: FeedId::new(id), url: url.to_string() }
            }
            None => FeedConfig::from_template(item, template),
        };
        if feeds.iter().any(|f| f.id == feed.id) {
            return Err(AppError::Config(format!("duplicate feed id: {}", feed.id)));
        }
        feeds.push(feed);
    }
    if feeds.is_empty() {
        return Err(AppError::Config("FEEDS must name at least one feed".to_string()));
    }
    Ok(feeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ids_expand_through_template() {
        let feeds = parse_feeds("sf1, sf6", FEED_URL_TEMPLATE).unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].id.as_str(), "sf1");
        assert_eq!(feeds[1].url, "http://www.redtaotao.com/jnd28_sf6_msds.html");
    }

    #[test]
    fn explicit_urls_are_kept() {
        let feeds = parse_feeds("sf1=http://localhost:8080/a.html", FEED_URL_TEMPLATE).unwrap();
        assert_eq!(feeds[0].url, "http://localhost:8080/a.html");
    }

    #[test]
    fn duplicate_and_empty_feed_lists_are_rejected() {
        assert!(parse_feeds("sf1,sf1", FEED_URL_TEMPLATE).is_err());
        assert!(parse_feeds(" , ", FEED_URL_TEMPLATE).is_err());
        assert!(parse_feeds("=http://x", FEED_URL_TEMPLATE).is_err());
    }
}
