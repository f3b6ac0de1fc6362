mod analysis;
mod api;
mod archive;
mod config;
mod countdown;
mod db;
mod error;
mod events;
mod extract;
mod fetcher;
mod merge;
mod scheduler;
mod state;
mod store;
mod types;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::archive::Archive;
use crate::config::{Config, CHANNEL_CAPACITY, MEMORY_DB};
use crate::db::SqliteHistoryStore;
use crate::error::Result;
use crate::extract::HtmlExtractor;
use crate::fetcher::HttpFetcher;
use crate::merge::HistoryUpserter;
use crate::scheduler::{AdaptiveScheduler, Collector};
use crate::state::{MemoryHistoryStore, SnapshotCache};
use crate::store::HistoryStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let history: Arc<dyn HistoryStore> = if cfg.db_path == MEMORY_DB {
        warn!("DB_PATH={MEMORY_DB}: history is kept in memory and lost on exit");
        Arc::new(MemoryHistoryStore::new())
    } else {
        let store = SqliteHistoryStore::open(&cfg.db_path).await?;
        info!("Database ready at {}", cfg.db_path);
        Arc::new(store)
    };

    // --- Shared state ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let snapshots = SnapshotCache::new();
    let (events_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

    // --- Collaborators ---
    let fetcher = Arc::new(HttpFetcher::new(cfg.fetch, Arc::clone(&latency))?);
    let extractor = Arc::new(HtmlExtractor::new()?);
    let upserter = Arc::new(HistoryUpserter::new(Arc::clone(&history)));

    let mut collector = Collector::new(
        cfg.feeds.clone(),
        fetcher,
        extractor,
        upserter,
        Arc::clone(&snapshots),
        events_tx.clone(),
    );
    if let Some(dir) = &cfg.archive_dir {
        info!("Archiving fetched pages to {dir}");
        collector = collector.with_archive(Archive::new(dir));
    }

    let feed_list = cfg.feeds.iter().map(|f| f.id.to_string()).collect::<Vec<_>>().join(", ");
    info!(
        feeds = %feed_list,
        startup_delay_secs = cfg.timing.startup_delay.as_secs(),
        buffer_secs = cfg.timing.buffer.as_secs(),
        "Collecting {} feeds",
        cfg.feeds.len(),
    );

    let scheduler = AdaptiveScheduler::new(collector, cfg.timing, Arc::clone(&health), events_tx.clone());

    // --- Event subscribers ---
    tokio::spawn(events::log_events(events_tx.subscribe()));
    if cfg.show_countdown {
        tokio::spawn(countdown::run_countdown(events_tx.subscribe()));
    }

    let worker = scheduler.start();

    // HTTP API server
    let api_state = ApiState {
        scheduler: scheduler.clone(),
        history,
        snapshots,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let stopper = scheduler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            stopper.stop();
        })
        .await?;

    if let Err(e) = worker.await {
        error!("Scheduler worker ended abnormally: {e}");
    }
    info!("Collector stopped");
    Ok(())
}
