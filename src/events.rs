use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::types::CycleEvent;

/// Logs every cycle event until the channel closes.
pub async fn log_events(mut rx: broadcast::Receiver<CycleEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(n)) => warn!("event logger lagged, {n} events dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &CycleEvent) {
    match event {
        CycleEvent::CycleStarted { cycle } => debug!(event = "CYCLE_STARTED", cycle),
        CycleEvent::FeedCollected { cycle, feed, period, rows, saved } => debug!(
            event = "FEED_COLLECTED",
            cycle,
            feed = %feed,
            period = period.as_deref().unwrap_or("-"),
            rows,
            saved,
        ),
        CycleEvent::FeedFailed { cycle, feed, stage, reason } => warn!(
            event = "FEED_FAILED",
            cycle,
            feed = %feed,
            stage = %stage,
            "FEED FAILED  | {feed} | {stage}: {reason}",
        ),
        CycleEvent::CycleFinished { cycle, success, saved, elapsed } => {
            let per_feed = saved
                .iter()
                .map(|(feed, n)| format!("{feed}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            info!(
                event = "CYCLE_FINISHED",
                cycle,
                success,
                elapsed_ms = elapsed.as_millis() as u64,
                "CYCLE DONE   | #{cycle} | {} | saved: {}",
                if *success { "ok" } else { "failed" },
                if per_feed.is_empty() { "none".to_string() } else { per_feed },
            );
        }
        CycleEvent::NextCycleScheduled { delay, reason } => debug!(
            event = "NEXT_CYCLE_SCHEDULED",
            delay_secs = delay.as_secs(),
            reason = %reason,
        ),
        CycleEvent::TriggerSkipped => debug!(event = "TRIGGER_SKIPPED"),
    }
}
