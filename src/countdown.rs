//! Single-line "time until next collection" display on stderr.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor::MoveToColumn,
    queue,
    terminal::{Clear, ClearType},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::types::CycleEvent;

const BAR_CELLS: usize = 20;

/// `距离下次采集: MM分SS秒 [████░░░░ 40%]`
pub fn render_line(remaining: Duration, total: Duration) -> String {
    let secs = remaining.as_secs();
    let pct = if total.is_zero() {
        100
    } else {
        let elapsed = total.saturating_sub(remaining);
        (elapsed.as_secs_f64() / total.as_secs_f64() * 100.0).round().min(100.0) as usize
    };
    let filled = pct * BAR_CELLS / 100;
    format!(
        "距离下次采集: {:02}分{:02}秒 [{}{} {pct}%]",
        secs / 60,
        secs % 60,
        "█".repeat(filled),
        "░".repeat(BAR_CELLS - filled),
    )
}

fn redraw(line: &str) -> io::Result<()> {
    let mut err = io::stderr();
    queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    write!(err, "{line}")?;
    err.flush()
}

fn clear() -> io::Result<()> {
    let mut err = io::stderr();
    queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    err.flush()
}

/// Redraws the countdown every second after a cycle is scheduled and clears
/// it when the next cycle starts.
pub async fn run_countdown(mut rx: broadcast::Receiver<CycleEvent>) {
    let mut target: Option<(Instant, Duration)> = None;
    let mut ticker = interval_at(Instant::now() + Duration::from_secs(1), Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(CycleEvent::NextCycleScheduled { delay, .. }) => {
                    target = Some((Instant::now() + delay, delay));
                    let _ = redraw(&render_line(delay, delay));
                }
                Ok(CycleEvent::CycleStarted { .. }) => {
                    target = None;
                    let _ = clear();
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                if let Some((at, total)) = target {
                    let remaining = at.saturating_duration_since(Instant::now());
                    let _ = redraw(&render_line(remaining, total));
                }
            }
        }
    }
    let _ = clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bar_at_start() {
        let line = render_line(Duration::from_secs(152), Duration::from_secs(152));
        assert_eq!(line, format!("距离下次采集: 02分32秒 [{} 0%]", "░".repeat(20)));
    }

    #[test]
    fn partial_bar() {
        let line = render_line(Duration::from_secs(60), Duration::from_secs(100));
        assert_eq!(line, format!("距离下次采集: 01分00秒 [{}{} 40%]", "█".repeat(8), "░".repeat(12)));
    }

    #[test]
    fn full_bar_when_due() {
        let line = render_line(Duration::ZERO, Duration::from_secs(3));
        assert_eq!(line, format!("距离下次采集: 00分00秒 [{} 100%]", "█".repeat(20)));
        assert!(render_line(Duration::ZERO, Duration::ZERO).ends_with("100%]"));
    }
}
