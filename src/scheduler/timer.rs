use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// One-shot timer. Arming replaces whatever was armed before.
pub struct CycleTimer {
    fire: Arc<Notify>,
    armed: Mutex<Option<Armed>>,
}

struct Armed {
    sleeper: JoinHandle<()>,
    at: DateTime<Local>,
}

impl CycleTimer {
    pub fn new() -> Self {
        Self { fire: Arc::new(Notify::new()), armed: Mutex::new(None) }
    }

    /// Resolves once per expiry. A fire with no waiter is kept until awaited.
    pub async fn fired(&self) {
        self.fire.notified().await;
    }

    pub fn arm(&self, delay: Duration) -> DateTime<Local> {
        let at = Local::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        let fire = Arc::clone(&self.fire);
        let sleeper = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.notify_one();
        });
        if let Ok(mut armed) = self.armed.lock() {
            if let Some(previous) = armed.replace(Armed { sleeper, at }) {
                previous.sleeper.abort();
            }
        }
        at
    }

    pub fn cancel(&self) {
        if let Ok(mut armed) = self.armed.lock() {
            if let Some(previous) = armed.take() {
                previous.sleeper.abort();
            }
        }
    }

    /// Wall-clock time of the pending expiry, if one is armed and not yet fired.
    pub fn next_run_at(&self) -> Option<DateTime<Local>> {
        let armed = self.armed.lock().ok()?;
        armed.as_ref().filter(|a| !a.sleeper.is_finished()).map(|a| a.at)
    }
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CycleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let timer = CycleTimer::new();
        timer.arm(Duration::from_secs(5));
        assert!(timer.next_run_at().is_some());

        let early = tokio::time::timeout(Duration::from_secs(4), timer.fired()).await;
        assert!(early.is_err());
        tokio::time::timeout(Duration::from_secs(2), timer.fired()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_previous() {
        let timer = CycleTimer::new();
        timer.arm(Duration::from_secs(1));
        timer.arm(Duration::from_secs(10));

        let early = tokio::time::timeout(Duration::from_secs(5), timer.fired()).await;
        assert!(early.is_err());
        tokio::time::timeout(Duration::from_secs(6), timer.fired()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let timer = CycleTimer::new();
        timer.arm(Duration::from_secs(1));
        timer.cancel();
        assert!(timer.next_run_at().is_none());
        let fired = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(fired.is_err());
    }
}
