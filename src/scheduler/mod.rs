//! Adaptive collection scheduler.
//!
//! Cycles are armed on a one-shot timer whose delay is derived from the
//! countdown the previous cycle extracted, so polls land just after the
//! remote page rotates. A compare-and-set guard keeps cycles from
//! overlapping; a trigger that loses the race is dropped, not queued.

pub mod collector;
pub mod delay;
pub mod guard;
pub mod timer;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use collector::Collector;
pub use delay::{compute_next_delay, CycleOutcome};
pub use guard::{RunGuard, RunPermit};
pub use timer::CycleTimer;

use crate::api::health::HealthState;
use crate::config::ScheduleTiming;
use crate::store::now_ns;
use crate::types::{CycleEvent, DelayReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerResult {
    Started,
    /// A cycle was already running.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycle_count: u64,
    pub next_run_at: Option<DateTime<Local>>,
    pub last_delay_secs: Option<u64>,
    pub last_delay_reason: Option<DelayReason>,
}

struct Progress {
    state: SchedulerState,
    last_delay: Option<(Duration, DelayReason)>,
}

/// Cheap to clone; all clones drive the same scheduler.
#[derive(Clone)]
pub struct AdaptiveScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    collector: Arc<Collector>,
    timing: ScheduleTiming,
    guard: Arc<RunGuard>,
    timer: CycleTimer,
    health: Arc<HealthState>,
    events: broadcast::Sender<CycleEvent>,
    progress: Mutex<Progress>,
    cycles: AtomicU64,
    stopped: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl AdaptiveScheduler {
    pub fn new(
        collector: Collector,
        timing: ScheduleTiming,
        health: Arc<HealthState>,
        events: broadcast::Sender<CycleEvent>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                collector: Arc::new(collector),
                timing,
                guard: RunGuard::new(),
                timer: CycleTimer::new(),
                health,
                events,
                progress: Mutex::new(Progress { state: SchedulerState::Idle, last_delay: None }),
                cycles: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Arm the startup delay and spawn the worker that fires cycles.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        inner.stopped.store(false, Ordering::Release);
        inner.shutdown.send_replace(false);
        let mut shutdown = inner.shutdown.subscribe();
        inner.schedule(delay::clamp_delay(inner.timing.startup_delay), DelayReason::Startup);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.timer.fired() => {
                        Inner::trigger(&inner);
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("scheduler worker stopped");
        })
    }

    /// Cancel the armed timer and end the worker. A cycle already in flight
    /// runs to completion but does not re-arm.
    pub fn stop(&self) {
        let inner = &self.inner;
        inner.stopped.store(true, Ordering::Release);
        inner.timer.cancel();
        inner.shutdown.send_replace(true);
        if !inner.guard.is_held() {
            inner.set_state(SchedulerState::Idle);
        }
        info!(event = "SCHEDULER_STOP", "scheduler stopped");
    }

    /// Start a cycle now unless one is already running.
    pub fn trigger(&self) -> TriggerResult {
        Inner::trigger(&self.inner)
    }

    pub fn status(&self) -> SchedulerStatus {
        let inner = &self.inner;
        let (state, last_delay) = inner
            .progress
            .lock()
            .map(|p| (p.state, p.last_delay))
            .unwrap_or((SchedulerState::Idle, None));
        SchedulerStatus {
            state,
            cycle_count: inner.cycles.load(Ordering::Relaxed),
            next_run_at: inner.timer.next_run_at(),
            last_delay_secs: last_delay.map(|(d, _)| d.as_secs()),
            last_delay_reason: last_delay.map(|(_, r)| r),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.inner.events.subscribe()
    }

    pub fn collector(&self) -> &Collector {
        &self.inner.collector
    }
}

impl Inner {
    fn set_state(&self, state: SchedulerState) {
        if let Ok(mut p) = self.progress.lock() {
            p.state = state;
        }
    }

    fn trigger(inner: &Arc<Inner>) -> TriggerResult {
        if inner.stopped.load(Ordering::Acquire) {
            return TriggerResult::Skipped;
        }
        let Some(permit) = inner.guard.try_acquire() else {
            warn!(event = "TRIGGER_SKIPPED", "cycle already running, trigger ignored");
            let _ = inner.events.send(CycleEvent::TriggerSkipped);
            return TriggerResult::Skipped;
        };
        let runner = Arc::clone(inner);
        tokio::spawn(async move { runner.run_cycle(permit).await });
        TriggerResult::Started
    }

    async fn run_cycle(self: Arc<Self>, permit: RunPermit) {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.set_state(SchedulerState::Running);
        info!(event = "CYCLE_START", cycle, "cycle {cycle} started");
        let _ = self.events.send(CycleEvent::CycleStarted { cycle });

        let collector = Arc::clone(&self.collector);
        let started = std::time::Instant::now();
        let outcome = match tokio::spawn(async move { collector.run_cycle(cycle).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(event = "CYCLE_ABORTED", cycle, "cycle task died: {e}");
                let _ = self.events.send(CycleEvent::CycleFinished {
                    cycle,
                    success: false,
                    saved: Default::default(),
                    elapsed: started.elapsed(),
                });
                CycleOutcome::Failed
            }
        };

        self.health
            .record_cycle(now_ns() as u64, matches!(outcome, CycleOutcome::Completed { .. }));

        if self.stopped.load(Ordering::Acquire) {
            self.set_state(SchedulerState::Idle);
        } else {
            let (delay, reason) = compute_next_delay(&outcome, &self.timing);
            self.schedule(delay, reason);
        }
        drop(permit);
    }

    fn schedule(&self, delay: Duration, reason: DelayReason) {
        let at = self.timer.arm(delay);
        if self.stopped.load(Ordering::Acquire) {
            self.timer.cancel();
            self.set_state(SchedulerState::Idle);
            return;
        }
        if let Ok(mut p) = self.progress.lock() {
            p.state = SchedulerState::Scheduled;
            p.last_delay = Some((delay, reason));
        }
        info!(
            event = "NEXT_CYCLE",
            delay_secs = delay.as_secs(),
            reason = %reason,
            "next cycle in {}s at {} ({reason})",
            delay.as_secs(),
            at.format("%H:%M:%S"),
        );
        let _ = self.events.send(CycleEvent::NextCycleScheduled { delay, reason });
    }
}
