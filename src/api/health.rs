//! Shared health state for the /health endpoint.
//! Updated by the scheduler at the end of every cycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// Nanosecond timestamp of the last finished cycle (0 = none yet).
    pub last_cycle_at_ns: AtomicU64,
    pub last_cycle_ok: AtomicBool,
    /// Failed cycles since the last successful one.
    pub consecutive_failures: AtomicU64,
    pub cycles_total: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, at_ns: u64, ok: bool) {
        self.last_cycle_at_ns.store(at_ns, Ordering::Relaxed);
        self.last_cycle_ok.store(ok, Ordering::Relaxed);
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        } else {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn last_cycle_at_ns(&self) -> u64 {
        self.last_cycle_at_ns.load(Ordering::Relaxed)
    }

    pub fn last_cycle_ok(&self) -> bool {
        self.last_cycle_ok.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_reset_on_success() {
        let h = HealthState::new();
        h.record_cycle(1, false);
        h.record_cycle(2, false);
        assert_eq!(h.consecutive_failures(), 2);
        h.record_cycle(3, true);
        assert_eq!(h.consecutive_failures(), 0);
        assert_eq!(h.cycles_total(), 3);
        assert_eq!(h.last_cycle_at_ns(), 3);
        assert!(h.last_cycle_ok());
    }
}
