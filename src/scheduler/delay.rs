use std::time::Duration;

use crate::config::{ScheduleTiming, MIN_CYCLE_DELAY_MS};
use crate::types::{Countdown, DelayReason};

/// What a finished cycle tells the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// At least one feed was collected. Carries the first usable countdown
    /// in feed configuration order.
    Completed { countdown: Option<Countdown> },
    /// Every feed failed, or the cycle task died.
    Failed,
}

/// Never below `MIN_CYCLE_DELAY_MS`, whatever the timing says.
pub fn compute_next_delay(outcome: &CycleOutcome, timing: &ScheduleTiming) -> (Duration, DelayReason) {
    let (delay, reason) = match outcome {
        CycleOutcome::Completed { countdown: Some(c) } => {
            (c.as_duration() + timing.buffer, DelayReason::Countdown)
        }
        CycleOutcome::Completed { countdown: None } => (timing.default_interval, DelayReason::Default),
        CycleOutcome::Failed => (timing.fallback_interval, DelayReason::Fallback),
    };
    (clamp_delay(delay), reason)
}

pub fn clamp_delay(delay: Duration) -> Duration {
    delay.max(Duration::from_millis(MIN_CYCLE_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_plus_buffer() {
        let outcome = CycleOutcome::Completed { countdown: Some(Countdown { minutes: 2, seconds: 30 }) };
        let (delay, reason) = compute_next_delay(&outcome, &ScheduleTiming::default());
        assert_eq!(delay, Duration::from_secs(152));
        assert_eq!(reason, DelayReason::Countdown);
    }

    #[test]
    fn zero_countdown_still_waits_for_buffer() {
        let outcome = CycleOutcome::Completed { countdown: Some(Countdown { minutes: 0, seconds: 0 }) };
        assert_eq!(compute_next_delay(&outcome, &ScheduleTiming::default()).0, Duration::from_secs(2));
    }

    #[test]
    fn no_countdown_uses_default() {
        let outcome = CycleOutcome::Completed { countdown: None };
        let (delay, reason) = compute_next_delay(&outcome, &ScheduleTiming::default());
        assert_eq!(delay, Duration::from_secs(3));
        assert_eq!(reason, DelayReason::Default);
    }

    #[test]
    fn failure_uses_fallback() {
        let (delay, reason) = compute_next_delay(&CycleOutcome::Failed, &ScheduleTiming::default());
        assert_eq!(delay, Duration::from_secs(30));
        assert_eq!(reason, DelayReason::Fallback);
    }

    #[test]
    fn zero_timings_are_floored() {
        let timing = ScheduleTiming {
            buffer: Duration::ZERO,
            default_interval: Duration::ZERO,
            fallback_interval: Duration::ZERO,
            startup_delay: Duration::ZERO,
        };
        let zero = CycleOutcome::Completed { countdown: Some(Countdown { minutes: 0, seconds: 0 }) };
        let floor = Duration::from_millis(MIN_CYCLE_DELAY_MS);
        assert_eq!(compute_next_delay(&zero, &timing), (floor, DelayReason::Countdown));
        let none = CycleOutcome::Completed { countdown: None };
        assert_eq!(compute_next_delay(&none, &timing).0, floor);
        assert_eq!(compute_next_delay(&CycleOutcome::Failed, &timing).0, floor);
    }
}
