use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PENDING_SENTINELS;

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Short prefix naming one polled source, e.g. `sf1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Current draw
// ---------------------------------------------------------------------------

/// Time left until the remote page rotates to the next draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub minutes: u32,
    pub seconds: u32,
}

impl Countdown {
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.minutes) * 60 + u64::from(self.seconds))
    }
}

/// "Not yet opened" run counters for the three tracked patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotOpenedCounters {
    /// 大单
    pub big_odd: Option<u32>,
    /// 小单
    pub small_odd: Option<u32>,
    /// 小双
    pub small_even: Option<u32>,
}

/// Current-draw view of one feed at fetch time. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawSnapshot {
    pub period: Option<String>,
    pub countdown: Option<Countdown>,
    pub numbers: Option<[i64; 3]>,
    pub sum: Option<i64>,
    pub big_small: Option<String>,
    pub odd_even: Option<String>,
    pub not_opened: NotOpenedCounters,
}

// ---------------------------------------------------------------------------
// History classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn label(&self) -> &'static str {
        match self {
            Parity::Odd => "单",
            Parity::Even => "双",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "单" => Some(Parity::Odd),
            "双" => Some(Parity::Even),
            _ => None,
        }
    }
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Hit/miss flag of a historical prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// 中
    Hit,
    /// 错
    Miss,
    /// Not revealed yet.
    Pending,
}

impl Outcome {
    pub fn as_flag(&self) -> &'static str {
        match self {
            Outcome::Hit => "中",
            Outcome::Miss => "错",
            Outcome::Pending => "---",
        }
    }

    /// Anything other than the two known flags reads as pending.
    pub fn from_flag(s: &str) -> Self {
        match s.trim() {
            "中" => Outcome::Hit,
            "错" => Outcome::Miss,
            _ => Outcome::Pending,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_flag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BettingResult {
    /// Prediction hit, no kill pattern.
    HitProfit,
    /// Prediction hit, but the draw was a kill.
    HitKilled,
    /// Prediction missed, no kill pattern.
    MissProfit,
    /// Prediction missed on a kill draw.
    MissLoss,
    Unknown,
}

impl BettingResult {
    pub fn key(&self) -> &'static str {
        match self {
            BettingResult::HitProfit => "hit_profit",
            BettingResult::HitKilled => "hit_killed",
            BettingResult::MissProfit => "miss_profit",
            BettingResult::MissLoss => "miss_loss",
            BettingResult::Unknown => "unknown",
        }
    }

    pub fn from_key(s: &str) -> Self {
        match s {
            "hit_profit" => BettingResult::HitProfit,
            "hit_killed" => BettingResult::HitKilled,
            "miss_profit" => BettingResult::MissProfit,
            "miss_loss" => BettingResult::MissLoss,
            _ => BettingResult::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BettingResult::HitProfit => "命中盈利",
            BettingResult::HitKilled => "命中被杀",
            BettingResult::MissProfit => "未命中盈利",
            BettingResult::MissLoss => "未命中亏损",
            BettingResult::Unknown => "未知",
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, BettingResult::HitProfit | BettingResult::MissProfit)
    }
}

impl std::fmt::Display for BettingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// History rows
// ---------------------------------------------------------------------------

/// One history row as found in the page, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRow {
    pub period_text: String,
    /// None when the period cell is not an integer. Such rows cannot be merged.
    pub period: Option<i64>,
    pub numbers: String,
    /// Prediction tokens rendered as `单(√) 双(×)`.
    pub prediction_raw: String,
    /// `单`, `双` or empty.
    pub prediction: String,
    pub outcome: Outcome,
    /// Marker and text signals disagreed for the outcome cell.
    pub outcome_conflict: bool,
}

/// A classified past draw, keyed by (feed, period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub period: i64,
    pub numbers: String,
    pub total_number: Option<i64>,
    pub prediction: String,
    pub outcome: Outcome,
    pub kill: bool,
    pub betting_result: BettingResult,
    pub open_result: Option<Parity>,
}

impl HistoryEntry {
    /// True while the numbers cell still holds a "not revealed" placeholder.
    pub fn is_pending(&self) -> bool {
        is_pending_numbers(&self.numbers)
    }
}

pub fn is_pending_numbers(numbers: &str) -> bool {
    PENDING_SENTINELS.contains(&numbers.trim())
}

// ---------------------------------------------------------------------------
// Cycle events: fire-and-forget notifications for subscribers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStage {
    Fetch,
    Extract,
}

impl std::fmt::Display for FeedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedStage::Fetch => write!(f, "fetch"),
            FeedStage::Extract => write!(f, "extract"),
        }
    }
}

/// Which rule picked the next-cycle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayReason {
    Startup,
    Countdown,
    Default,
    Fallback,
}

impl std::fmt::Display for DelayReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DelayReason::Startup => "startup",
            DelayReason::Countdown => "countdown",
            DelayReason::Default => "default",
            DelayReason::Fallback => "fallback",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub enum CycleEvent {
    CycleStarted {
        cycle: u64,
    },
    FeedCollected {
        cycle: u64,
        feed: FeedId,
        period: Option<String>,
        rows: usize,
        saved: usize,
    },
    FeedFailed {
        cycle: u64,
        feed: FeedId,
        stage: FeedStage,
        reason: String,
    },
    CycleFinished {
        cycle: u64,
        success: bool,
        saved: BTreeMap<FeedId, usize>,
        elapsed: Duration,
    },
    NextCycleScheduled {
        delay: Duration,
        reason: DelayReason,
    },
    TriggerSkipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_flags_round_through_labels() {
        assert_eq!(Outcome::from_flag("中"), Outcome::Hit);
        assert_eq!(Outcome::from_flag(" 错 "), Outcome::Miss);
        assert_eq!(Outcome::from_flag("---"), Outcome::Pending);
        assert_eq!(Outcome::from_flag("?"), Outcome::Pending);
        assert_eq!(Outcome::Hit.as_flag(), "中");
    }

    #[test]
    fn sentinels_mark_pending_numbers() {
        assert!(is_pending_numbers("-"));
        assert!(is_pending_numbers("---"));
        assert!(!is_pending_numbers("1+2+3=6"));
        assert!(!is_pending_numbers(""));
    }

    #[test]
    fn countdown_converts_to_duration() {
        let c = Countdown { minutes: 2, seconds: 30 };
        assert_eq!(c.as_duration(), Duration::from_secs(150));
    }

    #[test]
    fn betting_result_keys_are_stable() {
        for r in [
            BettingResult::HitProfit,
            BettingResult::HitKilled,
            BettingResult::MissProfit,
            BettingResult::MissLoss,
            BettingResult::Unknown,
        ] {
            assert_eq!(BettingResult::from_key(r.key()), r);
        }
    }
}
