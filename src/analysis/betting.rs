use crate::types::{BettingResult, Outcome};

/// Combine a prediction label, its outcome and the kill flag into a betting result.
pub fn classify_bet(prediction: &str, outcome: Outcome, kill: bool) -> BettingResult {
    if prediction.trim().is_empty() {
        return BettingResult::Unknown;
    }
    match (outcome, kill) {
        (Outcome::Hit, true) => BettingResult::HitKilled,
        (Outcome::Hit, false) => BettingResult::HitProfit,
        (Outcome::Miss, true) => BettingResult::MissLoss,
        (Outcome::Miss, false) => BettingResult::MissProfit,
        (Outcome::Pending, _) => BettingResult::Unknown,
    }
}

/// `单` wins over `双` when a free-form cell mentions both.
pub fn prediction_label(text: &str) -> &'static str {
    if text.contains('单') {
        "单"
    } else if text.contains('双') {
        "双"
    } else {
        ""
    }
}

/// Share of winning results among the first `n` (most recent first).
pub fn win_rate(results: &[BettingResult], n: usize) -> f64 {
    let window = &results[..n.min(results.len())];
    if window.is_empty() {
        return 0.0;
    }
    let wins = window.iter().filter(|r| r.is_win()).count();
    wins as f64 / window.len() as f64
}

pub fn win_rates_for_ranges(results: &[BettingResult], ranges: &[usize]) -> Vec<(usize, f64)> {
    ranges.iter().map(|&n| (n, win_rate(results, n))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use BettingResult::*;

    #[test]
    fn classification_table() {
        assert_eq!(classify_bet("单", Outcome::Hit, false), HitProfit);
        assert_eq!(classify_bet("单", Outcome::Hit, true), HitKilled);
        assert_eq!(classify_bet("双", Outcome::Miss, false), MissProfit);
        assert_eq!(classify_bet("双", Outcome::Miss, true), MissLoss);
        assert_eq!(classify_bet("", Outcome::Hit, false), Unknown);
        assert_eq!(classify_bet("单", Outcome::Pending, true), Unknown);
    }

    #[test]
    fn prediction_labels() {
        assert_eq!(prediction_label("单(√) 双(×)"), "单");
        assert_eq!(prediction_label("双(√)"), "双");
        assert_eq!(prediction_label("大"), "");
    }

    #[test]
    fn win_rate_counts_profit_categories() {
        let results = [HitProfit, MissProfit, HitKilled, MissLoss, Unknown];
        assert_eq!(win_rate(&results, 2), 1.0);
        assert_eq!(win_rate(&results, 4), 0.5);
        assert_eq!(win_rate(&results, 100), 0.4);
        assert_eq!(win_rate(&results, 0), 0.0);
        assert_eq!(win_rate(&[], 10), 0.0);
    }

    #[test]
    fn ranges_keep_their_order() {
        let results = [HitProfit, MissLoss];
        let rates = win_rates_for_ranges(&results, &[1, 2]);
        assert_eq!(rates, vec![(1, 1.0), (2, 0.5)]);
    }
}
