pub mod betting;
pub mod numbers;

pub use betting::{classify_bet, prediction_label, win_rate, win_rates_for_ranges};
pub use numbers::{extract_sum, is_kill, odd_even, total_number};

use crate::types::{ExtractedRow, HistoryEntry};

/// Derive the stored form of an extracted row. The caller supplies the parsed period.
pub fn enrich(period: i64, row: &ExtractedRow) -> HistoryEntry {
    let kill = is_kill(&row.numbers);
    HistoryEntry {
        period,
        numbers: row.numbers.trim().to_string(),
        total_number: total_number(&row.numbers),
        prediction: row.prediction.clone(),
        outcome: row.outcome,
        kill,
        betting_result: classify_bet(&row.prediction, row.outcome, kill),
        open_result: extract_sum(&row.numbers).as_deref().and_then(odd_even),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BettingResult, Outcome, Parity};

    fn row(numbers: &str, prediction: &str, outcome: Outcome) -> ExtractedRow {
        ExtractedRow {
            period_text: "3301234".into(),
            period: Some(3_301_234),
            numbers: numbers.into(),
            prediction_raw: String::new(),
            prediction: prediction.into(),
            outcome,
            outcome_conflict: false,
        }
    }

    #[test]
    fn enrich_revealed_row() {
        let e = enrich(3_301_234, &row("6+7+1=14", "双", Outcome::Hit));
        assert_eq!(e.total_number, Some(14));
        assert!(e.kill);
        assert_eq!(e.betting_result, BettingResult::HitKilled);
        assert_eq!(e.open_result, Some(Parity::Even));
    }

    #[test]
    fn enrich_pending_row() {
        let e = enrich(3_301_235, &row("---", "单", Outcome::Pending));
        assert_eq!(e.total_number, None);
        assert!(!e.kill);
        assert_eq!(e.betting_result, BettingResult::Unknown);
        assert_eq!(e.open_result, None);
        assert!(e.is_pending());
    }
}
