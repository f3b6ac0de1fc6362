use std::sync::LazyLock;

use regex::Regex;

use crate::types::Parity;

static DRAW_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\+(\d+)\+(\d+)=(\d+)").expect("valid draw code pattern"));

/// Sum part of an `a+b+c=sum` code, exactly as written.
pub fn extract_sum(numbers: &str) -> Option<String> {
    DRAW_CODE
        .captures(numbers)
        .map(|caps| caps[4].to_string())
}

pub fn total_number(numbers: &str) -> Option<i64> {
    extract_sum(numbers).and_then(|s| s.parse().ok())
}

/// Sum 13 or 14, any pair, or three consecutive values.
pub fn is_kill(numbers: &str) -> bool {
    let Some(caps) = DRAW_CODE.captures(numbers) else {
        return false;
    };
    let parsed: Option<Vec<i64>> = (1..=4).map(|i| caps[i].parse::<i64>().ok()).collect();
    let Some(values) = parsed else {
        return false;
    };
    let (mut draw, sum) = ([values[0], values[1], values[2]], values[3]);

    if sum == 13 || sum == 14 {
        return true;
    }
    if draw[0] == draw[1] || draw[1] == draw[2] || draw[0] == draw[2] {
        return true;
    }
    draw.sort_unstable();
    draw[1] - draw[0] == 1 && draw[2] - draw[1] == 1
}

pub fn odd_even(sum: &str) -> Option<Parity> {
    let n: i64 = sum.trim().parse().ok()?;
    Some(if n % 2 == 0 { Parity::Even } else { Parity::Odd })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_is_fourth_group() {
        assert_eq!(extract_sum("6+7+1=14").as_deref(), Some("14"));
        assert_eq!(extract_sum("开奖 0+0+9=09 ok").as_deref(), Some("09"));
        assert_eq!(total_number("0+0+9=09"), Some(9));
    }

    #[test]
    fn sentinels_and_garbage_have_no_sum() {
        assert_eq!(extract_sum("-"), None);
        assert_eq!(extract_sum("---"), None);
        assert_eq!(extract_sum("1+2=3"), None);
        assert_eq!(extract_sum(""), None);
    }

    #[test]
    fn kill_patterns() {
        assert!(is_kill("6+7+1=14"));
        assert!(is_kill("1+1+5=7"));
        assert!(is_kill("2+3+4=9"));
        assert!(is_kill("4+2+3=9"));
        assert!(is_kill("9+0+4=13"));
        assert!(!is_kill("1+2+9=12"));
        assert!(!is_kill("---"));
    }

    #[test]
    fn overflowing_numbers_are_not_kill() {
        assert!(!is_kill("99999999999999999999+1+1=3"));
    }

    #[test]
    fn parity_of_sum() {
        assert_eq!(odd_even("13"), Some(Parity::Odd));
        assert_eq!(odd_even("14"), Some(Parity::Even));
        assert_eq!(odd_even("0"), Some(Parity::Even));
        assert_eq!(odd_even(""), None);
        assert_eq!(odd_even("x1"), None);
    }
}
