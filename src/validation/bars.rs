//! OHLCV integrity checks.
//!
//! Validates:
//! - Prices positive and finite-looking (open/high/low/close > 0)
//! - Range consistency (low <= open, close <= high)
//! - Strictly increasing timestamps
//! - Session gaps (missing weekdays are reported, never filled)

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::Bar;

/// Result of a single validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Integrity report for a bar series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarIntegrityReport {
    pub bar_count: usize,
    pub invalid_bars: usize,
    pub missing_sessions: usize,
    pub checks: Vec<CheckResult>,
}

impl BarIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!(
            "{} bars ({} invalid, {} missing sessions): {}/{} checks passed",
            self.bar_count,
            self.invalid_bars,
            self.missing_sessions,
            passed,
            self.checks.len()
        )
    }
}

/// Check a single bar. Returns the first problem found.
pub fn validate_bar(bar: &Bar) -> Result<(), String> {
    for (name, value) in [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ] {
        if value <= Decimal::ZERO {
            return Err(format!("{} {} is not positive", name, value));
        }
    }
    if bar.low > bar.high {
        return Err(format!("low {} above high {}", bar.low, bar.high));
    }
    if bar.open < bar.low || bar.open > bar.high {
        return Err(format!("open {} outside [{}, {}]", bar.open, bar.low, bar.high));
    }
    if bar.close < bar.low || bar.close > bar.high {
        return Err(format!("close {} outside [{}, {}]", bar.close, bar.low, bar.high));
    }
    if bar.volume < 0 {
        return Err(format!("negative volume {}", bar.volume));
    }
    Ok(())
}

/// Run every series-level check.
pub fn validate_series(bars: &[Bar]) -> BarIntegrityReport {
    let mut checks = Vec::new();

    let invalid: Vec<String> = bars
        .iter()
        .filter_map(|b| validate_bar(b).err().map(|e| format!("{}: {}", b.timestamp, e)))
        .collect();
    checks.push(if invalid.is_empty() {
        CheckResult::pass("bar_values", "All bars have consistent OHLC values")
    } else {
        CheckResult::fail(
            "bar_values",
            &format!("{} invalid bars", invalid.len()),
            invalid.first().cloned(),
        )
    });

    let out_of_order = bars
        .windows(2)
        .filter(|w| w[1].timestamp <= w[0].timestamp)
        .count();
    checks.push(if out_of_order == 0 {
        CheckResult::pass("ordering", "Timestamps strictly increasing")
    } else {
        CheckResult::fail(
            "ordering",
            &format!("{} non-increasing timestamps", out_of_order),
            None,
        )
    });

    let mut missing_sessions = 0;
    for w in bars.windows(2) {
        let (prev, next) = (w[0].date(), w[1].date());
        let mut expected = next_trading_day(prev);
        while expected < next {
            missing_sessions += 1;
            expected = next_trading_day(expected);
        }
    }
    checks.push(CheckResult::pass(
        "continuity",
        &format!("{} missing weekday sessions", missing_sessions),
    ));

    BarIntegrityReport {
        bar_count: bars.len(),
        invalid_bars: invalid.len(),
        missing_sessions,
        checks,
    }
}

/// Next weekday after `date`.
fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(15, 30, 0)
                .unwrap(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(95),
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_validate_bar() {
        assert!(validate_bar(&bar(2, dec!(101))).is_ok());
        assert!(validate_bar(&bar(2, dec!(110))).is_err());
        assert!(validate_bar(&bar(2, dec!(0))).is_err());
    }

    #[test]
    fn test_missing_sessions_counted() {
        // Tue 2nd, Wed 3rd, then Mon 8th: Thu and Fri missing
        let bars = vec![bar(2, dec!(101)), bar(3, dec!(102)), bar(8, dec!(103))];
        let report = validate_series(&bars);
        assert_eq!(report.missing_sessions, 2);
        assert!(report.all_passed());
    }

    #[test]
    fn test_invalid_series() {
        let bars = vec![bar(3, dec!(101)), bar(2, dec!(200))];
        let report = validate_series(&bars);
        assert_eq!(report.invalid_bars, 1);
        assert_eq!(report.failed_checks().len(), 2);
    }

    #[test]
    fn test_next_trading_day() {
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            next_trading_day(friday),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }
}
