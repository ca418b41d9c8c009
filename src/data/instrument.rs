//! Index derivative contract specifications.
//!
//! Lot sizes, strike intervals and tick sizes for the index options the
//! simulator supports, plus weekly expiry calendar helpers.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Supported underlying indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexInstrument {
    Nifty,
    BankNifty,
    FinNifty,
    MidcpNifty,
    Sensex,
}

impl IndexInstrument {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Nifty => "NIFTY",
            Self::BankNifty => "BANKNIFTY",
            Self::FinNifty => "FINNIFTY",
            Self::MidcpNifty => "MIDCPNIFTY",
            Self::Sensex => "SENSEX",
        }
    }

    /// Contract lot size.
    pub fn lot_size(&self) -> u32 {
        match self {
            Self::Nifty => 50,
            Self::BankNifty => 15,
            Self::FinNifty => 40,
            Self::MidcpNifty => 75,
            Self::Sensex => 10,
        }
    }

    /// Strike price interval.
    pub fn strike_increment(&self) -> Decimal {
        match self {
            Self::Nifty | Self::FinNifty => dec!(50),
            Self::BankNifty | Self::Sensex => dec!(100),
            Self::MidcpNifty => dec!(25),
        }
    }

    /// Minimum premium tick.
    pub fn tick_size(&self) -> Decimal {
        dec!(0.05)
    }

    /// Weekday on which weekly contracts expire.
    pub fn expiry_weekday(&self) -> Weekday {
        match self {
            Self::Nifty => Weekday::Thu,
            Self::BankNifty => Weekday::Wed,
            Self::FinNifty => Weekday::Tue,
            Self::MidcpNifty => Weekday::Mon,
            Self::Sensex => Weekday::Fri,
        }
    }

    /// First weekly expiry on or after `date` that leaves at least `min_dte`
    /// calendar days.
    pub fn next_expiry(&self, date: NaiveDate, min_dte: i64) -> NaiveDate {
        let target = self.expiry_weekday().num_days_from_monday() as i64;
        let current = date.weekday().num_days_from_monday() as i64;
        let mut expiry = date + Duration::days((target - current).rem_euclid(7));
        while (expiry - date).num_days() < min_dte {
            expiry += Duration::days(7);
        }
        expiry
    }
}

impl Default for IndexInstrument {
    fn default() -> Self {
        Self::Nifty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nifty_spec() {
        let nifty = IndexInstrument::Nifty;
        assert_eq!(nifty.lot_size(), 50);
        assert_eq!(nifty.strike_increment(), dec!(50));
        assert_eq!(nifty.tick_size(), dec!(0.05));
        assert_eq!(nifty.symbol(), "NIFTY");
    }

    #[test]
    fn test_next_expiry_respects_min_dte() {
        // Monday 2024-01-15; NIFTY expires Thursdays.
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let nifty = IndexInstrument::Nifty;

        assert_eq!(
            nifty.next_expiry(monday, 0),
            NaiveDate::from_ymd_opt(2024, 1, 18).unwrap()
        );
        assert_eq!(
            nifty.next_expiry(monday, 7),
            NaiveDate::from_ymd_opt(2024, 1, 25).unwrap()
        );
    }

    #[test]
    fn test_expiry_on_expiry_day() {
        let thursday = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();
        assert_eq!(IndexInstrument::Nifty.next_expiry(thursday, 0), thursday);
    }
}
