//! Seeded synthetic OHLCV generator.
//!
//! Produces a deterministic geometric random walk of daily bars on a
//! business-day calendar. The same config always yields the same series.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{f64_to_dec, Bar};

/// Parameters of the synthetic underlying series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSeriesConfig {
    /// RNG seed.
    pub seed: u64,
    /// Number of bars to generate.
    pub bars: usize,
    /// First close.
    pub start_price: f64,
    /// First session date (weekends are skipped).
    pub start_date: NaiveDate,
    /// Annualized drift.
    pub annual_drift: f64,
    /// Annualized volatility of the walk.
    pub annual_vol: f64,
}

impl Default for SyntheticSeriesConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            bars: 300,
            start_price: 22_000.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            annual_drift: 0.08,
            annual_vol: 0.14,
        }
    }
}

impl SyntheticSeriesConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bars == 0 {
            return Err("bars must be >= 1".to_string());
        }
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(format!("start_price {} must be > 0", self.start_price));
        }
        if !(self.annual_vol.is_finite() && self.annual_vol >= 0.0) {
            return Err(format!("annual_vol {} must be >= 0", self.annual_vol));
        }
        if !self.annual_drift.is_finite() {
            return Err("annual_drift must be finite".to_string());
        }
        Ok(())
    }
}

/// Generate the bar series for `config`.
pub fn generate_series(config: &SyntheticSeriesConfig) -> Vec<Bar> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let dt = 1.0 / 252.0;
    let drift = (config.annual_drift - 0.5 * config.annual_vol * config.annual_vol) * dt;
    let diffusion = config.annual_vol * dt.sqrt();
    let close_time = NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default();

    let mut bars = Vec::with_capacity(config.bars);
    let mut date = next_session(config.start_date);
    let mut prev_close = config.start_price;

    for _ in 0..config.bars {
        let shock: f64 = rng.sample(StandardNormal);
        let gap: f64 = rng.sample(StandardNormal);
        let close = prev_close * (drift + diffusion * shock).exp();
        let open = prev_close * (1.0 + 0.002 * gap);
        let range = diffusion * prev_close * rng.gen_range(0.2..1.0);
        let high = open.max(close) + range * 0.5;
        let low = (open.min(close) - range * 0.5).max(0.01);
        let volume = rng.gen_range(100_000..500_000);

        bars.push(Bar {
            timestamp: date.and_time(close_time),
            open: f64_to_dec(open),
            high: f64_to_dec(high),
            low: f64_to_dec(low),
            close: f64_to_dec(close),
            volume,
        });

        prev_close = close;
        date = next_session(date + Duration::days(1));
    }

    bars
}

/// Roll forward past weekends.
fn next_session(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Closing price of the last bar, or zero for an empty series.
pub fn last_close(bars: &[Bar]) -> Decimal {
    bars.last().map(|b| b.close).unwrap_or(Decimal::ZERO)
}
