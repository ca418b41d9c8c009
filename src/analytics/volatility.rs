//! Volatility estimation from the underlying's closes.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Produces an annualized volatility estimate (decimal, e.g. 0.14) from a
/// close history ending at the current bar.
pub trait VolatilityEstimator {
    fn estimate(&self, closes: &[f64]) -> Option<f64>;

    /// Bars of history needed before `estimate` can return a value.
    fn required_history(&self) -> usize;
}

/// Close-to-close realized volatility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealizedVolatility {
    /// Number of log returns in the window.
    pub window: usize,
    /// Periods per year.
    pub periods_per_year: f64,
}

impl Default for RealizedVolatility {
    fn default() -> Self {
        Self {
            window: 20,
            periods_per_year: 252.0,
        }
    }
}

impl RealizedVolatility {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.window < 2 {
            return Err(format!("window {} must be >= 2", self.window));
        }
        if !(self.periods_per_year > 0.0) {
            return Err("periods_per_year must be > 0".to_string());
        }
        Ok(())
    }
}

impl VolatilityEstimator for RealizedVolatility {
    fn estimate(&self, closes: &[f64]) -> Option<f64> {
        if self.window < 2 || closes.len() < self.window + 1 {
            return None;
        }

        let tail = &closes[closes.len() - self.window - 1..];
        if tail.iter().any(|c| !(c.is_finite() && *c > 0.0)) {
            return None;
        }

        let returns: Vec<f64> = tail.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let sd = returns.iter().std_dev();
        if !sd.is_finite() {
            return None;
        }

        Some(sd * self.periods_per_year.sqrt())
    }

    fn required_history(&self) -> usize {
        self.window + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_insufficient_history() {
        let rv = RealizedVolatility::default();
        assert_eq!(rv.estimate(&[100.0; 20]), None);
        assert_eq!(rv.required_history(), 21);
    }

    #[test]
    fn test_flat_series_has_zero_vol() {
        let rv = RealizedVolatility::default();
        assert_eq!(rv.estimate(&[100.0; 30]), Some(0.0));
    }

    #[test]
    fn test_alternating_returns() {
        // Log returns alternate +r, -r: sample stdev = r * sqrt(n / (n - 1))
        let r: f64 = 0.01;
        let mut closes = vec![100.0];
        for i in 0..4 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last * r.exp() } else { last / r.exp() });
        }
        let rv = RealizedVolatility {
            window: 4,
            periods_per_year: 252.0,
        };
        let expected = r * (4.0_f64 / 3.0).sqrt() * 252.0_f64.sqrt();
        assert_relative_eq!(rv.estimate(&closes).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_bad_closes() {
        let rv = RealizedVolatility::new(3);
        assert_eq!(rv.estimate(&[100.0, 0.0, 101.0, 102.0]), None);
    }
}
