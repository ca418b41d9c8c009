//! Black-Scholes-Merton pricing and Greeks.
//!
//! Conventions:
//! - theta is per calendar day (annual / 365)
//! - vega is per 1 vol point (annual / 100)
//! - rho is per 1 rate point (annual / 100)
//! - `ttm <= 0` prices at intrinsic with degenerate Greeks

use std::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use thiserror::Error;

use crate::data::{Greeks, OptionType};

/// Volatility floor applied before any calculation.
pub const MIN_VOLATILITY: f64 = 0.001;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Invalid market state: {field} = {value}")]
    InvalidMarketState { field: &'static str, value: f64 },
}

fn invalid(field: &'static str, value: f64) -> PricingError {
    PricingError::InvalidMarketState { field, value }
}

/// Black-Scholes calculator for options pricing and Greeks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackScholes {
    /// Risk-free interest rate
    pub rate: f64,
    /// Continuous dividend yield
    pub dividend: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self {
            rate: 0.065,
            dividend: 0.0,
        }
    }
}

impl BlackScholes {
    pub fn new(rate: f64, dividend: f64) -> Self {
        Self { rate, dividend }
    }

    /// Reject inputs that would produce a mispriced option, and apply the
    /// volatility floor.
    fn check_inputs(spot: f64, strike: f64, ttm: f64, vol: f64) -> Result<f64, PricingError> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(invalid("spot", spot));
        }
        if !strike.is_finite() || strike <= 0.0 {
            return Err(invalid("strike", strike));
        }
        if ttm.is_nan() {
            return Err(invalid("ttm", ttm));
        }
        if !vol.is_finite() || vol <= 0.0 {
            return Err(invalid("volatility", vol));
        }
        Ok(vol.max(MIN_VOLATILITY))
    }

    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator =
            (spot / strike).ln() + (self.rate - self.dividend + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    fn d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.d1(spot, strike, time, vol) - vol * time.sqrt()
    }

    /// Standard normal CDF.
    pub(crate) fn norm_cdf(x: f64) -> f64 {
        0.5 * erfc(-x / SQRT_2)
    }

    /// Standard normal PDF.
    pub(crate) fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
    }

    /// Option price.
    pub fn price(
        &self,
        spot: f64,
        strike: f64,
        ttm: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> Result<f64, PricingError> {
        let vol = Self::check_inputs(spot, strike, ttm, vol)?;

        if ttm <= 0.0 {
            return Ok(intrinsic(spot, strike, opt_type));
        }

        let d1 = self.d1(spot, strike, ttm, vol);
        let d2 = self.d2(spot, strike, ttm, vol);
        let df_q = (-self.dividend * ttm).exp();
        let df_r = (-self.rate * ttm).exp();

        let price = match opt_type {
            OptionType::Call => {
                spot * df_q * Self::norm_cdf(d1) - strike * df_r * Self::norm_cdf(d2)
            }
            OptionType::Put => {
                strike * df_r * Self::norm_cdf(-d2) - spot * df_q * Self::norm_cdf(-d1)
            }
        };

        Ok(price.max(0.0))
    }

    /// Full set of Greeks.
    pub fn greeks(
        &self,
        spot: f64,
        strike: f64,
        ttm: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> Result<Greeks, PricingError> {
        let vol = Self::check_inputs(spot, strike, ttm, vol)?;

        if ttm <= 0.0 {
            let delta = match opt_type {
                OptionType::Call if spot > strike => 1.0,
                OptionType::Put if spot < strike => -1.0,
                _ => 0.0,
            };
            return Ok(Greeks {
                delta,
                ..Default::default()
            });
        }

        let sqrt_t = ttm.sqrt();
        let d1 = self.d1(spot, strike, ttm, vol);
        let d2 = d1 - vol * sqrt_t;
        let df_q = (-self.dividend * ttm).exp();
        let df_r = (-self.rate * ttm).exp();
        let pdf_d1 = Self::norm_pdf(d1);

        let gamma = df_q * pdf_d1 / (spot * vol * sqrt_t);
        let vega = spot * df_q * pdf_d1 * sqrt_t / 100.0;
        let decay = -spot * df_q * pdf_d1 * vol / (2.0 * sqrt_t);

        let (delta, theta, rho) = match opt_type {
            OptionType::Call => {
                let delta = df_q * Self::norm_cdf(d1);
                let theta = decay + self.dividend * spot * df_q * Self::norm_cdf(d1)
                    - self.rate * strike * df_r * Self::norm_cdf(d2);
                let rho = strike * ttm * df_r * Self::norm_cdf(d2);
                (delta, theta, rho)
            }
            OptionType::Put => {
                let delta = df_q * (Self::norm_cdf(d1) - 1.0);
                let theta = decay - self.dividend * spot * df_q * Self::norm_cdf(-d1)
                    + self.rate * strike * df_r * Self::norm_cdf(-d2);
                let rho = -strike * ttm * df_r * Self::norm_cdf(-d2);
                (delta, theta, rho)
            }
        };

        Ok(Greeks {
            delta,
            gamma,
            theta: theta / 365.0,
            vega,
            rho: rho / 100.0,
        })
    }

    /// Delta only; the chain generator's search calls this in a tight loop.
    pub fn delta(
        &self,
        spot: f64,
        strike: f64,
        ttm: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> Result<f64, PricingError> {
        let vol = Self::check_inputs(spot, strike, ttm, vol)?;
        if ttm <= 0.0 {
            return Ok(match opt_type {
                OptionType::Call if spot > strike => 1.0,
                OptionType::Put if spot < strike => -1.0,
                _ => 0.0,
            });
        }
        let d1 = self.d1(spot, strike, ttm, vol);
        let df_q = (-self.dividend * ttm).exp();
        Ok(match opt_type {
            OptionType::Call => df_q * Self::norm_cdf(d1),
            OptionType::Put => df_q * (Self::norm_cdf(d1) - 1.0),
        })
    }

    /// Implied volatility from an option price using Newton-Raphson.
    pub fn implied_vol(
        &self,
        spot: f64,
        strike: f64,
        ttm: f64,
        price: f64,
        opt_type: OptionType,
    ) -> Option<f64> {
        if ttm <= 0.0 || price <= 0.0 || spot <= 0.0 || strike <= 0.0 {
            return None;
        }

        // Brenner-Subrahmanyam initial guess
        let mut vol = (price / spot) * (2.0 * PI / ttm).sqrt();
        vol = vol.clamp(0.01, 5.0);

        let max_iter = 100;
        let tolerance = 1e-6;

        for _ in 0..max_iter {
            let calc_price = self.price(spot, strike, ttm, vol, opt_type).ok()?;
            let diff = calc_price - price;

            if diff.abs() < tolerance {
                return Some(vol);
            }

            // Unscaled vega
            let raw_vega = spot
                * (-self.dividend * ttm).exp()
                * Self::norm_pdf(self.d1(spot, strike, ttm, vol))
                * ttm.sqrt();

            if raw_vega.abs() < 1e-10 {
                break;
            }

            vol -= diff / raw_vega;
            vol = vol.clamp(MIN_VOLATILITY, 10.0);
        }

        None
    }
}

/// Payoff at expiry.
pub fn intrinsic(spot: f64, strike: f64, opt_type: OptionType) -> f64 {
    match opt_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_black_scholes_call_price() {
        let bs = BlackScholes::new(0.05, 0.0);
        // Textbook value for S=100, K=100, T=1, vol=0.20, r=5%
        let price = bs.price(100.0, 100.0, 1.0, 0.20, OptionType::Call).unwrap();
        assert_relative_eq!(price, 10.4506, epsilon = 1e-3);
    }

    #[test]
    fn test_put_call_parity() {
        let bs = BlackScholes::new(0.065, 0.0);
        let cases = [
            (22_000.0, 22_000.0, 7.0 / 365.0, 0.12),
            (22_000.0, 21_000.0, 30.0 / 365.0, 0.18),
            (48_000.0, 50_000.0, 0.5, 0.25),
            (100.0, 60.0, 2.0, 0.9),
            (100.0, 150.0, 0.01, 0.05),
        ];

        for (spot, strike, time, vol) in cases {
            let call = bs.price(spot, strike, time, vol, OptionType::Call).unwrap();
            let put = bs.price(spot, strike, time, vol, OptionType::Put).unwrap();
            let parity_rhs = spot - strike * (-bs.rate * time).exp();
            let tolerance = 1e-6 * spot.max(strike);
            assert!(
                (call - put - parity_rhs).abs() <= tolerance,
                "parity violated for S={} K={} T={} vol={}",
                spot,
                strike,
                time,
                vol
            );
        }
    }

    #[test]
    fn test_expiry_returns_intrinsic_and_degenerate_greeks() {
        let bs = BlackScholes::default();

        let call_itm = bs.greeks(110.0, 100.0, 0.0, 0.2, OptionType::Call).unwrap();
        assert_eq!(call_itm.delta, 1.0);
        assert_eq!(call_itm.gamma, 0.0);
        assert_eq!(call_itm.theta, 0.0);
        assert_eq!(call_itm.vega, 0.0);

        let call_otm = bs.greeks(90.0, 100.0, -1.0, 0.2, OptionType::Call).unwrap();
        assert_eq!(call_otm.delta, 0.0);

        let put_itm = bs.greeks(90.0, 100.0, 0.0, 0.2, OptionType::Put).unwrap();
        assert_eq!(put_itm.delta, -1.0);

        let put_otm = bs.greeks(110.0, 100.0, 0.0, 0.2, OptionType::Put).unwrap();
        assert_eq!(put_otm.delta, 0.0);

        assert_eq!(bs.price(110.0, 100.0, 0.0, 0.2, OptionType::Call).unwrap(), 10.0);
        assert_eq!(bs.price(110.0, 100.0, 0.0, 0.2, OptionType::Put).unwrap(), 0.0);
    }

    #[test]
    fn test_greeks_converge_near_expiry() {
        let bs = BlackScholes::default();
        let ttm = 1e-8;

        let call = bs.greeks(110.0, 100.0, ttm, 0.2, OptionType::Call).unwrap();
        assert_relative_eq!(call.delta, 1.0, epsilon = 1e-6);
        assert!(call.gamma.abs() < 1e-6);
        assert!(call.vega.abs() < 1e-6);

        let put = bs.greeks(90.0, 100.0, ttm, 0.2, OptionType::Put).unwrap();
        assert_relative_eq!(put.delta, -1.0, epsilon = 1e-6);

        let otm_call = bs.greeks(90.0, 100.0, ttm, 0.2, OptionType::Call).unwrap();
        assert!(otm_call.delta.abs() < 1e-6);
        assert!(otm_call.theta.abs() < 1e-6);
    }

    #[test]
    fn test_invalid_inputs_fail_fast() {
        let bs = BlackScholes::default();
        assert!(matches!(
            bs.price(0.0, 100.0, 0.5, 0.2, OptionType::Call),
            Err(PricingError::InvalidMarketState { field: "spot", .. })
        ));
        assert!(matches!(
            bs.price(100.0, 100.0, 0.5, 0.0, OptionType::Call),
            Err(PricingError::InvalidMarketState { field: "volatility", .. })
        ));
        assert!(bs.greeks(100.0, -5.0, 0.5, 0.2, OptionType::Put).is_err());
        assert!(bs.price(100.0, 100.0, f64::NAN, 0.2, OptionType::Put).is_err());
    }

    #[test]
    fn test_volatility_floor() {
        let bs = BlackScholes::default();
        let tiny = bs.price(100.0, 100.0, 0.5, 1e-9, OptionType::Call).unwrap();
        let floor = bs.price(100.0, 100.0, 0.5, MIN_VOLATILITY, OptionType::Call).unwrap();
        assert_eq!(tiny, floor);
    }

    #[test]
    fn test_greek_units() {
        let bs = BlackScholes::new(0.0, 0.0);
        let g = bs.greeks(100.0, 100.0, 1.0, 0.2, OptionType::Call).unwrap();

        // Finite-difference vega over one vol point
        let up = bs.price(100.0, 100.0, 1.0, 0.21, OptionType::Call).unwrap();
        let down = bs.price(100.0, 100.0, 1.0, 0.19, OptionType::Call).unwrap();
        assert_relative_eq!(g.vega, (up - down) / 2.0, epsilon = 1e-3);

        // Finite-difference theta over one calendar day
        let later = bs
            .price(100.0, 100.0, 1.0 - 1.0 / 365.0, 0.2, OptionType::Call)
            .unwrap();
        let now = bs.price(100.0, 100.0, 1.0, 0.2, OptionType::Call).unwrap();
        assert_relative_eq!(g.theta, later - now, epsilon = 1e-3);
        assert!(g.gamma > 0.0);
    }

    #[test]
    fn test_implied_vol_round_trip() {
        let bs = BlackScholes::new(0.05, 0.0);
        let vol = 0.25;
        let price = bs.price(100.0, 100.0, 0.5, vol, OptionType::Call).unwrap();

        let iv = bs
            .implied_vol(100.0, 100.0, 0.5, price, OptionType::Call)
            .unwrap();
        assert_relative_eq!(iv, vol, epsilon = 0.001);
    }
}
