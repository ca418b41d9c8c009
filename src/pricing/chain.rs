//! Synthetic option-chain generator.
//!
//! Builds a chain for one expiry from spot, an IV estimate and a set of
//! target deltas. Strikes are found by bisection on delta in log-strike
//! space and snapped to the instrument's strike increment.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::black_scholes::{BlackScholes, PricingError};
use crate::data::{dec_to_f64, f64_to_dec, IndexInstrument, OptionQuote, OptionType, OptionsChain};

/// Maximum bisection steps in the strike search.
pub const MAX_SEARCH_ITERATIONS: u32 = 50;

/// Delta tolerance for early exit.
pub const DELTA_TOLERANCE: f64 = 0.001;

/// Chain generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainGeneratorConfig {
    /// Strikes generated on each side of ATM.
    pub strikes_each_side: u32,
    /// Absolute target deltas searched on both calls and puts.
    pub target_deltas: Vec<f64>,
    /// Base bid-ask spread as a fraction of theoretical price.
    pub base_spread_pct: f64,
    /// Extra spread per unit of |K/S - 1|.
    pub spread_widening: f64,
}

impl Default for ChainGeneratorConfig {
    fn default() -> Self {
        Self {
            strikes_each_side: 10,
            target_deltas: vec![0.10, 0.16, 0.25, 0.35, 0.50],
            base_spread_pct: 0.01,   // 1%
            spread_widening: 0.5,
        }
    }
}

impl ChainGeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(bad) = self
            .target_deltas
            .iter()
            .find(|d| !(d.is_finite() && **d > 0.0 && **d < 1.0))
        {
            return Err(format!("target delta {} outside (0, 1)", bad));
        }
        if !(self.base_spread_pct >= 0.0 && self.base_spread_pct.is_finite()) {
            return Err(format!("base_spread_pct {} must be >= 0", self.base_spread_pct));
        }
        if !(self.spread_widening >= 0.0 && self.spread_widening.is_finite()) {
            return Err(format!("spread_widening {} must be >= 0", self.spread_widening));
        }
        Ok(())
    }
}

/// Outcome of a delta-targeted strike search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeSearch {
    /// Continuous strike where the search stopped.
    pub raw_strike: f64,
    /// Raw strike snapped to the strike increment.
    pub strike: Decimal,
    /// Signed delta at `raw_strike`.
    pub delta: f64,
    pub iterations: u32,
}

/// Generates synthetic chains for one instrument.
#[derive(Debug, Clone)]
pub struct SyntheticChainGenerator {
    pricer: BlackScholes,
    instrument: IndexInstrument,
    config: ChainGeneratorConfig,
}

impl SyntheticChainGenerator {
    pub fn new(pricer: BlackScholes, instrument: IndexInstrument, config: ChainGeneratorConfig) -> Self {
        Self {
            pricer,
            instrument,
            config,
        }
    }

    pub fn instrument(&self) -> IndexInstrument {
        self.instrument
    }

    pub fn pricer(&self) -> &BlackScholes {
        &self.pricer
    }

    pub fn config(&self) -> &ChainGeneratorConfig {
        &self.config
    }

    /// Find the strike whose delta matches `target_delta`.
    ///
    /// `target_delta` is absolute for both types; puts are searched as
    /// `-target_delta`.
    pub fn strike_for_delta(
        &self,
        spot: f64,
        ttm: f64,
        vol: f64,
        target_delta: f64,
        option_type: OptionType,
    ) -> Result<StrikeSearch, PricingError> {
        check_positive("spot", spot)?;
        check_positive("volatility", vol)?;
        check_positive("ttm", ttm)?;
        if !(target_delta > 0.0 && target_delta < 1.0) {
            return Err(PricingError::InvalidMarketState {
                field: "target_delta",
                value: target_delta,
            });
        }

        let target = match option_type {
            OptionType::Call => target_delta,
            OptionType::Put => -target_delta,
        };

        // Delta falls monotonically as strike rises, for both calls and puts.
        let width = 8.0 * vol * ttm.sqrt();
        let mut lo = spot.ln() - width;
        let mut hi = spot.ln() + width;
        let mut mid = 0.5 * (lo + hi);
        let mut delta = self.pricer.delta(spot, mid.exp(), ttm, vol, option_type)?;
        let mut iterations = 1;

        while (delta - target).abs() > DELTA_TOLERANCE && iterations < MAX_SEARCH_ITERATIONS {
            if delta > target {
                lo = mid;
            } else {
                hi = mid;
            }
            mid = 0.5 * (lo + hi);
            delta = self.pricer.delta(spot, mid.exp(), ttm, vol, option_type)?;
            iterations += 1;
        }

        let raw_strike = mid.exp();
        Ok(StrikeSearch {
            raw_strike,
            strike: self.round_strike(raw_strike),
            delta,
            iterations,
        })
    }

    /// Snap a continuous strike to the nearest listed increment.
    pub fn round_strike(&self, strike: f64) -> Decimal {
        let step = self.instrument.strike_increment();
        let steps = (f64_to_dec(strike) / step).round();
        (steps * step).max(step)
    }

    /// Build a chain for `expiry` as seen at `valued_at`.
    pub fn generate(
        &self,
        spot: Decimal,
        valued_at: NaiveDateTime,
        expiry: NaiveDate,
        vol: f64,
    ) -> Result<OptionsChain, PricingError> {
        let spot_f = dec_to_f64(spot);
        check_positive("spot", spot_f)?;
        check_positive("volatility", vol)?;

        let ttm = time_to_expiry(valued_at, expiry);
        if ttm <= 0.0 {
            return Err(PricingError::InvalidMarketState {
                field: "ttm",
                value: ttm,
            });
        }

        let step = self.instrument.strike_increment();
        let atm = self.round_strike(spot_f);

        let mut strikes = BTreeSet::new();
        strikes.insert(atm);
        for i in 1..=self.config.strikes_each_side {
            let offset = step * Decimal::from(i);
            strikes.insert(atm + offset);
            if atm - offset > Decimal::ZERO {
                strikes.insert(atm - offset);
            }
        }
        for &target in &self.config.target_deltas {
            for option_type in [OptionType::Call, OptionType::Put] {
                let found = self.strike_for_delta(spot_f, ttm, vol, target, option_type)?;
                strikes.insert(found.strike);
            }
        }

        let dte = (expiry - valued_at.date()).num_days() as i32;
        let mut chain = OptionsChain::new(self.instrument.symbol(), valued_at, spot, expiry, dte);

        for strike in strikes {
            for option_type in [OptionType::Call, OptionType::Put] {
                let quote = self.quote(spot, strike, valued_at, expiry, ttm, vol, option_type)?;
                chain.add_quote(quote);
            }
        }

        chain.sort();
        Ok(chain)
    }

    /// Quote a single contract. Past expiry the quote collapses to intrinsic
    /// value, so open positions can still be marked.
    pub fn quote_contract(
        &self,
        spot: Decimal,
        strike: Decimal,
        option_type: OptionType,
        expiry: NaiveDate,
        valued_at: NaiveDateTime,
        vol: f64,
    ) -> Result<OptionQuote, PricingError> {
        check_positive("spot", dec_to_f64(spot))?;
        check_positive("volatility", vol)?;
        let ttm = time_to_expiry(valued_at, expiry).max(0.0);
        self.quote(spot, strike, valued_at, expiry, ttm, vol, option_type)
    }

    #[allow(clippy::too_many_arguments)]
    fn quote(
        &self,
        spot: Decimal,
        strike: Decimal,
        valued_at: NaiveDateTime,
        expiry: NaiveDate,
        ttm: f64,
        vol: f64,
        option_type: OptionType,
    ) -> Result<OptionQuote, PricingError> {
        let spot_f = dec_to_f64(spot);
        let strike_f = dec_to_f64(strike);
        let theo = self.pricer.price(spot_f, strike_f, ttm, vol, option_type)?;
        let greeks = self.pricer.greeks(spot_f, strike_f, ttm, vol, option_type)?;
        let moneyness = strike_f / spot_f;

        let theoretical_price = f64_to_dec(theo);
        let spread = self.spread(theo, moneyness);
        let bid = round_down_to_tick(theoretical_price - spread / dec!(2), self.instrument.tick_size())
            .max(Decimal::ZERO);
        let ask = bid + spread;
        let mid = (bid + ask) / dec!(2);

        Ok(OptionQuote {
            underlying: self.instrument.symbol().to_string(),
            quoted_at: valued_at,
            expiration: expiry,
            dte: (expiry - valued_at.date()).num_days() as i32,
            strike,
            option_type,
            spot,
            theoretical_price,
            bid,
            ask,
            mid,
            iv: vol,
            greeks: Some(greeks),
            moneyness,
        })
    }

    /// Quoted width, never below one tick.
    pub fn spread(&self, theo: f64, moneyness: f64) -> Decimal {
        let tick = self.instrument.tick_size();
        let pct = self.config.base_spread_pct + self.config.spread_widening * (moneyness - 1.0).abs();
        let raw = f64_to_dec(theo.max(0.0) * pct);
        round_up_to_tick(raw, tick).max(tick)
    }
}

/// Year fraction from `valued_at` to the 15:30 close on `expiry`.
pub fn time_to_expiry(valued_at: NaiveDateTime, expiry: NaiveDate) -> f64 {
    let close = NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default();
    let seconds = (expiry.and_time(close) - valued_at).num_seconds() as f64;
    seconds / (365.0 * 86_400.0)
}

fn check_positive(field: &'static str, value: f64) -> Result<(), PricingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PricingError::InvalidMarketState { field, value })
    }
}

fn round_up_to_tick(value: Decimal, tick: Decimal) -> Decimal {
    (value / tick).ceil() * tick
}

fn round_down_to_tick(value: Decimal, tick: Decimal) -> Decimal {
    (value / tick).floor() * tick
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> SyntheticChainGenerator {
        SyntheticChainGenerator::new(
            BlackScholes::default(),
            IndexInstrument::Nifty,
            ChainGeneratorConfig::default(),
        )
    }

    fn valued_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_delta_targeting_accuracy() {
        let gen = generator();
        let ttm = 7.0 / 365.0;

        for i in 1..100 {
            let target = i as f64 / 100.0;
            for option_type in [OptionType::Call, OptionType::Put] {
                let found = gen
                    .strike_for_delta(22_000.0, ttm, 0.14, target, option_type)
                    .unwrap();
                assert!(
                    (found.delta.abs() - target).abs() <= 0.01,
                    "target {} {:?} got {}",
                    target,
                    option_type,
                    found.delta
                );
                assert!(found.iterations <= MAX_SEARCH_ITERATIONS);
                assert_eq!(found.strike % dec!(50), Decimal::ZERO);

                // The listed strike is at most half an increment away, so its
                // delta sits between the deltas 25 points either side of the raw strike.
                let listed = dec_to_f64(found.strike);
                assert!((listed - found.raw_strike).abs() <= 25.0 + 1e-9);
                let pricer = gen.pricer();
                let listed_delta = pricer.delta(22_000.0, listed, ttm, 0.14, option_type).unwrap();
                let below = pricer
                    .delta(22_000.0, found.raw_strike - 25.0, ttm, 0.14, option_type)
                    .unwrap();
                let above = pricer
                    .delta(22_000.0, found.raw_strike + 25.0, ttm, 0.14, option_type)
                    .unwrap();
                assert!(
                    listed_delta <= below + 1e-12 && listed_delta >= above - 1e-12,
                    "target {} {:?}: listed {} delta {} outside [{}, {}]",
                    target,
                    option_type,
                    found.strike,
                    listed_delta,
                    above,
                    below
                );
                assert!((listed_delta.abs() - target).abs() <= 0.01 + (below - above));
            }
        }
    }

    #[test]
    fn test_put_strikes_below_call_strikes() {
        let gen = generator();
        let ttm = 14.0 / 365.0;
        let call = gen
            .strike_for_delta(22_000.0, ttm, 0.15, 0.16, OptionType::Call)
            .unwrap();
        let put = gen
            .strike_for_delta(22_000.0, ttm, 0.15, 0.16, OptionType::Put)
            .unwrap();
        assert!(put.strike < dec!(22000));
        assert!(call.strike > dec!(22000));
        assert!(put.delta < 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        let gen = generator();
        assert!(gen
            .strike_for_delta(0.0, 0.1, 0.15, 0.25, OptionType::Call)
            .is_err());
        assert!(gen
            .strike_for_delta(22_000.0, 0.1, -0.15, 0.25, OptionType::Call)
            .is_err());

        // Expiry before the valuation time
        let expired = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert!(gen.generate(dec!(22000), valued_at(), expired, 0.15).is_err());

        let expiry = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();
        assert!(gen.generate(dec!(22000), valued_at(), expiry, 0.0).is_err());
        assert!(gen.generate(dec!(0), valued_at(), expiry, 0.15).is_err());
    }

    #[test]
    fn test_generate_chain() {
        let gen = generator();
        let expiry = NaiveDate::from_ymd_opt(2024, 1, 25).unwrap();
        let chain = gen.generate(dec!(22013.40), valued_at(), expiry, 0.14).unwrap();

        assert_eq!(chain.dte, 10);
        assert_eq!(chain.calls.len(), chain.puts.len());
        assert!(chain.calls.len() >= 21);
        assert_eq!(chain.atm_strike(), Some(dec!(22000)));

        for q in chain.calls.iter().chain(chain.puts.iter()) {
            assert!(q.bid >= Decimal::ZERO);
            assert!(q.ask > q.bid);
            assert!(q.mid > q.bid && q.mid < q.ask);
            assert!(q.greeks.is_some());
            assert_eq!(q.iv, 0.14);
        }

        for w in chain.calls.windows(2) {
            assert!(w[0].strike < w[1].strike);
            assert!(w[0].delta() > w[1].delta());
        }
    }

    #[test]
    fn test_quote_contract_past_expiry() {
        let gen = generator();
        let expired = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        let quote = gen
            .quote_contract(dec!(22100), dec!(22000), OptionType::Call, expired, valued_at(), 0.14)
            .unwrap();
        assert_eq!(quote.theoretical_price, dec!(100));
        assert!(quote.mid >= dec!(99) && quote.mid <= dec!(101));
        assert_eq!(quote.greeks.map(|g| g.delta), Some(1.0));
    }

    #[test]
    fn test_spread_floor_and_widening() {
        let gen = generator();
        let tick = dec!(0.05);

        // Worthless option still quotes one tick wide
        assert_eq!(gen.spread(0.0, 1.3), tick);

        let atm = gen.spread(200.0, 1.0);
        let otm = gen.spread(200.0, 1.05);
        assert_eq!(atm, dec!(2.00));
        assert!(otm > atm);
        assert_eq!(otm % tick, Decimal::ZERO);
    }

    #[test]
    fn test_time_to_expiry() {
        let expiry = NaiveDate::from_ymd_opt(2024, 1, 22).unwrap();
        let ttm = time_to_expiry(valued_at(), expiry);
        assert!((ttm - 7.0 / 365.0).abs() < 1e-12);
    }
}
