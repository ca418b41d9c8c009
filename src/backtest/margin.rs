//! SPAN-like margin for option structures.
//!
//! Margin = worst scenario loss (price scan x vol scan, revalued with
//! Black-Scholes) + exposure margin on short notional + premium of short
//! legs. Structures with both long and short legs get a hedge benefit on the
//! scenario component.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::data::{dec_to_f64, f64_to_dec, OptionContract};
use crate::pricing::{BlackScholes, PricingError};

/// Market inputs shared by every leg of a structure.
#[derive(Debug, Clone, Copy)]
pub struct MarginContext {
    pub spot: f64,
    pub vol: f64,
    /// Years to expiry.
    pub ttm: f64,
    pub lot_size: u32,
}

/// Required margin for a structure; entries are blocked when free capital
/// does not cover it.
pub trait MarginCalculator {
    /// `legs` pairs each contract with its per-unit entry premium.
    fn required_margin(
        &self,
        legs: &[(OptionContract, Decimal)],
        ctx: &MarginContext,
    ) -> Result<MarginBreakdown, PricingError>;
}

/// Margin components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginBreakdown {
    pub span: Decimal,
    pub exposure: Decimal,
    pub premium: Decimal,
    pub total: Decimal,
}

/// SPAN-like margin parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanMargin {
    /// Price scan range as a fraction of spot.
    pub price_scan: f64,
    /// Relative volatility scan (0.25 = vol moves by 25% of itself).
    pub vol_scan: f64,
    /// Exposure margin as a fraction of short notional.
    pub exposure_rate: Decimal,
    /// Reduction of the scan component for hedged structures.
    pub hedge_benefit: Decimal,
    pub pricer: BlackScholes,
}

impl Default for SpanMargin {
    fn default() -> Self {
        Self {
            price_scan: 0.035,         // 3.5% price move
            vol_scan: 0.25,            // 25% vol move
            exposure_rate: dec!(0.03), // 3% of notional
            hedge_benefit: dec!(0.30),
            pricer: BlackScholes::default(),
        }
    }
}

impl SpanMargin {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.price_scan > 0.0 && self.price_scan < 1.0) {
            return Err(format!("price_scan {} must be in (0, 1)", self.price_scan));
        }
        if !(self.vol_scan >= 0.0 && self.vol_scan < 1.0) {
            return Err(format!("vol_scan {} must be in [0, 1)", self.vol_scan));
        }
        if self.exposure_rate < Decimal::ZERO {
            return Err("exposure_rate must be >= 0".to_string());
        }
        if self.hedge_benefit < Decimal::ZERO || self.hedge_benefit >= Decimal::ONE {
            return Err(format!("hedge_benefit {} must be in [0, 1)", self.hedge_benefit));
        }
        Ok(())
    }

    /// Portfolio P&L of the structure under one scenario.
    fn scenario_pnl(
        &self,
        legs: &[(OptionContract, Decimal)],
        ctx: &MarginContext,
        spot: f64,
        vol: f64,
    ) -> Result<f64, PricingError> {
        let mut pnl = 0.0;
        for (contract, premium) in legs {
            let value = self.pricer.price(
                spot,
                dec_to_f64(contract.strike),
                ctx.ttm,
                vol,
                contract.option_type,
            )?;
            let units = contract.signed_units(ctx.lot_size) as f64;
            pnl += (value - dec_to_f64(*premium)) * units;
        }
        Ok(pnl)
    }
}

impl MarginCalculator for SpanMargin {
    fn required_margin(
        &self,
        legs: &[(OptionContract, Decimal)],
        ctx: &MarginContext,
    ) -> Result<MarginBreakdown, PricingError> {
        let mut worst_loss: f64 = 0.0;
        for price_move in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            for vol_move in [-1.0, 1.0] {
                let spot = ctx.spot * (1.0 + price_move * self.price_scan);
                let vol = ctx.vol * (1.0 + vol_move * self.vol_scan);
                let pnl = self.scenario_pnl(legs, ctx, spot, vol)?;
                worst_loss = worst_loss.max(-pnl);
            }
        }

        let has_long = legs.iter().any(|(c, _)| !c.is_short());
        let has_short = legs.iter().any(|(c, _)| c.is_short());

        let mut span = f64_to_dec(worst_loss);
        if has_long && has_short {
            span = (span * (Decimal::ONE - self.hedge_benefit)).round_dp(2);
        }

        let spot = f64_to_dec(ctx.spot);
        let mut short_notional = Decimal::ZERO;
        let mut premium = Decimal::ZERO;
        for (contract, price) in legs.iter().filter(|(c, _)| c.is_short()) {
            let units = Decimal::from(contract.signed_units(ctx.lot_size).abs());
            short_notional += spot * units;
            premium += *price * units;
        }
        let exposure = (short_notional * self.exposure_rate).round_dp(2);
        let premium = premium.round_dp(2);

        Ok(MarginBreakdown {
            span,
            exposure,
            premium,
            total: span + exposure + premium,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OptionType, Side};
    use chrono::NaiveDate;

    fn leg(strike: Decimal, option_type: OptionType, side: Side) -> OptionContract {
        let expiry = NaiveDate::from_ymd_opt(2024, 1, 25).unwrap();
        OptionContract::new(strike, expiry, option_type, 1, side)
    }

    fn ctx() -> MarginContext {
        MarginContext {
            spot: 22_000.0,
            vol: 0.14,
            ttm: 7.0 / 365.0,
            lot_size: 50,
        }
    }

    #[test]
    fn test_short_strangle_margin() {
        let span = SpanMargin::default();
        let legs = vec![
            (leg(dec!(22300), OptionType::Call, Side::Short), dec!(80)),
            (leg(dec!(21700), OptionType::Put, Side::Short), dec!(70)),
        ];
        let margin = span.required_margin(&legs, &ctx()).unwrap();

        // 3% of 2 x 22000 x 50
        assert_eq!(margin.exposure, dec!(66000));
        assert_eq!(margin.premium, dec!(7500));
        assert!(margin.span > Decimal::ZERO);
        assert_eq!(margin.total, margin.span + margin.exposure + margin.premium);
    }

    #[test]
    fn test_hedged_structure_cheaper() {
        let span = SpanMargin::default();
        let naked = vec![(leg(dec!(21700), OptionType::Put, Side::Short), dec!(70))];
        let spread = vec![
            (leg(dec!(21700), OptionType::Put, Side::Short), dec!(70)),
            (leg(dec!(21500), OptionType::Put, Side::Long), dec!(35)),
        ];
        let naked = span.required_margin(&naked, &ctx()).unwrap();
        let spread = span.required_margin(&spread, &ctx()).unwrap();
        assert!(spread.span < naked.span);
        assert_eq!(spread.exposure, naked.exposure);
    }

    #[test]
    fn test_long_only_has_no_exposure() {
        let span = SpanMargin::default();
        let legs = vec![(leg(dec!(22000), OptionType::Call, Side::Long), dec!(150))];
        let margin = span.required_margin(&legs, &ctx()).unwrap();
        assert_eq!(margin.exposure, Decimal::ZERO);
        assert_eq!(margin.premium, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_context() {
        let span = SpanMargin::default();
        let legs = vec![(leg(dec!(22000), OptionType::Call, Side::Short), dec!(150))];
        let bad = MarginContext { vol: 0.0, ..ctx() };
        assert!(span.required_margin(&legs, &bad).is_err());
    }
}
