//! Short strangle selector.
//!
//! Sells one call and one put at a target absolute delta. A target of 0.5
//! puts both legs at the money (a straddle).

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    CandidateLeg, ExitRules, SelectionContext, StructureCandidate, StructureSelector,
    TrailingStopConfig,
};
use crate::data::{OptionContract, OptionQuote, OptionType, Side};
use crate::validation::resolve_greeks;
use crate::pricing::BlackScholes;

/// Short strangle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrangleConfig {
    /// Absolute delta of each short leg.
    pub target_delta: f64,
    /// Lots per leg.
    pub lots: u32,
    /// Minimum calendar days to expiry at entry.
    pub min_entry_dte: i64,
    /// Concurrent positions allowed.
    pub max_open_positions: usize,
    pub profit_target_pct: f64,
    pub stop_loss_pct: f64,
    pub max_holding_days: u32,
    pub exit_dte: i64,
    pub trailing_stop: Option<TrailingStopConfig>,
    /// Only enter in regimes that favor premium selling.
    pub regime_filter: bool,
}

impl Default for StrangleConfig {
    fn default() -> Self {
        Self {
            target_delta: 0.16,
            lots: 1,
            min_entry_dte: 5,
            max_open_positions: 1,
            profit_target_pct: 2.0, // % of margin
            stop_loss_pct: 3.0,     // % of margin
            max_holding_days: 10,
            exit_dte: 2,
            trailing_stop: None,
            regime_filter: true,
        }
    }
}

impl StrangleConfig {
    /// One lot ATM strangle, no regime filter.
    pub fn atm() -> Self {
        Self {
            target_delta: 0.5,
            regime_filter: false,
            ..Default::default()
        }
    }

    pub fn exit_rules(&self) -> ExitRules {
        ExitRules {
            profit_target_pct: self.profit_target_pct,
            stop_loss_pct: self.stop_loss_pct,
            max_holding_days: self.max_holding_days,
            exit_dte: self.exit_dte,
            trailing_stop: self.trailing_stop,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.target_delta > 0.0 && self.target_delta <= 0.5) {
            return Err(format!("target_delta {} must be in (0, 0.5]", self.target_delta));
        }
        if self.lots == 0 {
            return Err("lots must be >= 1".to_string());
        }
        if self.min_entry_dte <= self.exit_dte {
            return Err(format!(
                "min_entry_dte ({}) must exceed exit_dte ({})",
                self.min_entry_dte, self.exit_dte
            ));
        }
        self.exit_rules().validate()
    }
}

/// Short strangle / straddle selector.
#[derive(Debug, Clone)]
pub struct ShortStrangle {
    config: StrangleConfig,
    pricer: BlackScholes,
    name: String,
}

impl ShortStrangle {
    pub fn new(config: StrangleConfig, pricer: BlackScholes) -> Self {
        let name = format!("short_strangle_{:02}d", (config.target_delta * 100.0).round() as i64);
        Self {
            config,
            pricer,
            name,
        }
    }

    pub fn config(&self) -> &StrangleConfig {
        &self.config
    }

    fn leg(&self, quote: &OptionQuote) -> CandidateLeg {
        CandidateLeg {
            contract: OptionContract::new(
                quote.strike,
                quote.expiration,
                quote.option_type,
                self.config.lots,
                Side::Short,
            ),
            price: quote.mid,
            greeks: resolve_greeks(&self.pricer, quote).greeks(),
            iv: quote.iv,
        }
    }
}

impl StructureSelector for ShortStrangle {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_entry_dte(&self) -> i64 {
        self.config.min_entry_dte
    }

    fn select(&self, ctx: &SelectionContext<'_>) -> Vec<StructureCandidate> {
        if ctx.open_positions >= self.config.max_open_positions {
            return Vec::new();
        }
        if self.config.regime_filter && !ctx.regime.favors_premium_selling() {
            debug!(regime = %ctx.regime, "Regime filter blocks entry");
            return Vec::new();
        }

        let (call, put) = if self.config.target_delta >= 0.5 {
            let Some(atm) = ctx.chain.atm_strike() else {
                return Vec::new();
            };
            (
                ctx.chain.quote(atm, OptionType::Call),
                ctx.chain.quote(atm, OptionType::Put),
            )
        } else {
            (
                ctx.chain.closest_to_delta(OptionType::Call, self.config.target_delta),
                ctx.chain.closest_to_delta(OptionType::Put, self.config.target_delta),
            )
        };

        let (Some(call), Some(put)) = (call, put) else {
            return Vec::new();
        };
        if call.mid.is_zero() || put.mid.is_zero() {
            return Vec::new();
        }

        vec![StructureCandidate {
            strategy: self.name.clone(),
            legs: vec![self.leg(call), self.leg(put)],
            exit_rules: self.config.exit_rules(),
            loss_probability: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IndexInstrument;
    use crate::pricing::{ChainGeneratorConfig, SyntheticChainGenerator};
    use crate::regime::MarketRegime;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn chain() -> crate::data::OptionsChain {
        let gen = SyntheticChainGenerator::new(
            BlackScholes::default(),
            IndexInstrument::Nifty,
            ChainGeneratorConfig::default(),
        );
        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        gen.generate(dec!(22010), at, NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(), 0.14)
            .unwrap()
    }

    fn ctx(chain: &crate::data::OptionsChain, regime: MarketRegime, open: usize) -> SelectionContext<'_> {
        SelectionContext {
            timestamp: chain.quoted_at,
            regime,
            chain,
            vol: 0.14,
            open_positions: open,
        }
    }

    #[test]
    fn test_atm_strangle() {
        let chain = chain();
        let selector = ShortStrangle::new(StrangleConfig::atm(), BlackScholes::default());
        let picks = selector.select(&ctx(&chain, MarketRegime::HighVolatility, 0));

        assert_eq!(picks.len(), 1);
        let legs = &picks[0].legs;
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].contract.strike, dec!(22000));
        assert_eq!(legs[1].contract.strike, dec!(22000));
        assert!(legs.iter().all(|l| l.contract.is_short()));
        assert!(picks[0].net_premium() > Decimal::ZERO);
        assert_eq!(selector.name(), "short_strangle_50d");
    }

    #[test]
    fn test_otm_strangle_strikes() {
        let chain = chain();
        let selector = ShortStrangle::new(StrangleConfig::default(), BlackScholes::default());
        let picks = selector.select(&ctx(&chain, MarketRegime::RangeBound, 0));

        let legs = &picks[0].legs;
        let call = legs.iter().find(|l| l.contract.option_type == OptionType::Call).unwrap();
        let put = legs.iter().find(|l| l.contract.option_type == OptionType::Put).unwrap();
        assert!(call.contract.strike > dec!(22010));
        assert!(put.contract.strike < dec!(22010));
        assert!((call.greeks.delta - 0.16).abs() < 0.05);
    }

    #[test]
    fn test_filters() {
        let chain = chain();
        let selector = ShortStrangle::new(StrangleConfig::default(), BlackScholes::default());
        assert!(selector.select(&ctx(&chain, MarketRegime::Chaos, 0)).is_empty());
        assert!(selector.select(&ctx(&chain, MarketRegime::RangeBound, 1)).is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(StrangleConfig::default().validate().is_ok());
        let bad = StrangleConfig {
            min_entry_dte: 2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
