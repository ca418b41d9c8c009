//! Option structure selection.
//!
//! A `StructureSelector` looks at the current regime and option chain and
//! proposes zero or more leg sets, each with the exit rules the engine
//! should apply once the position is open.

pub mod strangle;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::{Greeks, OptionContract, OptionsChain};
use crate::regime::MarketRegime;

pub use strangle::{ShortStrangle, StrangleConfig};

/// Trailing stop parameters, as percent of blocked margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    /// Profit at which the trail arms.
    pub activation_pct: f64,
    /// Giveback from the peak that triggers the exit.
    pub trail_pct: f64,
}

/// Exit rules attached to a position at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    /// Profit target as percent of blocked margin.
    pub profit_target_pct: f64,
    /// Stop loss as percent of blocked margin.
    pub stop_loss_pct: f64,
    /// Maximum trading days held.
    pub max_holding_days: u32,
    /// Exit when days to expiry falls to this value.
    pub exit_dte: i64,
    pub trailing_stop: Option<TrailingStopConfig>,
}

impl ExitRules {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.profit_target_pct > 0.0) {
            return Err(format!("profit_target_pct {} must be > 0", self.profit_target_pct));
        }
        if !(self.stop_loss_pct > 0.0) {
            return Err(format!("stop_loss_pct {} must be > 0", self.stop_loss_pct));
        }
        if self.max_holding_days == 0 {
            return Err("max_holding_days must be >= 1".to_string());
        }
        if let Some(trail) = &self.trailing_stop {
            if !(trail.activation_pct > 0.0 && trail.trail_pct > 0.0) {
                return Err("trailing stop percentages must be > 0".to_string());
            }
        }
        Ok(())
    }
}

/// One leg of a proposed structure, priced off the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLeg {
    pub contract: OptionContract,
    /// Per-unit entry price (mid).
    pub price: Decimal,
    pub greeks: Greeks,
    pub iv: f64,
}

/// A structure the selector would like to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureCandidate {
    pub strategy: String,
    pub legs: Vec<CandidateLeg>,
    pub exit_rules: ExitRules,
    /// Model probability that the trade loses, when the selector has one.
    #[serde(default)]
    pub loss_probability: Option<f64>,
}

impl StructureCandidate {
    /// Premium received (positive) or paid (negative) per lot multiple.
    pub fn net_premium(&self) -> Decimal {
        self.legs
            .iter()
            .map(|l| l.price * Decimal::from(-l.contract.side.sign() * l.contract.quantity as i64))
            .sum()
    }
}

/// What a selector sees on each bar.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub timestamp: NaiveDateTime,
    pub regime: MarketRegime,
    pub chain: &'a OptionsChain,
    pub vol: f64,
    pub open_positions: usize,
}

/// Chooses option structures to open.
pub trait StructureSelector {
    fn name(&self) -> &str;

    /// Minimum calendar days to expiry for new entries.
    fn min_entry_dte(&self) -> i64;

    fn select(&self, ctx: &SelectionContext<'_>) -> Vec<StructureCandidate>;
}
