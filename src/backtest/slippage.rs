//! Slippage model.
//!
//! Fills are simulated at mid; execution shortfall is charged on close as a
//! fraction of the trade's absolute gross P&L.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configurable slippage model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageModel {
    /// Fraction of |gross P&L| lost to execution.
    pub rate_of_abs_pnl: Decimal,
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self {
            rate_of_abs_pnl: dec!(0.01), // 1%
        }
    }
}

impl SlippageModel {
    pub fn new(rate_of_abs_pnl: Decimal) -> Self {
        Self { rate_of_abs_pnl }
    }

    /// Create a zero-slippage model.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Create a pessimistic slippage model.
    pub fn pessimistic() -> Self {
        Self::new(dec!(0.05))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rate_of_abs_pnl < Decimal::ZERO || self.rate_of_abs_pnl > Decimal::ONE {
            return Err(format!(
                "slippage rate {} must be in [0, 1]",
                self.rate_of_abs_pnl
            ));
        }
        Ok(())
    }

    /// Slippage charged on a trade with `gross_pnl`.
    pub fn cost(&self, gross_pnl: Decimal) -> Decimal {
        (gross_pnl.abs() * self.rate_of_abs_pnl).round_dp(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_uses_absolute_pnl() {
        let model = SlippageModel::default();
        assert_eq!(model.cost(dec!(1000)), dec!(10));
        assert_eq!(model.cost(dec!(-1000)), dec!(10));
        assert_eq!(model.cost(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_zero_and_pessimistic() {
        assert_eq!(SlippageModel::zero().cost(dec!(5000)), dec!(0));
        assert_eq!(SlippageModel::pessimistic().cost(dec!(5000)), dec!(250));
        assert!(SlippageModel::new(dec!(-0.1)).validate().is_err());
    }
}
