//! Transaction cost model for index options.
//!
//! Default: flat 20 per executed order plus 0.05% of premium turnover
//! (exchange, clearing, stamp and transaction taxes folded together).
//! A round trip on one leg is two orders.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::slippage::SlippageModel;

/// Cost breakdown for a closed trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCosts {
    pub brokerage: Decimal,
    pub turnover_charges: Decimal,
    pub slippage: Decimal,
    pub total: Decimal,
}

impl TradeCosts {
    /// Costs for one closed trade, each component rounded to paise.
    pub fn compute(
        commission: &CommissionModel,
        slippage: &SlippageModel,
        orders: u32,
        turnover: Decimal,
        gross_pnl: Decimal,
    ) -> Self {
        let brokerage = commission.brokerage(orders);
        let turnover_charges = commission.turnover_charges(turnover);
        let slippage = slippage.cost(gross_pnl);
        Self {
            brokerage,
            turnover_charges,
            slippage,
            total: brokerage + turnover_charges + slippage,
        }
    }
}

/// Configurable commission model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionModel {
    /// Flat brokerage per executed order.
    pub brokerage_per_order: Decimal,
    /// Charges as a fraction of premium turnover.
    pub turnover_charge_rate: Decimal,
}

impl Default for CommissionModel {
    fn default() -> Self {
        Self {
            brokerage_per_order: dec!(20),
            turnover_charge_rate: dec!(0.0005), // 0.05%
        }
    }
}

impl CommissionModel {
    pub fn new(brokerage_per_order: Decimal, turnover_charge_rate: Decimal) -> Self {
        Self {
            brokerage_per_order,
            turnover_charge_rate,
        }
    }

    /// Create a zero-cost model.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.brokerage_per_order < Decimal::ZERO {
            return Err(format!(
                "brokerage_per_order {} must be >= 0",
                self.brokerage_per_order
            ));
        }
        if self.turnover_charge_rate < Decimal::ZERO || self.turnover_charge_rate >= Decimal::ONE {
            return Err(format!(
                "turnover_charge_rate {} must be in [0, 1)",
                self.turnover_charge_rate
            ));
        }
        Ok(())
    }

    pub fn brokerage(&self, orders: u32) -> Decimal {
        (self.brokerage_per_order * Decimal::from(orders)).round_dp(2)
    }

    pub fn turnover_charges(&self, turnover: Decimal) -> Decimal {
        (turnover.abs() * self.turnover_charge_rate).round_dp(2)
    }

    /// Orders for entering and exiting `legs` legs.
    pub fn round_trip_orders(legs: usize) -> u32 {
        (legs * 2) as u32
    }
}
