//! Position and trade records.
//!
//! Handles the position lifecycle:
//! - Entry (legs priced at mid, margin blocked)
//! - Mark-to-market per bar
//! - Exit checks (trailing stop, profit target, stop loss, holding period, DTE)
//! - Conversion into a `CompletedTrade` with costs and ledger snapshots

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::commission::TradeCosts;
use crate::data::{dec_to_f64, Greeks, OptionContract};
use crate::regime::MarketRegime;
use crate::strategy::{ExitRules, TrailingStopConfig};

/// Reason for exiting a position, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    TrailingStop,
    ProfitTarget,
    StopLoss,
    /// Held for the maximum number of days.
    TimeExit,
    /// Days to expiry fell to the exit threshold.
    DteExit,
    /// Regime turned chaotic.
    RegimeChaos,
    /// Backtest daily loss brake flattened the book.
    DailyLossBrake,
    /// Still open on the last bar.
    EndOfBacktest,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrailingStop => "trailing_stop",
            Self::ProfitTarget => "profit_target",
            Self::StopLoss => "stop_loss",
            Self::TimeExit => "time_exit",
            Self::DteExit => "dte_exit",
            Self::RegimeChaos => "regime_chaos",
            Self::DailyLossBrake => "daily_loss_brake",
            Self::EndOfBacktest => "end_of_backtest",
        }
    }
}

/// A single leg of an open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLeg {
    pub contract: OptionContract,
    pub lot_size: u32,
    /// Entry price per unit.
    pub entry_price: Decimal,
    /// Latest mark per unit.
    pub current_price: Decimal,
    pub entry_greeks: Greeks,
    pub current_greeks: Greeks,
}

impl PositionLeg {
    /// Signed underlying units (negative when short).
    pub fn units(&self) -> i64 {
        self.contract.signed_units(self.lot_size)
    }

    /// Unrealized P&L of this leg.
    pub fn unrealized_pnl(&self) -> Decimal {
        (self.current_price - self.entry_price) * Decimal::from(self.units())
    }

    /// Premium traded at `price` (always positive).
    pub fn turnover_at(&self, price: Decimal) -> Decimal {
        price * Decimal::from(self.units().abs())
    }
}

/// Trailing stop state, armed once profit reaches the activation level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    pub activation: Decimal,
    pub trail: Decimal,
    pub peak_pnl: Decimal,
    pub armed: bool,
}

impl TrailingStop {
    pub fn new(config: &TrailingStopConfig, margin: Decimal) -> Self {
        Self {
            activation: pct_of(margin, config.activation_pct),
            trail: pct_of(margin, config.trail_pct),
            peak_pnl: Decimal::ZERO,
            armed: false,
        }
    }

    /// Feed the latest P&L. Returns true when the stop is hit.
    pub fn update(&mut self, pnl: Decimal) -> bool {
        if pnl > self.peak_pnl {
            self.peak_pnl = pnl;
        }
        if !self.armed && pnl >= self.activation {
            self.armed = true;
        }
        self.armed && pnl <= self.peak_pnl - self.trail
    }
}

/// `pct` percent of `amount`, rounded to paise.
pub fn pct_of(amount: Decimal, pct: f64) -> Decimal {
    let pct = Decimal::try_from(pct).unwrap_or(Decimal::ZERO);
    (amount * pct / Decimal::ONE_HUNDRED).round_dp(2)
}

/// An open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedPosition {
    pub id: u64,
    pub strategy: String,
    pub entry_regime: MarketRegime,
    pub entry_timestamp: NaiveDateTime,
    pub legs: Vec<PositionLeg>,
    /// Net premium per unit at entry (credit positive).
    pub entry_price: Decimal,
    pub margin_blocked: Decimal,
    /// Profit target in currency.
    pub profit_target: Decimal,
    /// Stop loss in currency (positive number).
    pub stop_loss: Decimal,
    pub exit_rules: ExitRules,
    pub days_held: u32,
    pub trailing_stop: Option<TrailingStop>,
    pub capital_at_entry: Decimal,
}

impl SimulatedPosition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        strategy: String,
        entry_regime: MarketRegime,
        entry_timestamp: NaiveDateTime,
        legs: Vec<PositionLeg>,
        margin_blocked: Decimal,
        exit_rules: ExitRules,
        capital_at_entry: Decimal,
    ) -> Self {
        let entry_price = net_price(&legs, |l| l.entry_price);
        let trailing_stop = exit_rules
            .trailing_stop
            .as_ref()
            .map(|t| TrailingStop::new(t, margin_blocked));
        Self {
            id,
            strategy,
            entry_regime,
            entry_timestamp,
            entry_price,
            profit_target: pct_of(margin_blocked, exit_rules.profit_target_pct),
            stop_loss: pct_of(margin_blocked, exit_rules.stop_loss_pct),
            legs,
            margin_blocked,
            exit_rules,
            days_held: 0,
            trailing_stop,
            capital_at_entry,
        }
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_timestamp.date()
    }

    /// Net premium per unit at the latest marks (credit positive).
    pub fn current_price(&self) -> Decimal {
        net_price(&self.legs, |l| l.current_price)
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.legs.iter().map(|l| l.unrealized_pnl()).sum()
    }

    /// Nearest leg expiry.
    pub fn expiry(&self) -> Option<NaiveDate> {
        self.legs.iter().map(|l| l.contract.expiry).min()
    }

    pub fn dte(&self, date: NaiveDate) -> i64 {
        self.expiry().map(|e| (e - date).num_days()).unwrap_or(0)
    }

    /// Round-trip premium turnover for the given exit marks.
    pub fn turnover(&self) -> Decimal {
        self.legs
            .iter()
            .map(|l| l.turnover_at(l.entry_price) + l.turnover_at(l.current_price))
            .sum()
    }

    /// First exit trigger that applies, in priority order. Chaos exits are
    /// decided by the engine, which knows the regime.
    pub fn check_exit(&mut self, date: NaiveDate) -> Option<ExitReason> {
        let pnl = self.unrealized_pnl();
        let trailing_hit = self
            .trailing_stop
            .as_mut()
            .map(|t| t.update(pnl))
            .unwrap_or(false);

        if trailing_hit {
            Some(ExitReason::TrailingStop)
        } else if pnl >= self.profit_target {
            Some(ExitReason::ProfitTarget)
        } else if pnl <= -self.stop_loss {
            Some(ExitReason::StopLoss)
        } else if self.days_held >= self.exit_rules.max_holding_days {
            Some(ExitReason::TimeExit)
        } else if self.dte(date) <= self.exit_rules.exit_dte {
            Some(ExitReason::DteExit)
        } else {
            None
        }
    }

    /// Portfolio Greeks of the position (per-unit Greeks times signed units).
    pub fn greeks(&self) -> Greeks {
        self.legs.iter().fold(Greeks::default(), |acc, l| {
            acc.add(&l.current_greeks.scaled(l.units() as f64))
        })
    }
}

fn net_price(legs: &[PositionLeg], price: impl Fn(&PositionLeg) -> Decimal) -> Decimal {
    legs.iter()
        .map(|l| price(l) * Decimal::from(-l.contract.side.sign()))
        .sum()
}

/// A closed position with realized results and ledger snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub id: u64,
    pub strategy: String,
    pub regime: MarketRegime,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// Net premium per unit at entry (credit positive).
    pub entry_price: Decimal,
    /// Net premium per unit at exit.
    pub exit_price: Decimal,
    pub gross_pnl: Decimal,
    pub costs: TradeCosts,
    pub net_pnl: Decimal,
    /// Net P&L as percent of blocked margin.
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
    pub days_held: u32,
    pub margin_blocked: Decimal,
    pub capital_before: Decimal,
    pub capital_after: Decimal,
    pub margin_before: Decimal,
    pub margin_after: Decimal,
}

impl CompletedTrade {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }

    pub fn pnl_f64(&self) -> f64 {
        dec_to_f64(self.net_pnl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OptionType, Side};
    use rust_decimal_macros::dec;

    fn leg(option_type: OptionType, entry: Decimal, current: Decimal) -> PositionLeg {
        PositionLeg {
            contract: OptionContract::new(
                dec!(22000),
                NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
                option_type,
                1,
                Side::Short,
            ),
            lot_size: 50,
            entry_price: entry,
            current_price: current,
            entry_greeks: Greeks::default(),
            current_greeks: Greeks {
                delta: 0.5,
                ..Default::default()
            },
        }
    }

    fn rules() -> ExitRules {
        ExitRules {
            profit_target_pct: 2.0,
            stop_loss_pct: 3.0,
            max_holding_days: 10,
            exit_dte: 2,
            trailing_stop: None,
        }
    }

    fn position(call_now: Decimal, put_now: Decimal, rules: ExitRules) -> SimulatedPosition {
        SimulatedPosition::new(
            1,
            "short_strangle_50d".to_string(),
            MarketRegime::RangeBound,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(15, 30, 0)
                .unwrap(),
            vec![
                leg(OptionType::Call, dec!(200), call_now),
                leg(OptionType::Put, dec!(180), put_now),
            ],
            dec!(100000),
            rules,
            dec!(1000000),
        )
    }

    #[test]
    fn test_short_leg_pnl() {
        let l = leg(OptionType::Put, dec!(200), dec!(150));
        assert_eq!(l.units(), -50);
        assert_eq!(l.unrealized_pnl(), dec!(2500));
    }

    #[test]
    fn test_position_prices() {
        let p = position(dec!(200), dec!(180), rules());
        assert_eq!(p.entry_price, dec!(380));
        assert_eq!(p.profit_target, dec!(2000));
        assert_eq!(p.stop_loss, dec!(3000));
        assert_eq!(p.unrealized_pnl(), Decimal::ZERO);
        assert_eq!(p.turnover(), dec!(38000));
    }

    #[test]
    fn test_exit_priority() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();

        // 40 points of decay on 50 units = 2000 profit
        let mut p = position(dec!(180), dec!(160), rules());
        assert_eq!(p.check_exit(date), Some(ExitReason::ProfitTarget));

        let mut p = position(dec!(260), dec!(180), rules());
        assert_eq!(p.check_exit(date), Some(ExitReason::StopLoss));

        // Profit target beats time exit
        let mut p = position(dec!(180), dec!(160), rules());
        p.days_held = 10;
        assert_eq!(p.check_exit(date), Some(ExitReason::ProfitTarget));

        let mut p = position(dec!(200), dec!(180), rules());
        p.days_held = 10;
        assert_eq!(p.check_exit(date), Some(ExitReason::TimeExit));

        let mut p = position(dec!(200), dec!(180), rules());
        let near_expiry = NaiveDate::from_ymd_opt(2024, 1, 23).unwrap();
        assert_eq!(p.check_exit(near_expiry), Some(ExitReason::DteExit));
        assert_eq!(p.check_exit(date), None);
    }

    #[test]
    fn test_trailing_stop() {
        let mut rules = rules();
        rules.profit_target_pct = 50.0;
        rules.trailing_stop = Some(TrailingStopConfig {
            activation_pct: 1.0,
            trail_pct: 0.5,
        });
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();

        let mut p = position(dec!(170), dec!(170), rules);
        // +2000, arms at 1000
        assert_eq!(p.check_exit(date), None);
        // Gives back to +1500, exactly the trail
        p.legs[0].current_price = dec!(180);
        assert_eq!(p.check_exit(date), Some(ExitReason::TrailingStop));
    }

    #[test]
    fn test_position_greeks() {
        let p = position(dec!(200), dec!(180), rules());
        assert_eq!(p.greeks().delta, -50.0);
    }
}
