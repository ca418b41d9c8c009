//! Performance metrics calculator.
//!
//! Pure functions over a completed-trade list and initial capital,
//! optionally an equity curve. Degenerate inputs yield 0 or +inf, never an
//! error.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::{CompletedTrade, EquityPoint};
use crate::data::dec_to_f64;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Comprehensive performance metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Basic statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub loss_rate: f64,

    // P&L metrics (net of costs)
    pub total_pnl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub expectancy: f64,
    pub total_costs: Decimal,

    // Return metrics
    pub final_capital: Decimal,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,

    // Risk metrics
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    /// Longest contiguous run of bars below the running peak.
    pub max_drawdown_duration: usize,

    // Risk-adjusted returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Time metrics
    pub trading_days: usize,
    pub avg_days_held: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            loss_rate: 0.0,
            total_pnl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: 0.0,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            largest_win: Decimal::ZERO,
            largest_loss: Decimal::ZERO,
            expectancy: 0.0,
            total_costs: Decimal::ZERO,
            final_capital: Decimal::ZERO,
            total_return_pct: 0.0,
            annualized_return_pct: 0.0,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: 0.0,
            max_drawdown_duration: 0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            trading_days: 0,
            avg_days_held: 0.0,
        }
    }
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Trades: {} (W: {}, L: {})\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {:.2}\n\
             Expectancy: {:.2}\n\
             \n\
             Net P&L: {:.2}\n\
             Avg Win: {:.2}\n\
             Avg Loss: {:.2}\n\
             Largest Win: {:.2}\n\
             Largest Loss: {:.2}\n\
             Costs: {:.2}\n\
             \n\
             Final Capital: {:.2}\n\
             Total Return: {:.2}%\n\
             Annualized Return: {:.2}%\n\
             \n\
             Max Drawdown: {:.2} ({:.2}%, {} bars)\n\
             Sharpe Ratio: {:.2}\n\
             Sortino Ratio: {:.2}\n\
             Calmar Ratio: {:.2}\n\
             \n\
             Avg Days Held: {:.1}",
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.win_rate * 100.0,
            self.profit_factor,
            self.expectancy,
            self.total_pnl,
            self.avg_win,
            self.avg_loss,
            self.largest_win,
            self.largest_loss,
            self.total_costs,
            self.final_capital,
            self.total_return_pct,
            self.annualized_return_pct,
            self.max_drawdown,
            self.max_drawdown_pct,
            self.max_drawdown_duration,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
            self.avg_days_held,
        )
    }
}

/// Drawdown analysis details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    pub peak_date: Option<NaiveDate>,
    pub duration_bars: usize,
    /// Drawdown percent at every point, 0 at new highs.
    pub curve: Vec<f64>,
}

/// Trade statistics for one strategy or regime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakdownStats {
    pub trades: usize,
    pub winners: usize,
    pub win_rate: f64,
    pub net_pnl: Decimal,
    pub avg_pnl: Decimal,
    pub profit_factor: f64,
}

/// Monthly return data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub pnl: Decimal,
    /// Percent of equity at the start of the month.
    pub return_pct: f64,
    pub trades: usize,
    pub win_rate: f64,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics.
    ///
    /// Daily returns come from `equity_curve` when supplied, otherwise from
    /// trade P&L aggregated by exit date on top of `initial_capital`.
    /// `risk_free_rate` is annual.
    pub fn calculate(
        trades: &[CompletedTrade],
        initial_capital: Decimal,
        equity_curve: Option<&[EquityPoint]>,
        risk_free_rate: f64,
    ) -> PerformanceMetrics {
        let total_trades = trades.len();
        let winners: Vec<Decimal> = trades.iter().filter(|t| t.net_pnl > Decimal::ZERO).map(|t| t.net_pnl).collect();
        let losers: Vec<Decimal> = trades.iter().filter(|t| t.net_pnl < Decimal::ZERO).map(|t| t.net_pnl).collect();

        let win_rate = ratio(winners.len(), total_trades);
        let loss_rate = ratio(losers.len(), total_trades);

        let gross_profit: Decimal = winners.iter().sum();
        let gross_loss: Decimal = losers.iter().sum();
        let total_pnl: Decimal = trades.iter().map(|t| t.net_pnl).sum();
        let avg_win = average(gross_profit, winners.len());
        let avg_loss = average(gross_loss, losers.len());
        let expectancy = win_rate * dec_to_f64(avg_win) + loss_rate * dec_to_f64(avg_loss);

        let daily_equity = match equity_curve {
            Some(curve) if !curve.is_empty() => Self::daily_equity_from_curve(curve),
            _ => Self::daily_equity_from_trades(trades, initial_capital),
        };
        let returns = Self::daily_returns(initial_capital, &daily_equity);
        let trading_days = returns.len();

        let final_capital = initial_capital + total_pnl;
        let total_return_pct = pct_change(initial_capital, final_capital);
        let annualized_return_pct = Self::annualized_return(initial_capital, final_capital, trading_days);

        let drawdown = match equity_curve {
            Some(curve) if !curve.is_empty() => {
                let points: Vec<(NaiveDate, Decimal)> =
                    curve.iter().map(|p| (p.timestamp.date(), p.equity)).collect();
                Self::analyze_drawdown(&points)
            }
            _ => Self::analyze_drawdown(&daily_equity),
        };

        let sharpe_ratio = Self::sharpe_ratio(&returns, risk_free_rate);
        let sortino_ratio = Self::sortino_ratio(&returns, risk_free_rate);
        let calmar_ratio = if drawdown.max_drawdown_pct > 0.0 {
            annualized_return_pct / drawdown.max_drawdown_pct
        } else {
            0.0
        };

        let avg_days_held = if total_trades > 0 {
            trades.iter().map(|t| t.days_held as f64).sum::<f64>() / total_trades as f64
        } else {
            0.0
        };

        PerformanceMetrics {
            total_trades,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate,
            loss_rate,
            total_pnl,
            gross_profit,
            gross_loss,
            profit_factor: Self::profit_factor(gross_profit, gross_loss),
            avg_win,
            avg_loss,
            largest_win: winners.iter().copied().max().unwrap_or(Decimal::ZERO),
            largest_loss: losers.iter().copied().min().unwrap_or(Decimal::ZERO),
            expectancy,
            total_costs: trades.iter().map(|t| t.costs.total).sum(),
            final_capital,
            total_return_pct,
            annualized_return_pct,
            max_drawdown: drawdown.max_drawdown,
            max_drawdown_pct: drawdown.max_drawdown_pct,
            max_drawdown_duration: drawdown.duration_bars,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            trading_days,
            avg_days_held,
        }
    }

    /// Gross profit over |gross loss|; +inf without losses, 0 without trades.
    pub fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
        if gross_loss.is_zero() {
            return if gross_profit > Decimal::ZERO {
                f64::INFINITY
            } else {
                0.0
            };
        }
        dec_to_f64(gross_profit) / dec_to_f64(gross_loss.abs())
    }

    /// Compound annual growth in percent over `trading_days`.
    pub fn annualized_return(initial: Decimal, final_val: Decimal, trading_days: usize) -> f64 {
        let init = dec_to_f64(initial);
        let fin = dec_to_f64(final_val);
        if init <= 0.0 || fin <= 0.0 || trading_days == 0 {
            return 0.0;
        }
        let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
        ((fin / init).powf(1.0 / years) - 1.0) * 100.0
    }

    /// Mean excess daily return over its sample stdev, annualized.
    pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
        let std = excess.iter().std_dev();
        if !std.is_finite() || std == 0.0 {
            return 0.0;
        }
        excess.iter().mean() / std * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Sharpe numerator over downside deviation of the negative excess
    /// returns; +inf when none are negative.
    pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
        let negative: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
        if negative.is_empty() {
            return f64::INFINITY;
        }
        let downside = (negative.iter().map(|r| r * r).sum::<f64>() / negative.len() as f64).sqrt();
        excess.iter().mean() / downside * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Drawdown over an ordered (date, equity) series.
    pub fn analyze_drawdown(points: &[(NaiveDate, Decimal)]) -> DrawdownAnalysis {
        let Some(&(first_date, first_equity)) = points.first() else {
            return DrawdownAnalysis {
                max_drawdown: Decimal::ZERO,
                max_drawdown_pct: 0.0,
                max_drawdown_date: None,
                peak_date: None,
                duration_bars: 0,
                curve: Vec::new(),
            };
        };

        let mut peak = first_equity;
        let mut peak_date = first_date;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = 0.0;
        let mut max_drawdown_date = None;
        let mut max_peak_date = None;
        let mut run = 0usize;
        let mut longest = 0usize;
        let mut curve = Vec::with_capacity(points.len());

        for &(date, equity) in points {
            if equity >= peak {
                peak = equity;
                peak_date = date;
                run = 0;
                curve.push(0.0);
                continue;
            }

            run += 1;
            longest = longest.max(run);

            let drawdown = peak - equity;
            let drawdown_pct = if peak > Decimal::ZERO {
                dec_to_f64(drawdown) / dec_to_f64(peak) * 100.0
            } else {
                0.0
            };
            curve.push(drawdown_pct);

            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_drawdown_pct = drawdown_pct;
                max_drawdown_date = Some(date);
                max_peak_date = Some(peak_date);
            }
        }

        DrawdownAnalysis {
            max_drawdown,
            max_drawdown_pct,
            max_drawdown_date,
            peak_date: max_peak_date,
            duration_bars: longest,
            curve,
        }
    }

    /// Last equity of each date in the curve.
    fn daily_equity_from_curve(curve: &[EquityPoint]) -> Vec<(NaiveDate, Decimal)> {
        let mut daily: Vec<(NaiveDate, Decimal)> = Vec::new();
        for point in curve {
            let date = point.timestamp.date();
            match daily.last_mut() {
                Some((d, equity)) if *d == date => *equity = point.equity,
                _ => daily.push((date, point.equity)),
            }
        }
        daily
    }

    /// Cumulative equity at each trade exit date.
    fn daily_equity_from_trades(
        trades: &[CompletedTrade],
        initial_capital: Decimal,
    ) -> Vec<(NaiveDate, Decimal)> {
        let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for trade in trades {
            *by_date.entry(trade.exit_date).or_default() += trade.net_pnl;
        }
        let mut equity = initial_capital;
        by_date
            .into_iter()
            .map(|(date, pnl)| {
                equity += pnl;
                (date, equity)
            })
            .collect()
    }

    /// Simple returns of a daily equity series, the first measured against
    /// `initial_capital`.
    fn daily_returns(initial_capital: Decimal, daily: &[(NaiveDate, Decimal)]) -> Vec<f64> {
        let mut prev = dec_to_f64(initial_capital);
        let mut returns = Vec::with_capacity(daily.len());
        for &(_, equity) in daily {
            let curr = dec_to_f64(equity);
            if prev > 0.0 {
                returns.push((curr - prev) / prev);
            }
            prev = curr;
        }
        returns
    }

    /// Per-strategy statistics.
    pub fn by_strategy(trades: &[CompletedTrade]) -> BTreeMap<String, BreakdownStats> {
        Self::breakdown(trades, |t| t.strategy.clone())
    }

    /// Per-entry-regime statistics.
    pub fn by_regime(trades: &[CompletedTrade]) -> BTreeMap<String, BreakdownStats> {
        Self::breakdown(trades, |t| t.regime.as_str().to_string())
    }

    fn breakdown(
        trades: &[CompletedTrade],
        key: impl Fn(&CompletedTrade) -> String,
    ) -> BTreeMap<String, BreakdownStats> {
        let mut groups: BTreeMap<String, Vec<&CompletedTrade>> = BTreeMap::new();
        for trade in trades {
            groups.entry(key(trade)).or_default().push(trade);
        }

        groups
            .into_iter()
            .map(|(k, group)| {
                let winners = group.iter().filter(|t| t.is_winner()).count();
                let net_pnl: Decimal = group.iter().map(|t| t.net_pnl).sum();
                let gross_profit: Decimal =
                    group.iter().filter(|t| t.is_winner()).map(|t| t.net_pnl).sum();
                let gross_loss: Decimal = group
                    .iter()
                    .filter(|t| t.net_pnl < Decimal::ZERO)
                    .map(|t| t.net_pnl)
                    .sum();
                let stats = BreakdownStats {
                    trades: group.len(),
                    winners,
                    win_rate: ratio(winners, group.len()),
                    net_pnl,
                    avg_pnl: average(net_pnl, group.len()),
                    profit_factor: Self::profit_factor(gross_profit, gross_loss),
                };
                (k, stats)
            })
            .collect()
    }

    /// Returns by exit month, as percent of equity at the start of the month.
    pub fn monthly_returns(trades: &[CompletedTrade], initial_capital: Decimal) -> Vec<MonthlyReturn> {
        let mut monthly: BTreeMap<(i32, u32), Vec<&CompletedTrade>> = BTreeMap::new();
        for trade in trades {
            let key = (trade.exit_date.year(), trade.exit_date.month());
            monthly.entry(key).or_default().push(trade);
        }

        let mut equity = initial_capital;
        monthly
            .into_iter()
            .map(|((year, month), group)| {
                let pnl: Decimal = group.iter().map(|t| t.net_pnl).sum();
                let winners = group.iter().filter(|t| t.is_winner()).count();
                let return_pct = if equity > Decimal::ZERO {
                    dec_to_f64(pnl) / dec_to_f64(equity) * 100.0
                } else {
                    0.0
                };
                equity += pnl;
                MonthlyReturn {
                    year,
                    month,
                    pnl,
                    return_pct,
                    trades: group.len(),
                    win_rate: ratio(winners, group.len()),
                }
            })
            .collect()
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

fn average(total: Decimal, n: usize) -> Decimal {
    if n == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(n as u64)).round_dp(2)
    }
}

fn pct_change(from: Decimal, to: Decimal) -> f64 {
    if from <= Decimal::ZERO {
        return 0.0;
    }
    dec_to_f64(to - from) / dec_to_f64(from) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{ExitReason, TradeCosts};
    use crate::regime::MarketRegime;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn trade(id: u64, exit: (i32, u32, u32), pnl: Decimal, strategy: &str, regime: MarketRegime) -> CompletedTrade {
        let exit_date = NaiveDate::from_ymd_opt(exit.0, exit.1, exit.2).unwrap();
        CompletedTrade {
            id,
            strategy: strategy.to_string(),
            regime,
            entry_date: exit_date - chrono::Duration::days(3),
            exit_date,
            entry_price: dec!(200),
            exit_price: dec!(150),
            gross_pnl: pnl,
            costs: TradeCosts::default(),
            net_pnl: pnl,
            pnl_pct: 0.0,
            exit_reason: ExitReason::ProfitTarget,
            days_held: 3,
            margin_blocked: dec!(100000),
            capital_before: Decimal::ZERO,
            capital_after: Decimal::ZERO,
            margin_before: Decimal::ZERO,
            margin_after: Decimal::ZERO,
        }
    }

    fn sample() -> Vec<CompletedTrade> {
        vec![
            trade(1, (2024, 1, 10), dec!(3000), "a", MarketRegime::RangeBound),
            trade(2, (2024, 1, 20), dec!(-1000), "a", MarketRegime::BullTrend),
            trade(3, (2024, 2, 5), dec!(2000), "b", MarketRegime::RangeBound),
            trade(4, (2024, 2, 15), dec!(-2000), "b", MarketRegime::RangeBound),
        ]
    }

    #[test]
    fn test_profit_factor() {
        assert_eq!(MetricsCalculator::profit_factor(dec!(15000), dec!(-5000)), 3.0);
        assert_eq!(MetricsCalculator::profit_factor(dec!(100), Decimal::ZERO), f64::INFINITY);
        assert_eq!(MetricsCalculator::profit_factor(Decimal::ZERO, Decimal::ZERO), 0.0);
    }

    #[test]
    fn test_annualized_return() {
        // 100K -> 121K over 2 years = 10%
        let cagr = MetricsCalculator::annualized_return(dec!(100000), dec!(121000), 504);
        assert_relative_eq!(cagr, 10.0, epsilon = 1e-9);
        assert_eq!(MetricsCalculator::annualized_return(dec!(100000), dec!(121000), 0), 0.0);
    }

    #[test]
    fn test_trade_statistics() {
        let m = MetricsCalculator::calculate(&sample(), dec!(1000000), None, 0.0);
        assert_eq!(m.total_trades, 4);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 2);
        assert_eq!(m.total_pnl, dec!(2000));
        assert_eq!(m.avg_win, dec!(2500));
        assert_eq!(m.avg_loss, dec!(-1500));
        assert_eq!(m.largest_win, dec!(3000));
        assert_eq!(m.largest_loss, dec!(-2000));
        assert_relative_eq!(m.profit_factor, 5000.0 / 3000.0);
        // 0.5 * 2500 + 0.5 * -1500
        assert_relative_eq!(m.expectancy, 500.0);
        assert_eq!(m.final_capital, dec!(1002000));
        assert_relative_eq!(m.total_return_pct, 0.2, epsilon = 1e-12);
        assert_eq!(m.trading_days, 4);
    }

    #[test]
    fn test_empty_trades_degenerate() {
        let m = MetricsCalculator::calculate(&[], dec!(1000000), None, 0.065);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, 0.0);
        assert_eq!(m.max_drawdown, Decimal::ZERO);
        assert_eq!(m.final_capital, dec!(1000000));
    }

    #[test]
    fn test_sharpe_and_sortino() {
        let returns = [0.01, -0.005, 0.002, 0.004, -0.001];
        let sharpe = MetricsCalculator::sharpe_ratio(&returns, 0.0);
        let mean = 0.002;
        let var = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / 4.0;
        assert_relative_eq!(sharpe, mean / var.sqrt() * 252f64.sqrt(), epsilon = 1e-9);

        let sortino = MetricsCalculator::sortino_ratio(&returns, 0.0);
        let downside = ((0.005f64.powi(2) + 0.001f64.powi(2)) / 2.0).sqrt();
        assert_relative_eq!(sortino, mean / downside * 252f64.sqrt(), epsilon = 1e-9);

        assert_eq!(MetricsCalculator::sortino_ratio(&[0.01, 0.02], 0.0), f64::INFINITY);
        assert_eq!(MetricsCalculator::sharpe_ratio(&[0.01], 0.0), 0.0);
        assert_eq!(MetricsCalculator::sharpe_ratio(&[0.01, 0.01], 0.0), 0.0);
    }

    #[test]
    fn test_drawdown_duration() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let points = vec![
            (d(1), dec!(100)),
            (d(2), dec!(90)),
            (d(3), dec!(95)),
            (d(4), dec!(101)),
            (d(5), dec!(80)),
            (d(6), dec!(85)),
            (d(7), dec!(90)),
            (d(8), dec!(100)),
        ];
        let dd = MetricsCalculator::analyze_drawdown(&points);
        assert_eq!(dd.max_drawdown, dec!(21));
        assert_relative_eq!(dd.max_drawdown_pct, 21.0 / 101.0 * 100.0, epsilon = 1e-9);
        assert_eq!(dd.max_drawdown_date, Some(d(5)));
        assert_eq!(dd.peak_date, Some(d(4)));
        assert_eq!(dd.duration_bars, 4);
        assert_eq!(dd.curve.len(), 8);
        assert_eq!(dd.curve[0], 0.0);
    }

    #[test]
    fn test_breakdowns() {
        let by_strategy = MetricsCalculator::by_strategy(&sample());
        assert_eq!(by_strategy["a"].trades, 2);
        assert_eq!(by_strategy["a"].net_pnl, dec!(2000));
        assert_eq!(by_strategy["b"].net_pnl, Decimal::ZERO);
        assert_relative_eq!(by_strategy["b"].profit_factor, 1.0);

        let by_regime = MetricsCalculator::by_regime(&sample());
        assert_eq!(by_regime["range_bound"].trades, 3);
        assert_eq!(by_regime["bull_trend"].winners, 0);
    }

    #[test]
    fn test_monthly_returns() {
        let months = MetricsCalculator::monthly_returns(&sample(), dec!(1000000));
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].year, months[0].month), (2024, 1));
        assert_eq!(months[0].pnl, dec!(2000));
        assert_relative_eq!(months[0].return_pct, 0.2, epsilon = 1e-12);
        assert_eq!(months[1].pnl, Decimal::ZERO);
        assert_eq!(months[1].win_rate, 0.5);
    }
}
