//! Performance metrics module.
//!
//! Provides performance calculations over completed trades:
//! - Win/loss rates, profit factor, expectancy
//! - Sharpe and Sortino ratios
//! - Maximum drawdown and its duration
//! - Per-strategy, per-regime and monthly breakdowns

pub mod calculator;

pub use calculator::{
    BreakdownStats, DrawdownAnalysis, MetricsCalculator, MonthlyReturn, PerformanceMetrics,
    TRADING_DAYS_PER_YEAR,
};
