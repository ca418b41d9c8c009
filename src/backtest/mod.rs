//! Backtesting engine for index option strategies.
//!
//! This module provides the simulation framework:
//! - Bar-by-bar loop with capital and margin bookkeeping
//! - Position lifecycle (entry, mark-to-market, exits)
//! - SPAN-like margin, commission and slippage models
//! - Flat CSV trade export and parallel multi-seed runs

pub mod batch;
pub mod commission;
pub mod config;
pub mod engine;
pub mod export;
pub mod margin;
pub mod slippage;
pub mod trade;

pub use batch::{run_seeds, SeedRunSummary};
pub use commission::{CommissionModel, TradeCosts};
pub use config::{BacktestConfig, ConfigError};
pub use engine::{
    BacktestResult, BacktestSimulationEngine, DailyRecord, DrawdownPoint, EngineCounters,
    EntryDecision, EquityPoint, RejectReason, MAX_ESTIMATED_VOL, MIN_ESTIMATED_VOL,
};
pub use export::{export_trades_csv, write_trades_csv, TRADE_CSV_HEADER};
pub use margin::{MarginBreakdown, MarginCalculator, MarginContext, SpanMargin};
pub use slippage::SlippageModel;
pub use trade::{CompletedTrade, ExitReason, PositionLeg, SimulatedPosition, TrailingStop};
