//! Multi-seed batch runs.
//!
//! Each seed gets its own synthetic series and its own engine, so runs share
//! nothing and can go through rayon's pool.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::config::{BacktestConfig, ConfigError};
use super::engine::BacktestSimulationEngine;
use crate::data::{generate_series, SyntheticSeriesConfig};

/// Headline numbers for one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRunSummary {
    pub seed: u64,
    pub trades: usize,
    pub final_capital: Decimal,
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub halts: usize,
}

/// Run one backtest per seed in parallel. Results keep the order of `seeds`.
pub fn run_seeds(
    config: &BacktestConfig,
    series: &SyntheticSeriesConfig,
    seeds: &[u64],
) -> Result<Vec<SeedRunSummary>, ConfigError> {
    config.validate()?;
    series.validate().map_err(|message| ConfigError::Invalid {
        section: "series",
        message,
    })?;

    info!(seeds = seeds.len(), bars = series.bars, "Running seed batch");

    seeds
        .par_iter()
        .map(|&seed| -> Result<SeedRunSummary, ConfigError> {
            let bars = generate_series(&SyntheticSeriesConfig {
                seed,
                ..series.clone()
            });
            let result = BacktestSimulationEngine::new(config.clone())?.run(&bars);
            Ok(SeedRunSummary {
                seed,
                trades: result.trades.len(),
                final_capital: result.final_capital,
                total_return_pct: result.metrics.total_return_pct,
                sharpe_ratio: result.metrics.sharpe_ratio,
                max_drawdown_pct: result.metrics.max_drawdown_pct,
                win_rate: result.metrics.win_rate,
                halts: result.halt_events.len(),
            })
        })
        .collect()
}
