//! Backtest configuration.
//!
//! Every section carries serde defaults so a partial TOML file (or none at
//! all) yields a complete config. `validate()` runs at engine construction.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::commission::CommissionModel;
use super::margin::SpanMargin;
use super::slippage::SlippageModel;
use crate::analytics::RealizedVolatility;
use crate::data::IndexInstrument;
use crate::pricing::{BlackScholes, ChainGeneratorConfig};
use crate::regime::RegimeClassifierConfig;
use crate::risk::{CircuitBreakerConfig, GreekHedgerConfig};
use crate::strategy::StrangleConfig;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {section} config: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for backtest execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Starting capital.
    pub initial_capital: Decimal,

    /// Traded index.
    pub instrument: IndexInstrument,

    /// Bars that only feed volatility and regime history.
    pub warmup_bars: usize,

    /// Ceiling on blocked margin as percent of capital (e.g., 40.0 = 40%).
    pub max_margin_utilization_pct: f64,

    /// No new entries while drawdown from peak equity is at or above this percent.
    pub max_entry_drawdown_pct: f64,

    /// Backtest-only daily loss brake, percent of the day's starting equity.
    pub daily_brake_loss_pct: f64,

    /// Sessions to stay flat after the brake fires.
    pub brake_flat_days: u32,

    /// Annual risk-free rate used by Sharpe/Sortino.
    pub risk_free_rate: f64,

    /// Pricing model for chains, marks and margin.
    pub pricer: BlackScholes,

    pub chain: ChainGeneratorConfig,
    pub commission: CommissionModel,
    pub slippage: SlippageModel,
    pub circuit_breaker: CircuitBreakerConfig,
    pub hedger: GreekHedgerConfig,
    pub strangle: StrangleConfig,
    pub regime: RegimeClassifierConfig,
    pub margin: SpanMargin,
    pub volatility: RealizedVolatility,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(1_000_000),
            instrument: IndexInstrument::default(),
            warmup_bars: 30,
            max_margin_utilization_pct: 40.0,
            max_entry_drawdown_pct: 15.0,
            daily_brake_loss_pct: 2.0,
            brake_flat_days: 1,
            risk_free_rate: 0.065,
            pricer: BlackScholes::default(),
            chain: ChainGeneratorConfig::default(),
            commission: CommissionModel::default(),
            slippage: SlippageModel::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            hedger: GreekHedgerConfig::default(),
            strangle: StrangleConfig::default(),
            regime: RegimeClassifierConfig::default(),
            margin: SpanMargin::default(),
            volatility: RealizedVolatility::default(),
        }
    }
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |section: &'static str| move |message: String| ConfigError::Invalid { section, message };

        if self.initial_capital <= Decimal::ZERO {
            return Err(invalid("backtest")("initial_capital must be > 0".to_string()));
        }
        if !(self.max_margin_utilization_pct > 0.0 && self.max_margin_utilization_pct <= 100.0) {
            return Err(invalid("backtest")(format!(
                "max_margin_utilization_pct {} must be in (0, 100]",
                self.max_margin_utilization_pct
            )));
        }
        if !(self.max_entry_drawdown_pct > 0.0) {
            return Err(invalid("backtest")("max_entry_drawdown_pct must be > 0".to_string()));
        }
        if !(self.daily_brake_loss_pct > 0.0) {
            return Err(invalid("backtest")("daily_brake_loss_pct must be > 0".to_string()));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("backtest")("risk_free_rate must be finite".to_string()));
        }
        if !(self.pricer.rate.is_finite() && self.pricer.dividend.is_finite()) {
            return Err(invalid("pricer")("rate and dividend must be finite".to_string()));
        }

        self.chain.validate().map_err(invalid("chain"))?;
        self.commission.validate().map_err(invalid("commission"))?;
        self.slippage.validate().map_err(invalid("slippage"))?;
        self.circuit_breaker.validate().map_err(invalid("circuit_breaker"))?;
        self.hedger.validate().map_err(invalid("hedger"))?;
        self.strangle.validate().map_err(invalid("strangle"))?;
        self.regime.validate().map_err(invalid("regime"))?;
        self.margin.validate().map_err(invalid("margin"))?;
        self.volatility.validate().map_err(invalid("volatility"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = BacktestConfig::default();
        assert_eq!(config.initial_capital, dec!(1_000_000));
        assert_eq!(config.warmup_bars, 30);
        assert_eq!(config.max_margin_utilization_pct, 40.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = BacktestConfig::from_toml_str(
            r#"
            initial_capital = "500000"
            warmup_bars = 25

            [strangle]
            target_delta = 0.5
            regime_filter = false

            [circuit_breaker]
            consecutive_loss_limit = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.initial_capital, dec!(500000));
        assert_eq!(config.warmup_bars, 25);
        assert_eq!(config.strangle.target_delta, 0.5);
        assert_eq!(config.strangle.lots, 1);
        assert_eq!(config.circuit_breaker.consecutive_loss_limit, 4);
        assert_eq!(config.max_margin_utilization_pct, 40.0);
    }

    #[test]
    fn test_invalid_section_named() {
        let err = BacktestConfig::from_toml_str("[strangle]\nlots = 0\n").unwrap_err();
        assert!(err.to_string().contains("strangle"));

        let err = BacktestConfig::from_toml_str("warmup_bars = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_bad_capital() {
        let config = BacktestConfig {
            initial_capital: Decimal::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { section: "backtest", .. })));
    }
}
