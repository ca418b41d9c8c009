use rust_decimal_macros::dec;

use theta_backtest::backtest::{BacktestConfig, BacktestSimulationEngine};
use theta_backtest::data::IndexInstrument;

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

#[test]
fn shipped_config_matches_defaults() {
    let config = BacktestConfig::from_toml_str(DEFAULT_TOML).unwrap();
    let defaults = BacktestConfig::default();

    assert_eq!(config.initial_capital, dec!(1_000_000));
    assert_eq!(config.instrument, IndexInstrument::Nifty);
    assert_eq!(config.warmup_bars, defaults.warmup_bars);
    assert_eq!(config.strangle.target_delta, defaults.strangle.target_delta);
    assert_eq!(
        config.circuit_breaker.daily_loss_limit_pct,
        defaults.circuit_breaker.daily_loss_limit_pct
    );
    assert_eq!(config.hedger.hedge_cost_bps, defaults.hedger.hedge_cost_bps);
    assert_eq!(config.margin.exposure_rate, defaults.margin.exposure_rate);
    assert_eq!(config.volatility.window, defaults.volatility.window);

    assert!(BacktestSimulationEngine::new(config).is_ok());
}

#[test]
fn bad_section_is_reported() {
    let toml = DEFAULT_TOML.replace("vol_chaos = 40.0", "vol_chaos = 10.0");
    let err = BacktestConfig::from_toml_str(&toml).unwrap_err();
    assert!(err.to_string().contains("regime"));
}
