//! Market regime classification module.
//!
//! Categorizes each bar from realized volatility and price trend:
//! - Range bound / bull trend / bear trend under normal volatility
//! - High volatility above `vol_high`
//! - Chaos above `vol_chaos` or on a single-bar shock

pub mod classifier;

pub use classifier::{MarketRegime, RegimeClassifier, RegimeClassifierConfig, RegimeDetector};
