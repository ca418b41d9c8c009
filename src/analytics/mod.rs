//! Market analytics.
//!
//! Provides:
//! - Realized volatility estimation behind the `VolatilityEstimator` trait

pub mod volatility;

pub use volatility::{RealizedVolatility, VolatilityEstimator};
