//! Option pricing.
//!
//! - `black_scholes`: closed-form price, Greeks and implied volatility
//! - `chain`: synthetic option chains built by delta-targeted strike search

pub mod black_scholes;
pub mod chain;

pub use black_scholes::{intrinsic, BlackScholes, PricingError, MIN_VOLATILITY};
pub use chain::{time_to_expiry, ChainGeneratorConfig, StrikeSearch, SyntheticChainGenerator};
