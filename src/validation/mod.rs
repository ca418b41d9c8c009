//! Validation of inputs to the simulator.
//!
//! - Bar integrity (OHLC consistency, ordering, session gaps)
//! - Greeks resolution with computed and heuristic fallbacks

pub mod bars;
pub mod greeks;

pub use bars::{validate_bar, validate_series, BarIntegrityReport, CheckResult};
pub use greeks::{
    heuristic_greeks, resolve_greeks, GreeksResolutionStats, GreeksSource, GreeksValidator,
    MoneynessBucket, ResolvedGreeks,
};
