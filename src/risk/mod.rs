//! Risk management module.
//!
//! Provides:
//! - Circuit breakers (daily/weekly/monthly loss limits, loss streaks)
//! - Portfolio Greek exposure monitoring and hedge recommendations
//! - A thread-safe handle for sharing either with the live path

pub mod circuit_breakers;
pub mod greek_hedger;
pub mod shared;

pub use circuit_breakers::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerStatus, HaltEvent,
    HaltState,
};
pub use greek_hedger::{
    CapBreach, GammaRiskLevel, GreekHedger, GreekHedgerConfig, GreekHedgerStatus, GreekMetrics,
    HedgeContext, HedgeGreek, HedgeRecommendation, LegExposure,
};
pub use shared::Shared;
