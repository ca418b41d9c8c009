pub mod analytics;
pub mod backtest;
pub mod data;
pub mod metrics;
pub mod pricing;
pub mod regime;
pub mod risk;
pub mod strategy;
pub mod validation;

// Re-export commonly used types
pub use data::{Bar, Greeks, IndexInstrument, OptionContract, OptionQuote, OptionType, OptionsChain};
pub use pricing::{BlackScholes, PricingError, SyntheticChainGenerator};
pub use validation::{GreeksValidator, ResolvedGreeks};
pub use backtest::{
    BacktestConfig, BacktestResult, BacktestSimulationEngine, CompletedTrade, ConfigError,
    SimulatedPosition,
};
pub use risk::{CircuitBreaker, GreekHedger, Shared};
pub use regime::{MarketRegime, RegimeClassifier};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
