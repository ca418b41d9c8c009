//! Three-tier Greeks resolution.
//!
//! Every quote gets usable Greeks, in order of preference:
//! 1. Greeks supplied with the chain, when finite and plausible
//!    (delta in [-1.1, 1.1], gamma >= 0)
//! 2. Black-Scholes Greeks from the quote's IV, or IV implied from its mid
//! 3. A moneyness-bucketed heuristic table
//!
//! Resolution never fails; the tier used is carried in the result.

use serde::{Deserialize, Serialize};

use crate::data::{dec_to_f64, Greeks, OptionQuote, OptionType};
use crate::pricing::{time_to_expiry, BlackScholes};

/// Where a set of Greeks came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GreeksSource {
    ChainSupplied,
    Computed,
    Heuristic,
}

/// Moneyness buckets for the heuristic table, from the holder's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoneynessBucket {
    DeepItm,
    Itm,
    Atm,
    Otm,
    DeepOtm,
}

impl MoneynessBucket {
    /// Bucket a strike. Log-moneyness is signed so positive means in the money.
    pub fn classify(spot: f64, strike: f64, option_type: OptionType) -> Self {
        let m = match option_type {
            OptionType::Call => (spot / strike).ln(),
            OptionType::Put => (strike / spot).ln(),
        };
        if m > 0.05 {
            Self::DeepItm
        } else if m > 0.01 {
            Self::Itm
        } else if m >= -0.01 {
            Self::Atm
        } else if m >= -0.05 {
            Self::Otm
        } else {
            Self::DeepOtm
        }
    }

    /// Canonical (|delta|, gamma * spot, theta / spot, vega / spot).
    fn profile(&self) -> (f64, f64, f64, f64) {
        match self {
            Self::DeepItm => (0.90, 1.0, -0.000_10, 0.000_3),
            Self::Itm => (0.70, 8.0, -0.000_35, 0.000_9),
            Self::Atm => (0.50, 12.0, -0.000_50, 0.001_2),
            Self::Otm => (0.30, 8.0, -0.000_35, 0.000_9),
            Self::DeepOtm => (0.10, 1.0, -0.000_10, 0.000_3),
        }
    }
}

/// Greeks together with the tier that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResolvedGreeks {
    ChainSupplied(Greeks),
    Computed { greeks: Greeks, iv: f64 },
    Heuristic { greeks: Greeks, bucket: MoneynessBucket },
}

impl ResolvedGreeks {
    pub fn greeks(&self) -> Greeks {
        match self {
            Self::ChainSupplied(g) => *g,
            Self::Computed { greeks, .. } | Self::Heuristic { greeks, .. } => *greeks,
        }
    }

    pub fn source(&self) -> GreeksSource {
        match self {
            Self::ChainSupplied(_) => GreeksSource::ChainSupplied,
            Self::Computed { .. } => GreeksSource::Computed,
            Self::Heuristic { .. } => GreeksSource::Heuristic,
        }
    }
}

/// Whether chain-supplied Greeks can be used as-is.
pub fn is_plausible(greeks: &Greeks) -> bool {
    greeks.is_finite() && (-1.1..=1.1).contains(&greeks.delta) && greeks.gamma >= 0.0
}

/// Resolve Greeks for one quote.
pub fn resolve_greeks(pricer: &BlackScholes, quote: &OptionQuote) -> ResolvedGreeks {
    if let Some(greeks) = quote.greeks.filter(is_plausible) {
        return ResolvedGreeks::ChainSupplied(greeks);
    }

    let spot = dec_to_f64(quote.spot);
    let strike = dec_to_f64(quote.strike);
    let ttm = time_to_expiry(quote.quoted_at, quote.expiration);

    let iv = if quote.iv.is_finite() && quote.iv > 0.0 {
        Some(quote.iv)
    } else {
        pricer.implied_vol(spot, strike, ttm, dec_to_f64(quote.mid), quote.option_type)
    };

    if let Some(iv) = iv {
        if let Ok(greeks) = pricer.greeks(spot, strike, ttm, iv, quote.option_type) {
            return ResolvedGreeks::Computed { greeks, iv };
        }
    }

    heuristic_greeks(spot, strike, quote.option_type)
}

/// Table lookup used when nothing better is available.
pub fn heuristic_greeks(spot: f64, strike: f64, option_type: OptionType) -> ResolvedGreeks {
    let valid = spot.is_finite() && spot > 0.0 && strike.is_finite() && strike > 0.0;
    let bucket = if valid {
        MoneynessBucket::classify(spot, strike, option_type)
    } else {
        MoneynessBucket::Atm
    };
    let (abs_delta, gamma_s, theta_s, vega_s) = bucket.profile();
    let scale = if valid { spot } else { 0.0 };

    let delta = match option_type {
        OptionType::Call => abs_delta,
        OptionType::Put => -abs_delta,
    };
    let greeks = Greeks {
        delta,
        gamma: if valid { gamma_s / spot } else { 0.0 },
        theta: theta_s * scale,
        vega: vega_s * scale,
        rho: 0.0,
    };

    ResolvedGreeks::Heuristic { greeks, bucket }
}

/// Running count of resolutions per tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GreeksResolutionStats {
    pub chain_supplied: usize,
    pub computed: usize,
    pub heuristic: usize,
}

impl GreeksResolutionStats {
    pub fn record(&mut self, source: GreeksSource) {
        match source {
            GreeksSource::ChainSupplied => self.chain_supplied += 1,
            GreeksSource::Computed => self.computed += 1,
            GreeksSource::Heuristic => self.heuristic += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.chain_supplied + self.computed + self.heuristic
    }

    /// Share of resolutions that fell back to the heuristic table.
    pub fn heuristic_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.heuristic as f64 / self.total() as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Greeks resolved: {} chain, {} computed, {} heuristic ({:.1}% fallback)",
            self.chain_supplied,
            self.computed,
            self.heuristic,
            self.heuristic_rate() * 100.0
        )
    }
}

/// Resolves Greeks and tracks which tier was used.
#[derive(Debug, Clone, Default)]
pub struct GreeksValidator {
    pricer: BlackScholes,
    stats: GreeksResolutionStats,
}

impl GreeksValidator {
    pub fn new(pricer: BlackScholes) -> Self {
        Self {
            pricer,
            stats: GreeksResolutionStats::default(),
        }
    }

    pub fn resolve(&mut self, quote: &OptionQuote) -> ResolvedGreeks {
        let resolved = resolve_greeks(&self.pricer, quote);
        self.stats.record(resolved.source());
        resolved
    }

    pub fn stats(&self) -> &GreeksResolutionStats {
        &self.stats
    }
}
