//! Rule-based market regime classifier.
//!
//! Uses realized volatility (in vol points) and price trend to classify
//! each bar. A single-bar shock or extreme volatility is `Chaos`.

use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::Bar;

/// Market regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketRegime {
    /// Low volatility, no clear trend.
    RangeBound,
    /// Price trending up.
    BullTrend,
    /// Price trending down.
    BearTrend,
    /// Volatility elevated.
    HighVolatility,
    /// Extreme volatility or a gap move. Open positions are closed.
    Chaos,
    /// Not enough history.
    Unknown,
}

impl MarketRegime {
    /// Whether this regime favors selling premium.
    pub fn favors_premium_selling(&self) -> bool {
        matches!(self, Self::RangeBound | Self::BullTrend | Self::BearTrend)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RangeBound => "range_bound",
            Self::BullTrend => "bull_trend",
            Self::BearTrend => "bear_trend",
            Self::HighVolatility => "high_volatility",
            Self::Chaos => "chaos",
            Self::Unknown => "unknown",
        }
    }

    /// Description of the regime.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RangeBound => "Sideways market, normal volatility",
            Self::BullTrend => "Uptrend, normal volatility",
            Self::BearTrend => "Downtrend, normal volatility",
            Self::HighVolatility => "Elevated volatility",
            Self::Chaos => "Extreme volatility or gap move",
            Self::Unknown => "Unknown regime",
        }
    }
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies each bar into a regime.
pub trait RegimeDetector {
    /// `realized_vol` is annualized, in vol points (e.g. 14.0 for 14%).
    fn classify(&mut self, bar: &Bar, realized_vol: Option<f64>) -> MarketRegime;
}

/// Regime classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeClassifierConfig {
    /// Vol points at or above which the market is `HighVolatility`.
    pub vol_high: f64,
    /// Vol points at or above which the market is `Chaos`.
    pub vol_chaos: f64,
    /// Absolute single-bar return treated as a shock.
    pub shock_return: f64,
    /// Lookback period for trend calculation (bars).
    pub trend_lookback: usize,
    /// Trend threshold in percent over the lookback.
    pub trend_threshold: f64,
}

impl Default for RegimeClassifierConfig {
    fn default() -> Self {
        Self {
            vol_high: 25.0,
            vol_chaos: 40.0,
            shock_return: 0.04,  // 4% close-to-close
            trend_lookback: 20,  // ~1 month
            trend_threshold: 3.0,
        }
    }
}

impl RegimeClassifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.vol_high > 0.0 && self.vol_chaos > self.vol_high) {
            return Err(format!(
                "vol thresholds must satisfy 0 < vol_high ({}) < vol_chaos ({})",
                self.vol_high, self.vol_chaos
            ));
        }
        if self.shock_return <= 0.0 {
            return Err(format!("shock_return {} must be positive", self.shock_return));
        }
        if self.trend_lookback < 2 {
            return Err("trend_lookback must be at least 2".to_string());
        }
        Ok(())
    }
}

/// Rule-based regime classifier.
pub struct RegimeClassifier {
    config: RegimeClassifierConfig,
    closes: VecDeque<f64>,
    regime_history: Vec<(NaiveDate, MarketRegime)>,
}

impl RegimeClassifier {
    pub fn new(config: RegimeClassifierConfig) -> Self {
        Self {
            config,
            closes: VecDeque::new(),
            regime_history: Vec::new(),
        }
    }

    fn classify_close(&mut self, date: NaiveDate, close: f64, vol: Option<f64>) -> MarketRegime {
        let prev = self.closes.back().copied();
        self.closes.push_back(close);
        while self.closes.len() > self.config.trend_lookback {
            self.closes.pop_front();
        }

        let shock = match prev {
            Some(p) if p > 0.0 => ((close - p) / p).abs() >= self.config.shock_return,
            _ => false,
        };

        let regime = match vol {
            None => MarketRegime::Unknown,
            Some(v) if v >= self.config.vol_chaos || shock => MarketRegime::Chaos,
            Some(v) if v >= self.config.vol_high => MarketRegime::HighVolatility,
            Some(_) => match self.trend() {
                Some(t) if t > self.config.trend_threshold => MarketRegime::BullTrend,
                Some(t) if t < -self.config.trend_threshold => MarketRegime::BearTrend,
                Some(_) => MarketRegime::RangeBound,
                None => MarketRegime::Unknown,
            },
        };

        self.regime_history.push((date, regime));
        regime
    }

    /// Percent change over the lookback window.
    fn trend(&self) -> Option<f64> {
        if self.closes.len() < self.config.trend_lookback {
            return None;
        }
        let start = *self.closes.front()?;
        let end = *self.closes.back()?;
        if start <= 0.0 {
            return None;
        }
        Some((end - start) / start * 100.0)
    }

    /// Days spent in each regime.
    pub fn distribution(&self) -> BTreeMap<MarketRegime, usize> {
        let mut counts = BTreeMap::new();
        for (_, regime) in &self.regime_history {
            *counts.entry(*regime).or_insert(0) += 1;
        }
        counts
    }

    pub fn current_regime(&self) -> MarketRegime {
        self.regime_history
            .last()
            .map(|(_, regime)| *regime)
            .unwrap_or(MarketRegime::Unknown)
    }

    pub fn regime_history(&self) -> &[(NaiveDate, MarketRegime)] {
        &self.regime_history
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(RegimeClassifierConfig::default())
    }
}

impl RegimeDetector for RegimeClassifier {
    fn classify(&mut self, bar: &Bar, realized_vol: Option<f64>) -> MarketRegime {
        self.classify_close(bar.date(), bar.close_f64(), realized_vol)
    }
}
