//! Portfolio Greek exposure monitor.
//!
//! Exposures are recomputed from every open leg on each call:
//! - Delta notional: sum(delta * units * spot)
//! - Gamma: sum(0.5 * gamma * units * (0.01 * spot)^2), the P&L of a 1% move
//! - Theta: sum(theta * units) per day
//! - Vega: sum(vega * units) per vol point
//!
//! Each is also expressed as percent of equity and checked against limits.
//! Recommendations are advisory; nothing here places orders.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{dec_to_f64, f64_to_dec, Greeks};

/// Greek hedger configuration. Percentages are of equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreekHedgerConfig {
    /// Delta notional band, +/- percent.
    pub max_delta_pct: f64,
    /// Vega band, +/- percent.
    pub max_vega_pct: f64,
    /// Gamma exposure floor (negative).
    pub min_gamma_pct: f64,
    /// Hard cap on short vega (negative).
    pub short_vega_cap_pct: f64,
    /// Hard cap on short gamma (negative).
    pub short_gamma_cap_pct: f64,
    pub delta_hedge_ratio: f64,
    pub gamma_hedge_ratio: f64,
    pub vega_hedge_ratio: f64,
    /// Gamma risk bands: Moderate below this.
    pub gamma_moderate_pct: f64,
    /// Gamma risk bands: High below this.
    pub gamma_high_pct: f64,
    /// Gamma risk bands: Critical at or below this.
    pub gamma_critical_pct: f64,
    /// Flat cost per hedge order.
    pub brokerage_per_order: Decimal,
    /// Hedge execution cost in basis points of hedged notional.
    pub hedge_cost_bps: Decimal,
}

impl Default for GreekHedgerConfig {
    fn default() -> Self {
        Self {
            max_delta_pct: 12.0,
            max_vega_pct: 35.0,
            min_gamma_pct: -0.15,
            short_vega_cap_pct: -60.0,
            short_gamma_cap_pct: -0.15,
            delta_hedge_ratio: 0.5,
            gamma_hedge_ratio: 0.5,
            vega_hedge_ratio: 0.75,
            gamma_moderate_pct: -0.05,
            gamma_high_pct: -0.10,
            gamma_critical_pct: -0.15,
            brokerage_per_order: dec!(20),
            hedge_cost_bps: dec!(5),
        }
    }
}

impl GreekHedgerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_delta_pct <= 0.0 || self.max_vega_pct <= 0.0 {
            return Err("max_delta_pct and max_vega_pct must be positive".to_string());
        }
        if self.min_gamma_pct >= 0.0
            || self.short_vega_cap_pct >= 0.0
            || self.short_gamma_cap_pct >= 0.0
        {
            return Err("gamma floor and short caps must be negative".to_string());
        }
        if !(self.gamma_moderate_pct > self.gamma_high_pct
            && self.gamma_high_pct > self.gamma_critical_pct)
        {
            return Err("gamma bands must be strictly decreasing".to_string());
        }
        for (name, ratio) in [
            ("delta_hedge_ratio", self.delta_hedge_ratio),
            ("gamma_hedge_ratio", self.gamma_hedge_ratio),
            ("vega_hedge_ratio", self.vega_hedge_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(format!("{} {} must be in (0, 1]", name, ratio));
            }
        }
        if self.brokerage_per_order < Decimal::ZERO || self.hedge_cost_bps < Decimal::ZERO {
            return Err("hedge costs must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Severity of short-gamma exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GammaRiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

/// Per-unit Greeks of one open leg and its signed size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegExposure {
    pub greeks: Greeks,
    /// Signed underlying units (negative when short).
    pub units: i64,
}

/// Market inputs for one recomputation.
#[derive(Debug, Clone, Copy)]
pub struct HedgeContext {
    pub spot: f64,
    pub equity: Decimal,
    /// Futures lot size used for delta hedges.
    pub lot_size: u32,
}

/// Portfolio Greek exposures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreekMetrics {
    /// Share-equivalent delta.
    pub net_delta: f64,
    pub delta_notional: f64,
    pub gamma_exposure: f64,
    pub theta_daily: f64,
    pub vega_per_point: f64,
    pub delta_pct: f64,
    pub gamma_pct: f64,
    pub theta_pct: f64,
    pub vega_pct: f64,
    pub delta_hedge_active: bool,
    pub gamma_hedge_active: bool,
    pub vega_hedge_active: bool,
    pub gamma_risk_level: GammaRiskLevel,
    pub leg_count: usize,
}

impl Default for GreekMetrics {
    fn default() -> Self {
        Self {
            net_delta: 0.0,
            delta_notional: 0.0,
            gamma_exposure: 0.0,
            theta_daily: 0.0,
            vega_per_point: 0.0,
            delta_pct: 0.0,
            gamma_pct: 0.0,
            theta_pct: 0.0,
            vega_pct: 0.0,
            delta_hedge_active: false,
            gamma_hedge_active: false,
            vega_hedge_active: false,
            gamma_risk_level: GammaRiskLevel::Low,
            leg_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeGreek {
    Delta,
    Gamma,
    Vega,
}

/// Advisory hedge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeRecommendation {
    pub greek: HedgeGreek,
    pub action: String,
    pub current_pct: f64,
    pub limit_pct: f64,
    pub hedge_ratio: f64,
    /// Exposure the hedge removes, in currency.
    pub hedge_notional: f64,
    pub estimated_cost: Decimal,
}

/// A hard short-Greek cap breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapBreach {
    pub greek: HedgeGreek,
    pub current_pct: f64,
    pub cap_pct: f64,
}

/// Snapshot for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreekHedgerStatus {
    pub metrics: GreekMetrics,
    pub recommendations: Vec<HedgeRecommendation>,
    pub cap_breaches: Vec<CapBreach>,
    pub thresholds: GreekHedgerConfig,
    pub recomputations: u64,
}

/// Portfolio Greek exposure monitor.
#[derive(Debug, Clone)]
pub struct GreekHedger {
    config: GreekHedgerConfig,
    metrics: GreekMetrics,
    recommendations: Vec<HedgeRecommendation>,
    recomputations: u64,
}

impl GreekHedger {
    /// `config` is expected to be validated.
    pub fn new(config: GreekHedgerConfig) -> Self {
        Self {
            config,
            metrics: GreekMetrics::default(),
            recommendations: Vec::new(),
            recomputations: 0,
        }
    }

    /// Recompute exposures and recommendations from all open legs.
    pub fn compute(&mut self, legs: &[LegExposure], ctx: &HedgeContext) -> &GreekMetrics {
        let spot = ctx.spot;
        let equity = dec_to_f64(ctx.equity);
        let move_1pct = 0.01 * spot;

        let mut m = GreekMetrics {
            leg_count: legs.len(),
            ..Default::default()
        };
        for leg in legs {
            let units = leg.units as f64;
            m.net_delta += leg.greeks.delta * units;
            m.delta_notional += leg.greeks.delta * units * spot;
            m.gamma_exposure += 0.5 * leg.greeks.gamma * units * move_1pct * move_1pct;
            m.theta_daily += leg.greeks.theta * units;
            m.vega_per_point += leg.greeks.vega * units;
        }

        if equity > 0.0 {
            m.delta_pct = m.delta_notional / equity * 100.0;
            m.gamma_pct = m.gamma_exposure / equity * 100.0;
            m.theta_pct = m.theta_daily / equity * 100.0;
            m.vega_pct = m.vega_per_point / equity * 100.0;
        }

        let c = &self.config;
        m.delta_hedge_active = m.delta_pct.abs() > c.max_delta_pct;
        m.gamma_hedge_active = m.gamma_pct < c.min_gamma_pct;
        m.vega_hedge_active = m.vega_pct.abs() > c.max_vega_pct;
        m.gamma_risk_level = self.gamma_risk_level(m.gamma_pct);

        self.recommendations = self.build_recommendations(&m, ctx);
        for rec in &self.recommendations {
            debug!(greek = ?rec.greek, action = %rec.action, cost = %rec.estimated_cost, "Hedge recommendation");
        }

        self.metrics = m;
        self.recomputations += 1;
        &self.metrics
    }

    fn gamma_risk_level(&self, gamma_pct: f64) -> GammaRiskLevel {
        let c = &self.config;
        if gamma_pct <= c.gamma_critical_pct {
            GammaRiskLevel::Critical
        } else if gamma_pct <= c.gamma_high_pct {
            GammaRiskLevel::High
        } else if gamma_pct <= c.gamma_moderate_pct {
            GammaRiskLevel::Moderate
        } else {
            GammaRiskLevel::Low
        }
    }

    fn hedge_cost(&self, orders: u32, notional: f64) -> Decimal {
        let turnover = f64_to_dec(notional.abs());
        (self.config.brokerage_per_order * Decimal::from(orders)
            + turnover * self.config.hedge_cost_bps / dec!(10000))
        .round_dp(2)
    }

    fn build_recommendations(&self, m: &GreekMetrics, ctx: &HedgeContext) -> Vec<HedgeRecommendation> {
        let c = &self.config;
        let mut recs = Vec::new();

        let lots = if m.delta_hedge_active {
            let hedge_units = -m.net_delta * c.delta_hedge_ratio;
            (hedge_units / ctx.lot_size.max(1) as f64).round()
        } else {
            0.0
        };
        // Under half a futures lot there is nothing to trade.
        if lots != 0.0 {
            let side = if lots >= 0.0 { "Buy" } else { "Sell" };
            let notional = lots.abs() * ctx.lot_size as f64 * ctx.spot;
            recs.push(HedgeRecommendation {
                greek: HedgeGreek::Delta,
                action: format!("{} {} futures lots", side, lots.abs()),
                current_pct: m.delta_pct,
                limit_pct: c.max_delta_pct,
                hedge_ratio: c.delta_hedge_ratio,
                hedge_notional: notional,
                estimated_cost: self.hedge_cost(1, notional),
            });
        }

        if m.gamma_hedge_active {
            let offset = -m.gamma_exposure * c.gamma_hedge_ratio;
            recs.push(HedgeRecommendation {
                greek: HedgeGreek::Gamma,
                action: format!("Buy near-dated ATM options for {:.0} of 1% move gamma", offset),
                current_pct: m.gamma_pct,
                limit_pct: c.min_gamma_pct,
                hedge_ratio: c.gamma_hedge_ratio,
                hedge_notional: offset,
                estimated_cost: self.hedge_cost(2, offset),
            });
        }

        if m.vega_hedge_active {
            let offset = -m.vega_per_point * c.vega_hedge_ratio;
            let side = if offset >= 0.0 { "Buy" } else { "Sell" };
            recs.push(HedgeRecommendation {
                greek: HedgeGreek::Vega,
                action: format!("{} longer-dated options for {:.0} vega per point", side, offset.abs()),
                current_pct: m.vega_pct,
                limit_pct: c.max_vega_pct,
                hedge_ratio: c.vega_hedge_ratio,
                hedge_notional: offset,
                estimated_cost: self.hedge_cost(2, offset),
            });
        }

        recs
    }

    pub fn should_rebalance(&self) -> bool {
        !self.recommendations.is_empty()
    }

    pub fn recommendations(&self) -> &[HedgeRecommendation] {
        &self.recommendations
    }

    /// Hard short-vega and short-gamma cap breaches for the last recomputation.
    pub fn check_short_greek_caps(&self) -> Vec<CapBreach> {
        let m = &self.metrics;
        let c = &self.config;
        let mut breaches = Vec::new();

        if m.vega_pct < c.short_vega_cap_pct {
            breaches.push(CapBreach {
                greek: HedgeGreek::Vega,
                current_pct: m.vega_pct,
                cap_pct: c.short_vega_cap_pct,
            });
        }
        if m.gamma_pct < c.short_gamma_cap_pct {
            breaches.push(CapBreach {
                greek: HedgeGreek::Gamma,
                current_pct: m.gamma_pct,
                cap_pct: c.short_gamma_cap_pct,
            });
        }

        for b in &breaches {
            warn!(greek = ?b.greek, current = b.current_pct, cap = b.cap_pct, "Short Greek cap breached");
        }
        breaches
    }

    pub fn metrics(&self) -> &GreekMetrics {
        &self.metrics
    }

    pub fn status(&self) -> GreekHedgerStatus {
        GreekHedgerStatus {
            metrics: self.metrics.clone(),
            recommendations: self.recommendations.clone(),
            cap_breaches: self.check_short_greek_caps(),
            thresholds: self.config.clone(),
            recomputations: self.recomputations,
        }
    }
}
