//! Loss-limit circuit breaker.
//!
//! Rules, checked on every equity update and recorded trade, first match wins:
//! - Monthly loss <= -10%: MonthlyHalt for 7 days
//! - Weekly loss <= -4%: WeeklyHalt for 3 days
//! - Daily loss <= -1.5%: DailyHalt for 1 day
//! - 3 consecutive losing trades: DailyHalt for 1 day, half size for 1 day
//! - Loss probability > 0.6 on a signal: PreemptiveHalt for 1 day
//!
//! Halts expire lazily: the first poll after `halt_until` returns to Active.
//! A new halt never replaces an active halt of equal or higher severity.
//! The half-size reduction follows the loss streak, whichever rule halts.

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Daily loss limit, percent of the day's starting equity.
    pub daily_loss_limit_pct: Decimal,
    /// Weekly loss limit, percent of the week's starting equity.
    pub weekly_loss_limit_pct: Decimal,
    /// Monthly loss limit, percent of the month's starting equity.
    pub monthly_loss_limit_pct: Decimal,
    /// Losing trades in a row that trigger a halt.
    pub consecutive_loss_limit: u32,
    /// Model loss probability above which a signal is refused.
    pub loss_probability_threshold: f64,
    pub daily_halt_days: i64,
    pub weekly_halt_days: i64,
    pub monthly_halt_days: i64,
    pub preemptive_halt_days: i64,
    /// Size multiplier while the loss-streak reduction is active.
    pub size_reduction_multiplier: f64,
    pub size_reduction_days: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit_pct: dec!(1.5),
            weekly_loss_limit_pct: dec!(4.0),
            monthly_loss_limit_pct: dec!(10.0),
            consecutive_loss_limit: 3,
            loss_probability_threshold: 0.6,
            daily_halt_days: 1,
            weekly_halt_days: 3,
            monthly_halt_days: 7,
            preemptive_halt_days: 1,
            size_reduction_multiplier: 0.5,
            size_reduction_days: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, limit) in [
            ("daily_loss_limit_pct", self.daily_loss_limit_pct),
            ("weekly_loss_limit_pct", self.weekly_loss_limit_pct),
            ("monthly_loss_limit_pct", self.monthly_loss_limit_pct),
        ] {
            if limit <= Decimal::ZERO || limit > dec!(100) {
                return Err(format!("{} {} must be in (0, 100]", name, limit));
            }
        }
        if self.consecutive_loss_limit == 0 {
            return Err("consecutive_loss_limit must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.loss_probability_threshold) {
            return Err(format!(
                "loss_probability_threshold {} must be in [0, 1]",
                self.loss_probability_threshold
            ));
        }
        for (name, days) in [
            ("daily_halt_days", self.daily_halt_days),
            ("weekly_halt_days", self.weekly_halt_days),
            ("monthly_halt_days", self.monthly_halt_days),
            ("preemptive_halt_days", self.preemptive_halt_days),
            ("size_reduction_days", self.size_reduction_days),
        ] {
            if days <= 0 {
                return Err(format!("{} must be positive", name));
            }
        }
        if !(self.size_reduction_multiplier > 0.0 && self.size_reduction_multiplier <= 1.0) {
            return Err(format!(
                "size_reduction_multiplier {} must be in (0, 1]",
                self.size_reduction_multiplier
            ));
        }
        Ok(())
    }
}

/// Halt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HaltState {
    Active,
    DailyHalt,
    WeeklyHalt,
    MonthlyHalt,
    PreemptiveHalt,
}

impl HaltState {
    pub fn severity(&self) -> u8 {
        match self {
            Self::Active => 0,
            Self::PreemptiveHalt => 1,
            Self::DailyHalt => 2,
            Self::WeeklyHalt => 3,
            Self::MonthlyHalt => 4,
        }
    }
}

/// Window tracking and halt state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub daily_loss_pct: Decimal,
    pub weekly_loss_pct: Decimal,
    pub monthly_loss_pct: Decimal,
    pub daily_start_equity: Decimal,
    pub weekly_start_equity: Decimal,
    pub monthly_start_equity: Decimal,
    pub current_equity: Decimal,
    pub consecutive_losses: u32,
    pub halt_state: HaltState,
    pub halt_until: Option<NaiveDateTime>,
    pub halt_reason: Option<String>,
    pub size_reduction_active: bool,
    pub size_reduction_until: Option<NaiveDateTime>,
}

/// One halt transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltEvent {
    pub at: NaiveDateTime,
    pub state: HaltState,
    pub until: NaiveDateTime,
    pub reason: String,
}

/// Snapshot for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub as_of: NaiveDateTime,
    pub halted: bool,
    pub size_multiplier: f64,
    pub metrics: CircuitBreakerMetrics,
    pub thresholds: CircuitBreakerConfig,
    pub halts_triggered: usize,
}

/// Circuit breaker state machine.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    metrics: CircuitBreakerMetrics,
    halt_history: Vec<HaltEvent>,
}

impl CircuitBreaker {
    /// `config` is expected to be validated.
    pub fn new(config: CircuitBreakerConfig, initial_equity: Decimal) -> Self {
        Self {
            config,
            metrics: CircuitBreakerMetrics {
                daily_loss_pct: Decimal::ZERO,
                weekly_loss_pct: Decimal::ZERO,
                monthly_loss_pct: Decimal::ZERO,
                daily_start_equity: initial_equity,
                weekly_start_equity: initial_equity,
                monthly_start_equity: initial_equity,
                current_equity: initial_equity,
                consecutive_losses: 0,
                halt_state: HaltState::Active,
                halt_until: None,
                halt_reason: None,
                size_reduction_active: false,
                size_reduction_until: None,
            },
            halt_history: Vec::new(),
        }
    }

    /// Update with the latest equity and check loss limits.
    pub fn update_equity(&mut self, now: NaiveDateTime, equity: Decimal) -> HaltState {
        self.set_equity(equity);
        self.evaluate(now, false)
    }

    /// Record a closed trade's net P&L and the equity after it.
    pub fn record_trade(&mut self, now: NaiveDateTime, pnl: Decimal, equity: Decimal) -> HaltState {
        if pnl < Decimal::ZERO {
            self.metrics.consecutive_losses += 1;
        } else {
            self.metrics.consecutive_losses = 0;
        }
        self.set_equity(equity);
        self.evaluate(now, true)
    }

    /// Check a model loss probability ahead of an entry.
    pub fn assess_signal(&mut self, now: NaiveDateTime, loss_probability: f64) -> HaltState {
        if loss_probability > self.config.loss_probability_threshold {
            let reason = format!(
                "Loss probability {:.2} above {:.2}",
                loss_probability, self.config.loss_probability_threshold
            );
            self.apply_halt(now, HaltState::PreemptiveHalt, self.config.preemptive_halt_days, reason);
        }
        self.metrics.halt_state
    }

    /// Whether trading is halted at `now`. Clears an expired halt.
    pub fn is_halted(&mut self, now: NaiveDateTime) -> bool {
        self.expire(now);
        self.metrics.halt_state != HaltState::Active
    }

    /// Position size multiplier at `now`. Clears an expired reduction.
    pub fn size_multiplier(&mut self, now: NaiveDateTime) -> f64 {
        self.expire(now);
        if self.metrics.size_reduction_active {
            self.config.size_reduction_multiplier
        } else {
            1.0
        }
    }

    /// Start a new daily window at `equity`.
    pub fn reset_daily(&mut self, equity: Decimal) {
        self.metrics.daily_start_equity = equity;
        self.set_equity(equity);
    }

    /// Start a new weekly window at `equity`.
    pub fn reset_weekly(&mut self, equity: Decimal) {
        self.metrics.weekly_start_equity = equity;
        self.set_equity(equity);
    }

    /// Start a new monthly window at `equity`.
    pub fn reset_monthly(&mut self, equity: Decimal) {
        self.metrics.monthly_start_equity = equity;
        self.set_equity(equity);
    }

    pub fn status(&mut self, now: NaiveDateTime) -> CircuitBreakerStatus {
        let halted = self.is_halted(now);
        CircuitBreakerStatus {
            as_of: now,
            halted,
            size_multiplier: self.size_multiplier(now),
            metrics: self.metrics.clone(),
            thresholds: self.config.clone(),
            halts_triggered: self.halt_history.len(),
        }
    }

    pub fn metrics(&self) -> &CircuitBreakerMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn halt_history(&self) -> &[HaltEvent] {
        &self.halt_history
    }

    fn set_equity(&mut self, equity: Decimal) {
        let m = &mut self.metrics;
        m.current_equity = equity;
        m.daily_loss_pct = change_pct(m.daily_start_equity, equity);
        m.weekly_loss_pct = change_pct(m.weekly_start_equity, equity);
        m.monthly_loss_pct = change_pct(m.monthly_start_equity, equity);
    }

    /// First matching halt rule, if any: (state, days, reason).
    fn matching_rule(&self, after_trade: bool) -> Option<(HaltState, i64, String)> {
        let m = &self.metrics;
        let c = &self.config;

        if m.monthly_loss_pct <= -c.monthly_loss_limit_pct {
            let reason = format!(
                "Monthly loss {}% breached -{}%",
                m.monthly_loss_pct.round_dp(2),
                c.monthly_loss_limit_pct
            );
            Some((HaltState::MonthlyHalt, c.monthly_halt_days, reason))
        } else if m.weekly_loss_pct <= -c.weekly_loss_limit_pct {
            let reason = format!(
                "Weekly loss {}% breached -{}%",
                m.weekly_loss_pct.round_dp(2),
                c.weekly_loss_limit_pct
            );
            Some((HaltState::WeeklyHalt, c.weekly_halt_days, reason))
        } else if m.daily_loss_pct <= -c.daily_loss_limit_pct {
            let reason = format!(
                "Daily loss {}% breached -{}%",
                m.daily_loss_pct.round_dp(2),
                c.daily_loss_limit_pct
            );
            Some((HaltState::DailyHalt, c.daily_halt_days, reason))
        } else if after_trade && m.consecutive_losses >= c.consecutive_loss_limit {
            let reason = format!("{} consecutive losing trades", m.consecutive_losses);
            Some((HaltState::DailyHalt, c.daily_halt_days, reason))
        } else {
            None
        }
    }

    fn evaluate(&mut self, now: NaiveDateTime, after_trade: bool) -> HaltState {
        if let Some((state, days, reason)) = self.matching_rule(after_trade) {
            self.apply_halt(now, state, days, reason);
        }
        // A losing streak cuts size even when a loss limit is the rule that halts.
        if after_trade && self.metrics.consecutive_losses >= self.config.consecutive_loss_limit {
            self.metrics.size_reduction_active = true;
            self.metrics.size_reduction_until =
                Some(now + Duration::days(self.config.size_reduction_days));
        }
        self.metrics.halt_state
    }

    fn apply_halt(&mut self, now: NaiveDateTime, state: HaltState, days: i64, reason: String) {
        self.expire(now);
        let current = self.metrics.halt_state;
        if current != HaltState::Active && state.severity() <= current.severity() {
            return;
        }

        let until = now + Duration::days(days);
        info!(?state, %until, %reason, "Circuit breaker halt");
        self.metrics.halt_state = state;
        self.metrics.halt_until = Some(until);
        self.metrics.halt_reason = Some(reason.clone());
        self.halt_history.push(HaltEvent {
            at: now,
            state,
            until,
            reason,
        });
    }

    fn expire(&mut self, now: NaiveDateTime) {
        let m = &mut self.metrics;
        if m.halt_state != HaltState::Active && m.halt_until.map_or(true, |until| now >= until) {
            info!(state = ?m.halt_state, "Circuit breaker halt expired, trading resumed");
            m.halt_state = HaltState::Active;
            m.halt_until = None;
            m.halt_reason = None;
        }
        if m.size_reduction_active && m.size_reduction_until.map_or(true, |until| now >= until) {
            m.size_reduction_active = false;
            m.size_reduction_until = None;
        }
    }
}

/// Percent change from `start` to `current`; zero when `start` is not positive.
fn change_pct(start: Decimal, current: Decimal) -> Decimal {
    if start <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (current - start) / start * Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig::default(), dec!(1_000_000))
    }

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.daily_loss_limit_pct, dec!(1.5));
        assert_eq!(config.weekly_loss_limit_pct, dec!(4.0));
        assert_eq!(config.monthly_loss_limit_pct, dec!(10.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normal_operation() {
        let mut cb = breaker();
        assert_eq!(cb.update_equity(at(15, 10), dec!(1_005_000)), HaltState::Active);
        assert!(!cb.is_halted(at(15, 10)));
        assert_eq!(cb.size_multiplier(at(15, 10)), 1.0);
    }

    #[test]
    fn test_daily_loss_halt() {
        let mut cb = breaker();
        assert_eq!(cb.update_equity(at(15, 10), dec!(986_000)), HaltState::Active);
        assert_eq!(cb.update_equity(at(15, 11), dec!(985_000)), HaltState::DailyHalt);
        assert!(cb.is_halted(at(15, 12)));
        assert_eq!(cb.halt_history().len(), 1);
    }

    #[test]
    fn test_monthly_boundary_is_exact() {
        let mut cb = breaker();
        cb.reset_weekly(dec!(900_100));
        cb.reset_daily(dec!(900_100));
        assert_eq!(cb.update_equity(at(15, 10), dec!(900_100)), HaltState::Active);
        assert_eq!(cb.metrics().monthly_loss_pct, dec!(-9.99));

        cb.reset_weekly(dec!(900_000));
        cb.reset_daily(dec!(900_000));
        assert_eq!(cb.update_equity(at(15, 11), dec!(900_000)), HaltState::MonthlyHalt);
        assert_eq!(cb.metrics().monthly_loss_pct, dec!(-10));
        assert_eq!(cb.metrics().halt_until, Some(at(22, 11)));
    }

    #[test]
    fn test_consecutive_losses() {
        let mut cb = breaker();
        cb.record_trade(at(15, 10), dec!(-100), dec!(999_900));
        cb.record_trade(at(15, 11), dec!(-100), dec!(999_800));
        assert!(!cb.is_halted(at(15, 11)));

        let state = cb.record_trade(at(15, 12), dec!(-100), dec!(999_700));
        assert_eq!(state, HaltState::DailyHalt);
        assert!(cb.is_halted(at(15, 12)));
        assert_eq!(cb.size_multiplier(at(15, 12)), 0.5);
        assert_eq!(cb.metrics().consecutive_losses, 3);
    }

    #[test]
    fn test_streak_reduces_size_when_loss_limit_halts_first() {
        let mut cb = breaker();
        cb.record_trade(at(15, 10), dec!(-6000), dec!(994_000));
        cb.record_trade(at(15, 11), dec!(-6000), dec!(988_000));
        assert!(!cb.is_halted(at(15, 11)));

        // -1.8% on the day: the daily limit matches before the streak rule.
        let state = cb.record_trade(at(15, 12), dec!(-6000), dec!(982_000));
        assert_eq!(state, HaltState::DailyHalt);
        assert!(cb.metrics().halt_reason.as_deref().unwrap().starts_with("Daily loss"));
        assert_eq!(cb.size_multiplier(at(15, 12)), 0.5);

        let mut cb = breaker();
        cb.record_trade(at(15, 10), dec!(-15000), dec!(985_000));
        cb.record_trade(at(15, 11), dec!(-15000), dec!(970_000));
        let state = cb.record_trade(at(15, 12), dec!(-15000), dec!(955_000));
        assert_eq!(state, HaltState::WeeklyHalt);
        assert_eq!(cb.size_multiplier(at(15, 12)), 0.5);
        assert!(cb.metrics().size_reduction_active);
    }

    #[test]
    fn test_winning_trade_resets_streak() {
        let mut cb = breaker();
        cb.record_trade(at(15, 10), dec!(-100), dec!(999_900));
        cb.record_trade(at(15, 11), dec!(-100), dec!(999_800));
        cb.record_trade(at(15, 12), dec!(0), dec!(999_800));
        let state = cb.record_trade(at(15, 13), dec!(-100), dec!(999_700));
        assert_eq!(state, HaltState::Active);
        assert_eq!(cb.metrics().consecutive_losses, 1);
    }

    #[test]
    fn test_lazy_expiry() {
        let mut cb = breaker();
        cb.update_equity(at(15, 10), dec!(980_000));
        assert_eq!(cb.metrics().halt_state, HaltState::DailyHalt);

        // State is not touched until polled
        assert!(cb.is_halted(at(16, 9)));
        assert_eq!(cb.metrics().halt_state, HaltState::DailyHalt);
        assert!(!cb.is_halted(at(16, 10)));
        assert_eq!(cb.metrics().halt_state, HaltState::Active);
        assert_eq!(cb.metrics().halt_until, None);
    }

    #[test]
    fn test_size_reduction_outlives_halt_check() {
        let mut cb = breaker();
        for hour in 10..13 {
            cb.record_trade(at(15, hour), dec!(-10), dec!(1_000_000));
        }
        assert_eq!(cb.size_multiplier(at(16, 11)), 0.5);
        assert_eq!(cb.size_multiplier(at(16, 12)), 1.0);
    }

    #[test]
    fn test_no_downgrade() {
        let mut cb = breaker();
        cb.update_equity(at(15, 10), dec!(950_000));
        assert_eq!(cb.metrics().halt_state, HaltState::WeeklyHalt);
        let until = cb.metrics().halt_until;

        cb.assess_signal(at(15, 11), 0.9);
        cb.reset_weekly(dec!(950_000));
        cb.update_equity(at(15, 12), dec!(935_000));
        assert_eq!(cb.metrics().halt_state, HaltState::WeeklyHalt);
        assert_eq!(cb.metrics().halt_until, until);
        assert_eq!(cb.halt_history().len(), 1);
    }

    #[test]
    fn test_preemptive_halt() {
        let mut cb = breaker();
        assert_eq!(cb.assess_signal(at(15, 10), 0.6), HaltState::Active);
        assert_eq!(cb.assess_signal(at(15, 10), 0.61), HaltState::PreemptiveHalt);

        // Upgraded by a more severe halt
        cb.update_equity(at(15, 11), dec!(890_000));
        assert_eq!(cb.metrics().halt_state, HaltState::MonthlyHalt);
    }

    #[test]
    fn test_status_snapshot() {
        let mut cb = breaker();
        cb.update_equity(at(15, 10), dec!(980_000));
        let status = cb.status(at(15, 11));
        assert!(status.halted);
        assert_eq!(status.metrics.halt_state, HaltState::DailyHalt);
        assert!(status.metrics.halt_reason.is_some());
        assert_eq!(status.halts_triggered, 1);
        assert!(serde_json::to_string(&status).is_ok());
    }
}
