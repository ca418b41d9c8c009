//! Core backtesting engine.
//!
//! Runs the bar-by-bar simulation loop:
//! 1. Validate the bar and update volatility/regime history
//! 2. Roll the calendar (daily record, days held, circuit breaker windows)
//! 3. Mark open positions against a synthetic quote
//! 4. Apply the daily loss brake
//! 5. Skip trading while the circuit breaker is halted
//! 6. Check exits, then screen for new entries (a candidate's loss
//!    probability goes through the circuit breaker first)
//! 7. Recompute portfolio Greeks and record mark-to-market equity
//!
//! The engine owns the capital/margin ledger. Collaborators (volatility,
//! regime, structure selection, margin) are trait objects supplied at
//! construction.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analytics::VolatilityEstimator;
use crate::data::{dec_to_f64, Bar};
use crate::metrics::{BreakdownStats, MetricsCalculator, MonthlyReturn, PerformanceMetrics};
use crate::pricing::{time_to_expiry, SyntheticChainGenerator};
use crate::regime::{MarketRegime, RegimeClassifier, RegimeDetector};
use crate::risk::{
    CircuitBreaker, CircuitBreakerStatus, GreekHedger, GreekHedgerStatus, HaltEvent, HaltState,
    HedgeContext, LegExposure,
};
use crate::strategy::{CandidateLeg, SelectionContext, ShortStrangle, StructureCandidate, StructureSelector};
use crate::validation::{validate_bar, GreeksResolutionStats, GreeksValidator};

use super::commission::{CommissionModel, TradeCosts};
use super::config::{BacktestConfig, ConfigError};
use super::margin::{MarginBreakdown, MarginCalculator, MarginContext};
use super::trade::{CompletedTrade, ExitReason, PositionLeg, SimulatedPosition};

/// Volatility estimates are clamped to this range before use.
pub const MIN_ESTIMATED_VOL: f64 = 0.05;
pub const MAX_ESTIMATED_VOL: f64 = 1.0;

/// Mark-to-market equity at the close of a bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: Decimal,
    pub capital: Decimal,
    pub margin_blocked: Decimal,
    pub unrealized_pnl: Decimal,
    pub open_positions: usize,
}

/// Drawdown from the running equity peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub timestamp: NaiveDateTime,
    pub drawdown: Decimal,
    pub drawdown_pct: f64,
}

/// Realized results of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub realized_pnl: Decimal,
    pub trades_closed: usize,
    pub start_equity: Decimal,
    pub end_equity: Decimal,
}

/// Bar and decision counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub bars_seen: usize,
    pub warmup_bars: usize,
    pub bars_processed: usize,
    pub skipped_invalid_bar: usize,
    pub skipped_no_volatility: usize,
    pub chain_unavailable: usize,
    pub mark_failures: usize,
    pub halted_bars: usize,
    pub brake_triggers: usize,
    pub entries: usize,
    pub exits: usize,
    pub rejected_margin: usize,
    pub rejected_utilization: usize,
    pub rejected_drawdown: usize,
    pub rejected_size: usize,
    pub rejected_greek_caps: usize,
    pub rejected_pricing: usize,
    pub rejected_loss_probability: usize,
    pub rebalance_signals: usize,
}

/// Why an entry was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Free capital does not cover the structure's margin.
    InsufficientMargin { required: Decimal, free: Decimal },
    /// Blocked margin would exceed the utilization ceiling.
    UtilizationCeiling { projected_pct: f64, limit_pct: f64 },
    /// Drawdown from peak equity is at or above the entry limit.
    DrawdownLimit { drawdown_pct: f64, limit_pct: f64 },
    /// Size reduction rounded a leg down to zero lots.
    SizeReducedToZero { multiplier: f64 },
    /// Margin could not be computed for the structure.
    MarginUnavailable(String),
}

/// Outcome of the entry checks for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Accepted {
        legs: Vec<CandidateLeg>,
        margin: MarginBreakdown,
    },
    Rejected(RejectReason),
}

/// Result of a completed backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub instrument: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub drawdown_curve: Vec<DrawdownPoint>,
    pub trades: Vec<CompletedTrade>,
    pub strategy_breakdown: BTreeMap<String, BreakdownStats>,
    pub regime_breakdown: BTreeMap<String, BreakdownStats>,
    pub regime_distribution: BTreeMap<MarketRegime, usize>,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub daily_records: Vec<DailyRecord>,
    pub halt_events: Vec<HaltEvent>,
    pub counters: EngineCounters,
    pub greeks_resolution: GreeksResolutionStats,
    pub circuit_breaker: Option<CircuitBreakerStatus>,
    pub greek_hedger: GreekHedgerStatus,
}

impl BacktestResult {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        let c = &self.counters;
        format!(
            "Backtest: {} ({} -> {})\n\
             Bars: {} seen, {} warmup, {} processed, {} skipped, {} halted\n\
             Entries: {}, exits: {}, rejected: {} margin / {} utilization / {} drawdown / {} size / {} greek caps / {} loss probability\n\
             Halts: {}, brake triggers: {}\n\n{}",
            self.instrument,
            self.start.map(|t| t.date().to_string()).unwrap_or_default(),
            self.end.map(|t| t.date().to_string()).unwrap_or_default(),
            c.bars_seen,
            c.warmup_bars,
            c.bars_processed,
            c.skipped_invalid_bar + c.skipped_no_volatility,
            c.halted_bars,
            c.entries,
            c.exits,
            c.rejected_margin,
            c.rejected_utilization,
            c.rejected_drawdown,
            c.rejected_size,
            c.rejected_greek_caps,
            c.rejected_loss_probability,
            self.halt_events.len(),
            c.brake_triggers,
            self.metrics.summary(),
        )
    }
}

/// The bar-by-bar simulation engine.
pub struct BacktestSimulationEngine {
    config: BacktestConfig,
    chain_generator: SyntheticChainGenerator,
    volatility: Box<dyn VolatilityEstimator>,
    regime: Box<dyn RegimeDetector>,
    selector: Box<dyn StructureSelector>,
    margin: Box<dyn MarginCalculator>,
    circuit_breaker: CircuitBreaker,
    hedger: GreekHedger,
    greeks: GreeksValidator,

    // Ledger
    capital: Decimal,
    margin_blocked: Decimal,
    peak_equity: Decimal,
    positions: BTreeMap<u64, SimulatedPosition>,
    next_position_id: u64,

    // History
    closes: Vec<f64>,
    last_timestamp: Option<NaiveDateTime>,
    first_timestamp: Option<NaiveDateTime>,
    trades: Vec<CompletedTrade>,
    equity_curve: Vec<EquityPoint>,
    drawdown_curve: Vec<DrawdownPoint>,
    daily_records: Vec<DailyRecord>,
    regime_counts: BTreeMap<MarketRegime, usize>,
    counters: EngineCounters,

    // Calendar
    current_day: Option<NaiveDate>,
    day_start_equity: Decimal,
    day_realized: Decimal,
    day_trades: usize,
    brake_sessions_remaining: u32,
}

impl BacktestSimulationEngine {
    /// Engine wired with the reference collaborators described by `config`.
    pub fn new(config: BacktestConfig) -> Result<Self, ConfigError> {
        let volatility = Box::new(config.volatility.clone());
        let regime = Box::new(RegimeClassifier::new(config.regime.clone()));
        let selector = Box::new(ShortStrangle::new(config.strangle.clone(), config.pricer));
        let margin = Box::new(config.margin.clone());
        Self::with_components(config, volatility, regime, selector, margin)
    }

    /// Engine with caller-supplied collaborators.
    pub fn with_components(
        config: BacktestConfig,
        volatility: Box<dyn VolatilityEstimator>,
        regime: Box<dyn RegimeDetector>,
        selector: Box<dyn StructureSelector>,
        margin: Box<dyn MarginCalculator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let capital = config.initial_capital;
        Ok(Self {
            chain_generator: SyntheticChainGenerator::new(
                config.pricer,
                config.instrument,
                config.chain.clone(),
            ),
            volatility,
            regime,
            selector,
            margin,
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker.clone(), capital),
            hedger: GreekHedger::new(config.hedger.clone()),
            greeks: GreeksValidator::new(config.pricer),
            capital,
            margin_blocked: Decimal::ZERO,
            peak_equity: capital,
            positions: BTreeMap::new(),
            next_position_id: 1,
            closes: Vec::new(),
            last_timestamp: None,
            first_timestamp: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            drawdown_curve: Vec::new(),
            daily_records: Vec::new(),
            regime_counts: BTreeMap::new(),
            counters: EngineCounters::default(),
            current_day: None,
            day_start_equity: capital,
            day_realized: Decimal::ZERO,
            day_trades: 0,
            brake_sessions_remaining: 0,
            config,
        })
    }

    /// Run over an ordered bar sequence and assemble the result.
    pub fn run(mut self, bars: &[Bar]) -> BacktestResult {
        info!(
            instrument = self.config.instrument.symbol(),
            bars = bars.len(),
            capital = %self.config.initial_capital,
            strategy = self.selector.name(),
            "Starting backtest"
        );
        for bar in bars {
            self.step(bar);
        }
        self.finish()
    }

    /// Process one bar.
    pub fn step(&mut self, bar: &Bar) {
        self.counters.bars_seen += 1;

        if let Err(reason) = validate_bar(bar) {
            warn!(timestamp = %bar.timestamp, %reason, "Skipping invalid bar");
            self.counters.skipped_invalid_bar += 1;
            return;
        }
        if let Some(last) = self.last_timestamp {
            if bar.timestamp <= last {
                warn!(timestamp = %bar.timestamp, previous = %last, "Skipping out-of-order bar");
                self.counters.skipped_invalid_bar += 1;
                return;
            }
        }
        self.last_timestamp = Some(bar.timestamp);

        self.push_close(bar.close_f64());
        let vol = self
            .volatility
            .estimate(&self.closes)
            .map(|v| v.clamp(MIN_ESTIMATED_VOL, MAX_ESTIMATED_VOL));
        let regime = self.regime.classify(bar, vol.map(|v| v * 100.0));

        if self.counters.warmup_bars < self.config.warmup_bars {
            self.counters.warmup_bars += 1;
            return;
        }

        let Some(vol) = vol else {
            warn!(timestamp = %bar.timestamp, "No volatility estimate, skipping bar");
            self.counters.skipped_no_volatility += 1;
            return;
        };

        self.counters.bars_processed += 1;
        self.first_timestamp.get_or_insert(bar.timestamp);
        *self.regime_counts.entry(regime).or_default() += 1;

        let now = bar.timestamp;
        self.roll_day(bar.date());
        self.mark_positions(bar, vol);

        let equity = self.equity();
        self.circuit_breaker.update_equity(now, equity);

        self.apply_daily_brake(now, equity);

        if self.circuit_breaker.is_halted(now) {
            self.counters.halted_bars += 1;
        } else {
            self.check_exits(now, regime);
            self.refresh_greeks(bar);
            self.screen_and_enter(bar, regime, vol);
        }

        self.refresh_greeks(bar);
        if self.hedger.should_rebalance() {
            self.counters.rebalance_signals += 1;
        }

        self.record_equity(now);
    }

    /// Close what is still open and assemble the result.
    pub fn finish(mut self) -> BacktestResult {
        if let Some(now) = self.last_timestamp {
            let open: Vec<u64> = self.positions.keys().copied().collect();
            if !open.is_empty() {
                for id in open {
                    self.close_position(id, ExitReason::EndOfBacktest, now);
                }
                // Replace the last mark with the realized figure.
                if self.equity_curve.last().map(|p| p.timestamp) == Some(now) {
                    self.equity_curve.pop();
                    self.drawdown_curve.pop();
                }
                self.record_equity(now);
            }
        }
        self.finalize_day();

        let initial = self.config.initial_capital;
        let metrics = MetricsCalculator::calculate(
            &self.trades,
            initial,
            Some(self.equity_curve.as_slice()),
            self.config.risk_free_rate,
        );
        let circuit_breaker = self.last_timestamp.map(|now| self.circuit_breaker.status(now));

        info!(
            trades = self.trades.len(),
            final_capital = %self.capital,
            return_pct = metrics.total_return_pct,
            halts = self.circuit_breaker.halt_history().len(),
            "Backtest complete"
        );

        BacktestResult {
            instrument: self.config.instrument.symbol().to_string(),
            start: self.first_timestamp,
            end: self.last_timestamp,
            initial_capital: initial,
            final_capital: self.capital,
            strategy_breakdown: MetricsCalculator::by_strategy(&self.trades),
            regime_breakdown: MetricsCalculator::by_regime(&self.trades),
            monthly_returns: MetricsCalculator::monthly_returns(&self.trades, initial),
            metrics,
            equity_curve: self.equity_curve,
            drawdown_curve: self.drawdown_curve,
            trades: self.trades,
            regime_distribution: self.regime_counts,
            daily_records: self.daily_records,
            halt_events: self.circuit_breaker.halt_history().to_vec(),
            counters: self.counters,
            greeks_resolution: self.greeks.stats().clone(),
            circuit_breaker,
            greek_hedger: self.hedger.status(),
        }
    }

    /// Blocked margin equals the sum over open positions and is never negative.
    pub fn margin_ledger_consistent(&self) -> bool {
        let sum: Decimal = self.positions.values().map(|p| p.margin_blocked).sum();
        self.margin_blocked >= Decimal::ZERO
            && sum == self.margin_blocked
            && self.positions.values().all(|p| p.margin_blocked >= Decimal::ZERO)
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    pub fn margin_blocked(&self) -> Decimal {
        self.margin_blocked
    }

    /// Capital plus unrealized P&L at the latest marks.
    pub fn equity(&self) -> Decimal {
        self.capital + self.unrealized_pnl()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &SimulatedPosition> {
        self.positions.values()
    }

    pub fn trades(&self) -> &[CompletedTrade] {
        &self.trades
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl()).sum()
    }

    fn push_close(&mut self, close: f64) {
        self.closes.push(close);
        let keep = self.volatility.required_history().max(1);
        if self.closes.len() > keep * 4 {
            let excess = self.closes.len() - keep;
            self.closes.drain(..excess);
        }
    }

    /// Start a new session when the date changes.
    fn roll_day(&mut self, date: NaiveDate) {
        let equity = self.equity();
        let Some(prev) = self.current_day else {
            self.current_day = Some(date);
            self.day_start_equity = equity;
            return;
        };
        if prev == date {
            return;
        }

        self.finalize_day();

        for position in self.positions.values_mut() {
            position.days_held += 1;
        }

        self.circuit_breaker.reset_daily(equity);
        if prev.iso_week() != date.iso_week() {
            self.circuit_breaker.reset_weekly(equity);
        }
        if (prev.year(), prev.month()) != (date.year(), date.month()) {
            self.circuit_breaker.reset_monthly(equity);
        }

        self.brake_sessions_remaining = self.brake_sessions_remaining.saturating_sub(1);
        self.current_day = Some(date);
        self.day_start_equity = equity;
        self.day_realized = Decimal::ZERO;
        self.day_trades = 0;
    }

    fn finalize_day(&mut self) {
        let Some(date) = self.current_day else {
            return;
        };
        if self.daily_records.last().map(|r| r.date) == Some(date) {
            return;
        }
        self.daily_records.push(DailyRecord {
            date,
            realized_pnl: self.day_realized,
            trades_closed: self.day_trades,
            start_equity: self.day_start_equity,
            end_equity: self.equity(),
        });
    }

    /// Re-quote every open leg at the bar's close.
    fn mark_positions(&mut self, bar: &Bar, vol: f64) {
        let generator = &self.chain_generator;
        let validator = &mut self.greeks;
        let mut failures = 0;

        for position in self.positions.values_mut() {
            for leg in &mut position.legs {
                match generator.quote_contract(
                    bar.close,
                    leg.contract.strike,
                    leg.contract.option_type,
                    leg.contract.expiry,
                    bar.timestamp,
                    vol,
                ) {
                    Ok(quote) => {
                        leg.current_price = quote.mid;
                        leg.current_greeks = validator.resolve(&quote).greeks();
                    }
                    Err(e) => {
                        warn!(position = position.id, error = %e, "Failed to mark leg, keeping last mark");
                        failures += 1;
                    }
                }
            }
        }
        self.counters.mark_failures += failures;
    }

    /// Flatten the book when the session loss breaches the brake limit.
    fn apply_daily_brake(&mut self, now: NaiveDateTime, equity: Decimal) {
        if self.brake_sessions_remaining > 0 || self.day_start_equity <= Decimal::ZERO {
            return;
        }
        let day_change_pct =
            dec_to_f64(equity - self.day_start_equity) / dec_to_f64(self.day_start_equity) * 100.0;
        if day_change_pct > -self.config.daily_brake_loss_pct {
            return;
        }

        info!(
            %now,
            loss_pct = day_change_pct,
            limit = self.config.daily_brake_loss_pct,
            positions = self.positions.len(),
            "Daily loss brake triggered, flattening"
        );
        self.counters.brake_triggers += 1;
        self.brake_sessions_remaining = self.config.brake_flat_days + 1;

        let open: Vec<u64> = self.positions.keys().copied().collect();
        for id in open {
            self.close_position(id, ExitReason::DailyLossBrake, now);
        }
    }

    fn check_exits(&mut self, now: NaiveDateTime, regime: MarketRegime) {
        let date = now.date();
        let mut exits = Vec::new();
        for (id, position) in self.positions.iter_mut() {
            let reason = match position.check_exit(date) {
                Some(reason) => Some(reason),
                None if regime == MarketRegime::Chaos => Some(ExitReason::RegimeChaos),
                None => None,
            };
            if let Some(reason) = reason {
                exits.push((*id, reason));
            }
        }

        for (id, reason) in exits {
            self.close_position(id, reason, now);
        }
    }

    /// Realize a position's P&L net of costs and release its margin.
    fn close_position(&mut self, id: u64, reason: ExitReason, now: NaiveDateTime) {
        let Some(position) = self.positions.remove(&id) else {
            return;
        };

        let gross_pnl = position.unrealized_pnl();
        let costs = TradeCosts::compute(
            &self.config.commission,
            &self.config.slippage,
            CommissionModel::round_trip_orders(position.legs.len()),
            position.turnover(),
            gross_pnl,
        );
        let net_pnl = gross_pnl - costs.total;

        let capital_before = self.capital;
        let margin_before = self.margin_blocked;
        self.capital = capital_before + gross_pnl - costs.total;
        self.margin_blocked = margin_before - position.margin_blocked;

        let pnl_pct = if position.margin_blocked > Decimal::ZERO {
            dec_to_f64(net_pnl) / dec_to_f64(position.margin_blocked) * 100.0
        } else {
            0.0
        };

        let trade = CompletedTrade {
            id: position.id,
            strategy: position.strategy.clone(),
            regime: position.entry_regime,
            entry_date: position.entry_date(),
            exit_date: now.date(),
            entry_price: position.entry_price,
            exit_price: position.current_price(),
            gross_pnl,
            costs,
            net_pnl,
            pnl_pct,
            exit_reason: reason,
            days_held: position.days_held,
            margin_blocked: position.margin_blocked,
            capital_before,
            capital_after: self.capital,
            margin_before,
            margin_after: self.margin_blocked,
        };

        debug!(
            id,
            strategy = %trade.strategy,
            reason = reason.as_str(),
            gross = %gross_pnl,
            costs = %costs.total,
            net = %net_pnl,
            days = trade.days_held,
            "Closed position"
        );

        self.day_realized += net_pnl;
        self.day_trades += 1;
        self.counters.exits += 1;
        self.trades.push(trade);

        let equity = self.equity();
        self.circuit_breaker.record_trade(now, net_pnl, equity);
    }

    fn refresh_greeks(&mut self, bar: &Bar) {
        let legs: Vec<LegExposure> = self
            .positions
            .values()
            .flat_map(|p| p.legs.iter())
            .map(|l| LegExposure {
                greeks: l.current_greeks,
                units: l.units(),
            })
            .collect();
        let ctx = HedgeContext {
            spot: bar.close_f64(),
            equity: self.equity(),
            lot_size: self.config.instrument.lot_size(),
        };
        self.hedger.compute(&legs, &ctx);
    }

    fn screen_and_enter(&mut self, bar: &Bar, regime: MarketRegime, vol: f64) {
        if self.brake_sessions_remaining > 0 {
            return;
        }
        if !self.hedger.check_short_greek_caps().is_empty() {
            self.counters.rejected_greek_caps += 1;
            return;
        }

        let now = bar.timestamp;
        let expiry = self
            .config
            .instrument
            .next_expiry(bar.date(), self.selector.min_entry_dte());
        let chain = match self.chain_generator.generate(bar.close, now, expiry, vol) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(%now, %expiry, error = %e, "Chain unavailable, no entries this bar");
                self.counters.chain_unavailable += 1;
                return;
            }
        };

        let candidates = self.selector.select(&SelectionContext {
            timestamp: now,
            regime,
            chain: &chain,
            vol,
            open_positions: self.positions.len(),
        });

        let ttm = time_to_expiry(now, expiry);
        for candidate in candidates {
            if let Some(probability) = candidate.loss_probability {
                let state = self.circuit_breaker.assess_signal(now, probability);
                if state != HaltState::Active {
                    info!(
                        %now,
                        strategy = %candidate.strategy,
                        loss_probability = probability,
                        ?state,
                        "Signal refused, no further entries this bar"
                    );
                    self.counters.rejected_loss_probability += 1;
                    break;
                }
            }

            match self.evaluate_entry(&candidate, bar, vol, ttm) {
                EntryDecision::Accepted { legs, margin } => {
                    self.open_position(candidate, legs, margin, regime, now);
                }
                EntryDecision::Rejected(reason) => {
                    debug!(strategy = %candidate.strategy, ?reason, "Entry rejected");
                    self.count_rejection(&reason);
                }
            }
        }
    }

    /// Size, margin, utilization and drawdown checks for one candidate.
    fn evaluate_entry(
        &mut self,
        candidate: &StructureCandidate,
        bar: &Bar,
        vol: f64,
        ttm: f64,
    ) -> EntryDecision {
        let multiplier = self.circuit_breaker.size_multiplier(bar.timestamp);
        let mut legs = candidate.legs.clone();
        for leg in &mut legs {
            let lots = (leg.contract.quantity as f64 * multiplier).floor() as u32;
            if lots == 0 {
                return EntryDecision::Rejected(RejectReason::SizeReducedToZero { multiplier });
            }
            leg.contract.quantity = lots;
        }

        let priced: Vec<_> = legs.iter().map(|l| (l.contract.clone(), l.price)).collect();
        let ctx = MarginContext {
            spot: bar.close_f64(),
            vol,
            ttm,
            lot_size: self.config.instrument.lot_size(),
        };
        let margin = match self.margin.required_margin(&priced, &ctx) {
            Ok(m) => m,
            Err(e) => return EntryDecision::Rejected(RejectReason::MarginUnavailable(e.to_string())),
        };

        let free = self.capital - self.margin_blocked;
        if free < margin.total {
            return EntryDecision::Rejected(RejectReason::InsufficientMargin {
                required: margin.total,
                free,
            });
        }

        let projected_pct =
            dec_to_f64(self.margin_blocked + margin.total) / dec_to_f64(self.capital) * 100.0;
        if projected_pct > self.config.max_margin_utilization_pct {
            return EntryDecision::Rejected(RejectReason::UtilizationCeiling {
                projected_pct,
                limit_pct: self.config.max_margin_utilization_pct,
            });
        }

        let drawdown_pct = self.drawdown_pct(self.equity());
        if drawdown_pct >= self.config.max_entry_drawdown_pct {
            return EntryDecision::Rejected(RejectReason::DrawdownLimit {
                drawdown_pct,
                limit_pct: self.config.max_entry_drawdown_pct,
            });
        }

        EntryDecision::Accepted { legs, margin }
    }

    fn count_rejection(&mut self, reason: &RejectReason) {
        let c = &mut self.counters;
        match reason {
            RejectReason::InsufficientMargin { .. } => c.rejected_margin += 1,
            RejectReason::UtilizationCeiling { .. } => c.rejected_utilization += 1,
            RejectReason::DrawdownLimit { .. } => c.rejected_drawdown += 1,
            RejectReason::SizeReducedToZero { .. } => c.rejected_size += 1,
            RejectReason::MarginUnavailable(_) => c.rejected_pricing += 1,
        }
    }

    fn open_position(
        &mut self,
        candidate: StructureCandidate,
        legs: Vec<CandidateLeg>,
        margin: MarginBreakdown,
        regime: MarketRegime,
        now: NaiveDateTime,
    ) {
        let id = self.next_position_id;
        self.next_position_id += 1;

        let lot_size = self.config.instrument.lot_size();
        let legs: Vec<PositionLeg> = legs
            .into_iter()
            .map(|l| PositionLeg {
                contract: l.contract,
                lot_size,
                entry_price: l.price,
                current_price: l.price,
                entry_greeks: l.greeks,
                current_greeks: l.greeks,
            })
            .collect();

        let position = SimulatedPosition::new(
            id,
            candidate.strategy,
            regime,
            now,
            legs,
            margin.total,
            candidate.exit_rules,
            self.capital,
        );

        debug!(
            id,
            strategy = %position.strategy,
            %regime,
            credit = %position.entry_price,
            margin = %margin.total,
            "Opened position"
        );

        self.margin_blocked += margin.total;
        self.counters.entries += 1;
        self.positions.insert(id, position);
    }

    fn drawdown_pct(&self, equity: Decimal) -> f64 {
        if self.peak_equity <= Decimal::ZERO || equity >= self.peak_equity {
            return 0.0;
        }
        dec_to_f64(self.peak_equity - equity) / dec_to_f64(self.peak_equity) * 100.0
    }

    fn record_equity(&mut self, now: NaiveDateTime) {
        let unrealized = self.unrealized_pnl();
        let equity = self.capital + unrealized;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }

        self.equity_curve.push(EquityPoint {
            timestamp: now,
            equity,
            capital: self.capital,
            margin_blocked: self.margin_blocked,
            unrealized_pnl: unrealized,
            open_positions: self.positions.len(),
        });
        self.drawdown_curve.push(DrawdownPoint {
            timestamp: now,
            drawdown: (self.peak_equity - equity).max(Decimal::ZERO),
            drawdown_pct: self.drawdown_pct(equity),
        });
    }
}
