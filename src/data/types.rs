//! Core data types for options simulation.
//!
//! Money (premiums, strikes, spot) is carried as `Decimal` so ledger
//! arithmetic stays exact; pricing and Greeks are `f64`.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CE" | "CALL" => Some(Self::Call),
            "P" | "PE" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

/// Position side of a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

/// Greeks for an option contract (per unit of underlying).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    /// Per calendar day.
    pub theta: f64,
    /// Per 1 vol point.
    pub vega: f64,
    /// Per 1 rate point.
    pub rho: f64,
}

impl Greeks {
    pub fn is_finite(&self) -> bool {
        self.delta.is_finite()
            && self.gamma.is_finite()
            && self.theta.is_finite()
            && self.vega.is_finite()
            && self.rho.is_finite()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
            rho: self.rho * factor,
        }
    }

    pub fn add(&self, other: &Greeks) -> Self {
        Self {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            theta: self.theta + other.theta,
            vega: self.vega + other.vega,
            rho: self.rho + other.rho,
        }
    }
}

/// A tradeable option contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    /// Number of lots.
    pub quantity: u32,
    pub side: Side,
}

impl OptionContract {
    pub fn new(
        strike: Decimal,
        expiry: NaiveDate,
        option_type: OptionType,
        quantity: u32,
        side: Side,
    ) -> Self {
        Self {
            strike,
            expiry,
            option_type,
            quantity,
            side,
        }
    }

    /// Signed number of underlying units (lots * lot size, negative when short).
    pub fn signed_units(&self, lot_size: u32) -> i64 {
        self.side.sign() * self.quantity as i64 * lot_size as i64
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }
}

/// A single priced option at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Underlying symbol (e.g., "NIFTY").
    pub underlying: String,

    /// Valuation timestamp.
    pub quoted_at: NaiveDateTime,

    /// Option expiration date.
    pub expiration: NaiveDate,

    /// Days to expiration.
    pub dte: i32,

    pub strike: Decimal,

    pub option_type: OptionType,

    /// Underlying price at quote time.
    pub spot: Decimal,

    /// Model value.
    pub theoretical_price: Decimal,

    pub bid: Decimal,

    pub ask: Decimal,

    pub mid: Decimal,

    /// Implied volatility (annualized, decimal).
    pub iv: f64,

    /// Greeks supplied by the chain source, if any.
    pub greeks: Option<Greeks>,

    /// Strike / spot.
    pub moneyness: f64,
}

impl OptionQuote {
    /// Bid-ask spread as a fraction of mid.
    pub fn spread_pct(&self) -> f64 {
        if self.mid.is_zero() {
            return 0.0;
        }
        dec_to_f64((self.ask - self.bid) / self.mid)
    }

    /// Delta from the supplied Greeks, zero when absent.
    pub fn delta(&self) -> f64 {
        self.greeks.map(|g| g.delta).unwrap_or(0.0)
    }
}

/// All options for a single expiration date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsChain {
    pub underlying: String,

    pub quoted_at: NaiveDateTime,

    pub spot: Decimal,

    pub expiration: NaiveDate,

    pub dte: i32,

    /// Calls sorted by strike.
    pub calls: Vec<OptionQuote>,

    /// Puts sorted by strike.
    pub puts: Vec<OptionQuote>,
}

impl OptionsChain {
    pub fn new(
        underlying: &str,
        quoted_at: NaiveDateTime,
        spot: Decimal,
        expiration: NaiveDate,
        dte: i32,
    ) -> Self {
        Self {
            underlying: underlying.to_string(),
            quoted_at,
            spot,
            expiration,
            dte,
            calls: Vec::new(),
            puts: Vec::new(),
        }
    }

    /// Add a quote to the appropriate side.
    pub fn add_quote(&mut self, quote: OptionQuote) {
        match quote.option_type {
            OptionType::Call => self.calls.push(quote),
            OptionType::Put => self.puts.push(quote),
        }
    }

    /// Sort both sides by strike.
    pub fn sort(&mut self) {
        self.calls.sort_by(|a, b| a.strike.cmp(&b.strike));
        self.puts.sort_by(|a, b| a.strike.cmp(&b.strike));
    }

    /// Get all strikes available in this chain.
    pub fn strikes(&self) -> Vec<Decimal> {
        let mut strikes: Vec<_> = self
            .calls
            .iter()
            .chain(self.puts.iter())
            .map(|q| q.strike)
            .collect();
        strikes.sort();
        strikes.dedup();
        strikes
    }

    pub fn quote(&self, strike: Decimal, option_type: OptionType) -> Option<&OptionQuote> {
        let side = match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        };
        side.iter().find(|q| q.strike == strike)
    }

    /// Strike closest to spot.
    pub fn atm_strike(&self) -> Option<Decimal> {
        self.strikes()
            .into_iter()
            .min_by_key(|k| (*k - self.spot).abs())
    }

    /// Quote whose absolute delta is closest to `target` (absolute value).
    pub fn closest_to_delta(&self, option_type: OptionType, target: f64) -> Option<&OptionQuote> {
        let side = match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        };
        side.iter()
            .filter(|q| q.greeks.is_some())
            .min_by(|a, b| {
                let da = (a.delta().abs() - target).abs();
                let db = (b.delta().abs() - target).abs();
                da.total_cmp(&db)
            })
    }

    pub fn len(&self) -> usize {
        self.calls.len() + self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One OHLCV bar of the underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn close_f64(&self) -> f64 {
        dec_to_f64(self.close)
    }
}

/// Lossy conversion used at the money/pricing boundary.
pub fn dec_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert a model value into money, rounded to paise.
pub fn f64_to_dec(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}
