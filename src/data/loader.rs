//! OHLCV loader for parquet files.
//!
//! Expected schema (one row per bar):
//! - timestamp: string (`%Y-%m-%d %H:%M:%S` or `%Y-%m-%d`) or i64 epoch seconds
//! - open, high, low, close: f64
//! - volume: i64 (optional, defaults to 0)
//!
//! Rows are returned in file order; timestamps must be strictly increasing.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use thiserror::Error;

use super::types::{f64_to_dec, Bar};

/// Columns every bar file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &["timestamp", "open", "high", "low", "close"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Parquet bar loader.
pub struct BarLoader {
    path: String,
}

impl BarLoader {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }

    /// Load the file as a LazyFrame.
    pub fn load_lazy(&self) -> Result<LazyFrame, LoaderError> {
        if !Path::new(&self.path).exists() {
            return Err(LoaderError::FileNotFound(self.path.clone()));
        }
        let lf = LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?;
        Ok(lf)
    }

    /// Load every bar in the file.
    pub fn load_bars(&self) -> Result<Vec<Bar>, LoaderError> {
        let df = self.load_lazy()?.collect()?;
        dataframe_to_bars(&df)
    }
}

/// Convert a DataFrame into bars, enforcing strictly increasing timestamps.
pub fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, LoaderError> {
    for name in REQUIRED_COLUMNS {
        if df.column(name).is_err() {
            return Err(LoaderError::InvalidData(format!("missing column '{}'", name)));
        }
    }

    let ts_col = df.column("timestamp")?;
    let open = df.column("open")?.f64()?;
    let high = df.column("high")?.f64()?;
    let low = df.column("low")?.f64()?;
    let close = df.column("close")?.f64()?;
    let volume = df.column("volume").ok().and_then(|c| c.i64().ok());

    let mut bars: Vec<Bar> = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let timestamp = if let Ok(col) = ts_col.str() {
            col.get(idx).and_then(parse_timestamp)
        } else if let Ok(col) = ts_col.i64() {
            col.get(idx)
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.naive_utc())
        } else {
            return Err(LoaderError::InvalidData(
                "timestamp column has unexpected type".to_string(),
            ));
        };

        let timestamp = timestamp
            .ok_or_else(|| LoaderError::InvalidData(format!("bad timestamp at row {}", idx)))?;

        let (Some(o), Some(h), Some(l), Some(c)) =
            (open.get(idx), high.get(idx), low.get(idx), close.get(idx))
        else {
            return Err(LoaderError::InvalidData(format!("null price at row {}", idx)));
        };

        if let Some(prev) = bars.last() {
            if timestamp <= prev.timestamp {
                return Err(LoaderError::InvalidData(format!(
                    "timestamps not strictly increasing at row {} ({} after {})",
                    idx, timestamp, prev.timestamp
                )));
            }
        }

        bars.push(Bar {
            timestamp,
            open: f64_to_dec(o),
            high: f64_to_dec(h),
            low: f64_to_dec(l),
            close: f64_to_dec(c),
            volume: volume.and_then(|v| v.get(idx)).unwrap_or(0),
        });
    }

    Ok(bars)
}

/// Parse `%Y-%m-%d %H:%M:%S`, or a bare date stamped at the 15:30 close.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    let close = NaiveTime::from_hms_opt(15, 30, 0)?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(close))
}
