//! Bar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single stock on a single trading day.
///
/// Prices are forward-adjusted upstream; the engine never rescales them.
/// A volume of zero marks a suspended session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// True when the session traded no volume.
    pub fn is_suspended(&self) -> bool {
        self.volume == 0
    }
}

/// Structural problems with a bar series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bars out of order at index {index}: {prev} is not before {date}")]
    OutOfOrder {
        index: usize,
        prev: NaiveDate,
        date: NaiveDate,
    },

    #[error("insane bar at index {index} ({date})")]
    InsaneBar { index: usize, date: NaiveDate },
}

/// Check that dates strictly increase and every bar passes `is_sane`.
///
/// The engine itself assumes a valid series; loaders call this before handing
/// bars over.
pub fn validate_series(bars: &[Bar]) -> Result<(), SeriesError> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(SeriesError::InsaneBar {
                index: i,
                date: bar.date,
            });
        }
        if i > 0 && bars[i - 1].date >= bar.date {
            return Err(SeriesError::OutOfOrder {
                index: i,
                prev: bars[i - 1].date,
                date: bar.date,
            });
        }
    }
    Ok(())
}
