//! Market Data Streaming Types
//!
//! Core domain types for the pipeline: bars and the indicator vectors derived
//! from them. These types are codec-agnostic and represent the canonical
//! internal representation passed across channel boundaries by value.

use serde::{Deserialize, Serialize};

// =============================================================================
// Bar
// =============================================================================

/// A fixed-interval OHLCV summary for one time bucket (a kline).
///
/// The exchange sends several updates for the same bucket while it is open;
/// only the terminal update has `is_closed == true`, and only closed bars
/// feed the indicator history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument symbol, e.g. `BNBBTC`.
    pub symbol: String,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price (last price while the bar is open).
    pub close: f64,
    /// Base asset volume.
    pub volume: f64,
    /// Bucket open time, epoch milliseconds.
    pub open_time: i64,
    /// Bucket close time, epoch milliseconds.
    pub close_time: i64,
    /// Number of trades in the bucket so far.
    pub trade_count: i64,
    /// Whether this is the terminal update for the bucket.
    pub is_closed: bool,
}

impl Bar {
    /// Typical price `(high + low + close) / 3`.
    #[must_use]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

// =============================================================================
// Indicator Vectors
// =============================================================================

/// Which indicator a vector holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndicatorKind {
    /// Exponential moving average over closes.
    Ema {
        /// Smoothing period.
        period: usize,
    },
    /// Cumulative volume-weighted average price.
    Vwap,
}

impl IndicatorKind {
    /// Label used for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ema { .. } => "ema",
            Self::Vwap => "vwap",
        }
    }
}

/// One full indicator series, one value per bar in the history at the time
/// it was computed. Sent once and not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorVector {
    /// Indicator that produced the values.
    pub kind: IndicatorKind,
    /// Values in bar order.
    pub values: Vec<f64>,
}

impl IndicatorVector {
    /// Create a new vector.
    #[must_use]
    pub const fn new(kind: IndicatorKind, values: Vec<f64>) -> Self {
        Self { kind, values }
    }

    /// Encode the values as the JSON array sent to subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.values)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
