//! Exchange Wire Messages
//!
//! Serde types for the exchange kline stream and the normalizer that turns a
//! raw text frame into a [`Bar`].
//!
//! # Inbound kline event
//!
//! ```json
//! {
//!   "e": "kline", "E": 1672515782136, "s": "BNBBTC",
//!   "k": { "t": 1672515780000, "T": 1672515839999, "i": "1m",
//!          "o": "0.0010", "c": "0.0020", "h": "0.0025", "l": "0.0015",
//!          "v": "1000", "n": 100, "x": false }
//! }
//! ```
//!
//! Price and volume fields arrive as strings or numbers; anything that does
//! not parse becomes `0.0`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::streaming::Bar;

/// Event types that carry a bar update.
const BAR_EVENT_TYPES: [&str; 2] = ["kline", "bar"];

// =============================================================================
// Outbound
// =============================================================================

/// Stream subscription control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    /// Always `SUBSCRIBE`.
    pub method: &'static str,
    /// Stream names.
    pub params: Vec<String>,
    /// Request id echoed back by the exchange.
    pub id: u64,
}

impl SubscribeRequest {
    /// Subscribe to a single stream.
    #[must_use]
    pub fn new(stream: impl Into<String>, id: u64) -> Self {
        Self {
            method: "SUBSCRIBE",
            params: vec![stream.into()],
            id,
        }
    }

    /// Serialize to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Kline event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    /// Event type.
    #[serde(rename = "e")]
    pub event_type: String,
    /// Symbol.
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Bar payload.
    #[serde(rename = "k")]
    pub kline: KlinePayload,
}

/// Bar payload of a kline event.
#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    /// Bucket open time (epoch ms).
    #[serde(rename = "t", default, deserialize_with = "lenient_i64")]
    pub open_time: i64,
    /// Bucket close time (epoch ms).
    #[serde(rename = "T", default, deserialize_with = "lenient_i64")]
    pub close_time: i64,
    /// Open price.
    #[serde(rename = "o", default, deserialize_with = "lenient_f64")]
    pub open: f64,
    /// High price.
    #[serde(rename = "h", default, deserialize_with = "lenient_f64")]
    pub high: f64,
    /// Low price.
    #[serde(rename = "l", default, deserialize_with = "lenient_f64")]
    pub low: f64,
    /// Close price.
    #[serde(rename = "c", default, deserialize_with = "lenient_f64")]
    pub close: f64,
    /// Base asset volume.
    #[serde(rename = "v", default, deserialize_with = "lenient_f64")]
    pub volume: f64,
    /// Number of trades.
    #[serde(rename = "n", default, deserialize_with = "lenient_i64")]
    pub trade_count: i64,
    /// Whether this is the final update for the bucket.
    #[serde(rename = "x", default)]
    pub is_closed: bool,
}

impl KlineEvent {
    /// Whether the event type carries a bar update.
    #[must_use]
    pub fn is_bar_event(&self) -> bool {
        BAR_EVENT_TYPES.contains(&self.event_type.as_str())
    }

    /// Convert into a domain [`Bar`].
    #[must_use]
    pub fn into_bar(self) -> Bar {
        let k = self.kline;
        Bar {
            symbol: self.symbol,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            volume: k.volume,
            open_time: k.open_time,
            close_time: k.close_time,
            trade_count: k.trade_count,
            is_closed: k.is_closed,
        }
    }
}

/// Parse a text frame into a [`Bar`].
///
/// Returns `None` for frames that are not JSON, lack a bar payload, or carry
/// another event type.
#[must_use]
pub fn normalize(text: &str) -> Option<Bar> {
    let event: KlineEvent = serde_json::from_str(text).ok()?;
    event.is_bar_event().then(|| event.into_bar())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // `f64::from_str` accepts "NaN" and "inf"; neither may reach the history.
    Ok(parsed.filter(|v| v.is_finite()).unwrap_or(0.0))
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

// =============================================================================
// Tests
// =============================================================================
