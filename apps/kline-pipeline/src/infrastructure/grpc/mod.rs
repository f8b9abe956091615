//! gRPC Kline Stream
//!
//! Both ends of the `kline.v1.KlineService` bridge between the two binaries.
//!
//! # Architecture
//!
//! ```text
//! kline-ingest                              indicator-service
//! bar mpsc --> KlineStreamServer ==gRPC==> IndicatorPublisher --> relay mpsc
//! ```
//!
//! The server drains one shared bar channel. Concurrent `StreamKlines` calls
//! compete for bars rather than each receiving a copy.

pub mod client;
pub mod server;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod kline {
        pub mod v1 {
            include!(concat!(env!("OUT_DIR"), "/kline.v1.rs"));
        }
    }
}

use crate::domain::streaming::Bar;
use proto::kline::v1::KlineData;

/// Initiation message sent by [`client::IndicatorPublisher`].
pub const START_STREAM_MESSAGE: &str = "start_stream";

impl From<Bar> for KlineData {
    fn from(bar: Bar) -> Self {
        Self {
            symbol: bar.symbol,
            open_time: bar.open_time,
            close_time: bar.close_time,
            open_price: bar.open,
            close_price: bar.close,
            high_price: bar.high,
            low_price: bar.low,
            volume: bar.volume,
            num_trades: bar.trade_count,
            is_kline_closed: bar.is_closed,
        }
    }
}

impl From<KlineData> for Bar {
    fn from(data: KlineData) -> Self {
        Self {
            symbol: data.symbol,
            open: data.open_price,
            high: data.high_price,
            low: data.low_price,
            close: data.close_price,
            volume: data.volume,
            open_time: data.open_time,
            close_time: data.close_time,
            trade_count: data.num_trades,
            is_closed: data.is_kline_closed,
        }
    }
}

pub use client::{IndicatorPublisher, PublisherError};
pub use server::KlineStreamServer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_maps_onto_kline_fields() {
        let bar = Bar {
            symbol: "BNBBTC".to_string(),
            open: 1.0,
            high: 4.0,
            low: 0.5,
            close: 2.0,
            volume: 10.0,
            open_time: 60_000,
            close_time: 119_999,
            trade_count: 42,
            is_closed: true,
        };

        let data = KlineData::from(bar.clone());
        assert_eq!(data.open_price, 1.0);
        assert_eq!(data.close_price, 2.0);
        assert_eq!(data.high_price, 4.0);
        assert_eq!(data.low_price, 0.5);
        assert_eq!(data.num_trades, 42);
        assert!(data.is_kline_closed);

        assert_eq!(Bar::from(data), bar);
    }
}
