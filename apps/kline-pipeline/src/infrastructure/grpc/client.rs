//! gRPC Kline Stream Client
//!
//! Consumes `StreamKlines` from the ingest process and feeds each bar through
//! the [`IndicatorPipeline`], relaying the resulting vectors.

use tokio::sync::mpsc;
use tonic::Streaming;

use super::START_STREAM_MESSAGE;
use super::proto::kline::v1::{KlineData, TradeRequest, kline_service_client::KlineServiceClient};
use crate::application::services::IndicatorPipeline;
use crate::domain::streaming::{Bar, IndicatorVector};
use crate::infrastructure::broadcast::offer;
use crate::infrastructure::metrics::{self, Channel};

/// Errors that stop the publisher before it starts reading.
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    /// Could not reach the kline endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint dialled.
        endpoint: String,
        /// Transport failure.
        #[source]
        source: tonic::transport::Error,
    },

    /// The `StreamKlines` call was rejected.
    #[error("StreamKlines call failed: {0}")]
    Call(#[from] tonic::Status),
}

/// Counters for one publisher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// Records received from the stream.
    pub received: u64,
    /// Receive errors logged and skipped.
    pub receive_errors: u64,
    /// Indicator vectors accepted by the relay channel.
    pub relayed: u64,
    /// Indicator vectors dropped on a full relay channel.
    pub dropped: u64,
}

/// Client side of the kline bridge.
pub struct IndicatorPublisher {
    pipeline: IndicatorPipeline,
    relay_tx: mpsc::Sender<IndicatorVector>,
}

impl IndicatorPublisher {
    /// Create a publisher relaying into `relay_tx`.
    #[must_use]
    pub const fn new(pipeline: IndicatorPipeline, relay_tx: mpsc::Sender<IndicatorVector>) -> Self {
        Self { pipeline, relay_tx }
    }

    /// Dial `endpoint` and issue the streaming call.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError`] if the dial or the call fails.
    pub async fn open_stream(endpoint: &str) -> Result<Streaming<KlineData>, PublisherError> {
        tracing::info!(%endpoint, "Connecting to kline stream");

        let mut client = KlineServiceClient::connect(endpoint.to_string())
            .await
            .map_err(|source| PublisherError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let request = TradeRequest {
            message: START_STREAM_MESSAGE.to_string(),
        };
        let stream = client.stream_klines(request).await?.into_inner();

        tracing::info!(%endpoint, "Kline stream opened");
        Ok(stream)
    }

    /// Open the stream on `endpoint` and consume it until it ends.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError`] if the stream cannot be opened.
    pub async fn run(self, endpoint: &str) -> Result<PublishSummary, PublisherError> {
        let stream = Self::open_stream(endpoint).await?;
        Ok(self.consume(stream).await)
    }

    /// Read records until a clean end-of-stream.
    ///
    /// Receive errors are logged and reading continues.
    pub async fn consume(mut self, mut stream: Streaming<KlineData>) -> PublishSummary {
        let mut summary = PublishSummary::default();

        loop {
            match stream.message().await {
                Ok(Some(data)) => {
                    summary.received += 1;
                    self.on_bar(Bar::from(data), &mut summary);
                }
                Ok(None) => {
                    tracing::info!(received = summary.received, "Kline stream ended");
                    break;
                }
                Err(status) => {
                    summary.receive_errors += 1;
                    tracing::warn!(
                        code = ?status.code(),
                        message = %status.message(),
                        "Kline receive failed"
                    );
                }
            }
        }

        summary
    }

    fn on_bar(&mut self, bar: Bar, summary: &mut PublishSummary) {
        let vectors = match self.pipeline.on_bar(bar) {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::error!(error = %e, "Indicator computation failed");
                return;
            }
        };

        if vectors.is_empty() {
            return;
        }

        if self.pipeline.newest_vwap_undefined() {
            metrics::record_vwap_undefined();
        }

        for vector in vectors {
            metrics::record_indicator_computed(vector.kind.as_str());
            tracing::debug!(
                kind = vector.kind.as_str(),
                len = vector.len(),
                "Indicator recomputed"
            );

            if offer(&self.relay_tx, vector, Channel::Relay) {
                summary.relayed += 1;
            } else {
                summary.dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::IndicatorSettings;
    use crate::domain::streaming::IndicatorKind;

    fn bar(close: f64, is_closed: bool) -> Bar {
        Bar {
            symbol: "BNBBTC".to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 2.0,
            open_time: 0,
            close_time: 59_999,
            trade_count: 1,
            is_closed,
        }
    }

    fn publisher(
        vwap_enabled: bool,
        capacity: usize,
    ) -> (IndicatorPublisher, mpsc::Receiver<IndicatorVector>) {
        let settings = IndicatorSettings {
            ema_period: 3,
            vwap_enabled,
        };
        let (tx, rx) = mpsc::channel(capacity);
        let pipeline = IndicatorPipeline::new(settings).unwrap();
        (IndicatorPublisher::new(pipeline, tx), rx)
    }

    #[test]
    fn open_bar_relays_nothing() {
        let (mut publisher, mut rx) = publisher(false, 4);
        let mut summary = PublishSummary::default();

        publisher.on_bar(bar(10.0, false), &mut summary);

        assert_eq!(summary.relayed, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_bar_relays_ema_then_vwap() {
        let (mut publisher, mut rx) = publisher(true, 4);
        let mut summary = PublishSummary::default();

        publisher.on_bar(bar(10.0, true), &mut summary);

        assert_eq!(summary.relayed, 2);
        assert_eq!(rx.try_recv().unwrap().kind, IndicatorKind::Ema { period: 3 });
        let vwap = rx.try_recv().unwrap();
        assert_eq!(vwap.kind, IndicatorKind::Vwap);
        assert_eq!(vwap.values, vec![10.0]);
    }

    #[test]
    fn full_relay_drops_vectors() {
        let (mut publisher, mut rx) = publisher(false, 1);
        let mut summary = PublishSummary::default();

        publisher.on_bar(bar(10.0, true), &mut summary);
        publisher.on_bar(bar(11.0, true), &mut summary);

        assert_eq!(summary.relayed, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(rx.try_recv().unwrap().values, vec![10.0]);
    }
}
