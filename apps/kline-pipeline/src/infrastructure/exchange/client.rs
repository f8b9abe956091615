//! Exchange Feed WebSocket Client
//!
//! Holds the single upstream connection to the exchange kline stream.
//!
//! # Protocol
//!
//! 1. Dial the configured URL.
//! 2. Send one `SUBSCRIBE` control message naming the stream.
//! 3. Forward every text frame verbatim to the raw channel, then forward the
//!    parsed bar (if any) to the bar channel.
//!
//! Both forwards use [`offer`], so a slow consumer causes drops, never
//! backpressure on the socket. There is no reconnect: when the connection
//! ends, [`ExchangeFeedClient::run`] returns an error.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::messages::{SubscribeRequest, normalize};
use crate::domain::streaming::Bar;
use crate::infrastructure::broadcast::offer;
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::metrics::{self, Channel};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end the feed client.
#[derive(Debug, thiserror::Error)]
pub enum FeedClientError {
    /// WebSocket error while connecting or reading.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Subscription message could not be serialized.
    #[error("failed to encode subscribe request: {0}")]
    Encode(#[from] serde_json::Error),

    /// Server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,
}

// =============================================================================
// Frame dispatch
// =============================================================================

/// What happened to one text frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// The raw payload was accepted by the raw channel.
    pub raw_forwarded: bool,
    /// The frame parsed as a bar update.
    pub parsed: bool,
    /// The bar was accepted by the bar channel.
    pub bar_forwarded: bool,
}

/// Forward one text frame to the raw channel and, if it is a bar update, to
/// the bar channel.
pub fn dispatch_frame(
    text: &str,
    raw_tx: &mpsc::Sender<String>,
    bar_tx: &mpsc::Sender<Bar>,
) -> FrameOutcome {
    metrics::record_feed_message();
    let raw_forwarded = offer(raw_tx, text.to_string(), Channel::Raw);

    let Some(bar) = normalize(text) else {
        return FrameOutcome {
            raw_forwarded,
            ..FrameOutcome::default()
        };
    };

    metrics::record_bar_parsed();
    tracing::debug!(
        symbol = %bar.symbol,
        close = bar.close,
        closed = bar.is_closed,
        "Bar update"
    );

    FrameOutcome {
        raw_forwarded,
        parsed: true,
        bar_forwarded: offer(bar_tx, bar, Channel::Bar),
    }
}

// =============================================================================
// Client
// =============================================================================

/// Exchange kline stream client.
pub struct ExchangeFeedClient {
    settings: FeedSettings,
    raw_tx: mpsc::Sender<String>,
    bar_tx: mpsc::Sender<Bar>,
}

impl ExchangeFeedClient {
    /// Create a client forwarding into the given channels.
    #[must_use]
    pub const fn new(
        settings: FeedSettings,
        raw_tx: mpsc::Sender<String>,
        bar_tx: mpsc::Sender<Bar>,
    ) -> Self {
        Self {
            settings,
            raw_tx,
            bar_tx,
        }
    }

    /// Connect, subscribe, and forward frames until the connection ends.
    ///
    /// # Errors
    ///
    /// Always returns an error once the connection is gone: the dial failure,
    /// the read error, or [`FeedClientError::ConnectionClosed`].
    pub async fn run(self) -> Result<(), FeedClientError> {
        tracing::info!(url = %self.settings.url, "Connecting to exchange feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.settings.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe =
            SubscribeRequest::new(self.settings.stream.clone(), self.settings.subscribe_id);
        write.send(Message::Text(subscribe.to_json()?.into())).await?;
        tracing::info!(stream = %self.settings.stream, "Subscribed to exchange stream");

        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    dispatch_frame(text.as_str(), &self.raw_tx, &self.bar_tx);
                }
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        dispatch_frame(text, &self.raw_tx, &self.bar_tx);
                    }
                    Err(_) => tracing::debug!(len = data.len(), "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::warn!(?frame, "Exchange sent close frame");
                    return Err(FeedClientError::ConnectionClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Exchange feed read failed");
                    return Err(e.into());
                }
                None => {
                    tracing::warn!("Exchange feed stream ended");
                    return Err(FeedClientError::ConnectionClosed);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN_KLINE: &str =
        r#"{"e":"kline","s":"BNBBTC","k":{"t":0,"T":59999,"o":"1","h":"2","l":"0.5","c":"1.5","v":"10","n":3,"x":false}}"#;

    #[test]
    fn non_kline_frame_yields_one_raw_and_no_bar() {
        let (raw_tx, mut raw_rx) = mpsc::channel(4);
        let (bar_tx, mut bar_rx) = mpsc::channel(4);

        let frame = r#"{"e":"trade","s":"BNBBTC","p":"0.001"}"#;
        let outcome = dispatch_frame(frame, &raw_tx, &bar_tx);

        assert!(outcome.raw_forwarded);
        assert!(!outcome.parsed);
        assert_eq!(raw_rx.try_recv().ok().as_deref(), Some(frame));
        assert!(raw_rx.try_recv().is_err());
        assert!(bar_rx.try_recv().is_err());
    }

    #[test]
    fn kline_frame_is_forwarded_to_both_channels() {
        let (raw_tx, mut raw_rx) = mpsc::channel(4);
        let (bar_tx, mut bar_rx) = mpsc::channel(4);

        let outcome = dispatch_frame(OPEN_KLINE, &raw_tx, &bar_tx);

        assert_eq!(
            outcome,
            FrameOutcome {
                raw_forwarded: true,
                parsed: true,
                bar_forwarded: true,
            }
        );
        assert_eq!(raw_rx.try_recv().ok().as_deref(), Some(OPEN_KLINE));
        let bar = bar_rx.try_recv().unwrap();
        assert!(!bar.is_closed);
        assert_eq!(bar.trade_count, 3);
    }

    #[test]
    fn full_raw_channel_does_not_block_bar_forwarding() {
        let (raw_tx, _raw_rx) = mpsc::channel(1);
        let (bar_tx, mut bar_rx) = mpsc::channel(4);

        assert!(dispatch_frame(OPEN_KLINE, &raw_tx, &bar_tx).raw_forwarded);
        let second = dispatch_frame(OPEN_KLINE, &raw_tx, &bar_tx);

        assert!(!second.raw_forwarded);
        assert!(second.bar_forwarded);
        assert!(bar_rx.try_recv().is_ok());
        assert!(bar_rx.try_recv().is_ok());
    }

    #[test]
    fn full_bar_channel_drops_bar() {
        let (raw_tx, _raw_rx) = mpsc::channel(8);
        let (bar_tx, mut bar_rx) = mpsc::channel(1);

        dispatch_frame(OPEN_KLINE, &raw_tx, &bar_tx);
        let second = dispatch_frame(OPEN_KLINE, &raw_tx, &bar_tx);

        assert!(second.parsed);
        assert!(!second.bar_forwarded);
        assert!(bar_rx.try_recv().is_ok());
        assert!(bar_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let (raw_tx, _raw_rx) = mpsc::channel(1);
        let (bar_tx, _bar_rx) = mpsc::channel(1);
        let settings = FeedSettings {
            url: "ws://127.0.0.1:1/ws".to_string(),
            ..FeedSettings::default()
        };

        let result = ExchangeFeedClient::new(settings, raw_tx, bar_tx).run().await;
        assert!(matches!(result, Err(FeedClientError::WebSocket(_))));
    }
}
