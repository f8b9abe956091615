//! Indicator Relay
//!
//! Single consumer of the relay channel. Every indicator vector is serialized
//! once and published to the hub for its kind, so all subscribers of that
//! endpoint see every vector.

use tokio::sync::mpsc;

use super::SharedBroadcastHub;
use crate::domain::streaming::{IndicatorKind, IndicatorVector};

/// Routes indicator vectors to their broadcast hubs.
#[derive(Debug, Clone)]
pub struct IndicatorRelay {
    ema: SharedBroadcastHub,
    vwap: Option<SharedBroadcastHub>,
}

impl IndicatorRelay {
    /// Create a relay. VWAP vectors are discarded when `vwap` is `None`.
    #[must_use]
    pub const fn new(ema: SharedBroadcastHub, vwap: Option<SharedBroadcastHub>) -> Self {
        Self { ema, vwap }
    }

    /// Publish one vector to its hub.
    pub async fn route(&self, vector: &IndicatorVector) {
        let hub = match vector.kind {
            IndicatorKind::Ema { .. } => &self.ema,
            IndicatorKind::Vwap => match &self.vwap {
                Some(hub) => hub,
                None => {
                    tracing::debug!("No VWAP hub configured, discarding vector");
                    return;
                }
            },
        };

        match vector.to_json() {
            Ok(payload) => {
                hub.publish(&payload).await;
            }
            Err(e) => {
                tracing::error!(
                    kind = vector.kind.as_str(),
                    error = %e,
                    "Failed to encode indicator vector"
                );
            }
        }
    }

    /// Route every vector from `rx` until the channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<IndicatorVector>) {
        tracing::info!("Indicator relay started");
        while let Some(vector) = rx.recv().await {
            self.route(&vector).await;
        }
        tracing::info!("Relay channel closed, indicator relay finished");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{SinkError, SubscriberSink};
    use crate::infrastructure::broadcast::BroadcastHub;

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SubscriberSink for RecordingSink {
        async fn send_text(&self, payload: &str) -> Result<(), SinkError> {
            self.received.lock().push(payload.to_string());
            Ok(())
        }

        async fn close(&self) {}
    }

    fn hub_with_sink(name: &'static str) -> (SharedBroadcastHub, Arc<RecordingSink>) {
        let hub = Arc::new(BroadcastHub::new(name));
        let sink = Arc::new(RecordingSink::default());
        hub.register(sink.clone());
        (hub, sink)
    }

    #[tokio::test]
    async fn vectors_are_routed_by_kind() {
        let (ema_hub, ema_sink) = hub_with_sink("ema");
        let (vwap_hub, vwap_sink) = hub_with_sink("vwap");
        let relay = IndicatorRelay::new(ema_hub, Some(vwap_hub));

        let (tx, rx) = mpsc::channel(4);
        tx.send(IndicatorVector::new(IndicatorKind::Ema { period: 9 }, vec![10.0, 10.5]))
            .await
            .unwrap();
        tx.send(IndicatorVector::new(IndicatorKind::Vwap, vec![0.0, 12.0]))
            .await
            .unwrap();
        drop(tx);

        relay.run(rx).await;

        assert_eq!(*ema_sink.received.lock(), vec!["[10.0,10.5]".to_string()]);
        assert_eq!(*vwap_sink.received.lock(), vec!["[0.0,12.0]".to_string()]);
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_vector() {
        let (ema_hub, first) = hub_with_sink("ema");
        let second = Arc::new(RecordingSink::default());
        ema_hub.register(second.clone());
        let relay = IndicatorRelay::new(ema_hub, None);

        for values in [vec![1.0], vec![1.0, 2.0]] {
            relay
                .route(&IndicatorVector::new(IndicatorKind::Ema { period: 3 }, values))
                .await;
        }

        assert_eq!(first.received.lock().len(), 2);
        assert_eq!(*first.received.lock(), *second.received.lock());
    }

    #[tokio::test]
    async fn vwap_without_hub_is_discarded() {
        let (ema_hub, ema_sink) = hub_with_sink("ema");
        let relay = IndicatorRelay::new(ema_hub, None);

        relay
            .route(&IndicatorVector::new(IndicatorKind::Vwap, vec![1.0]))
            .await;

        assert!(ema_sink.received.lock().is_empty());
    }
}
