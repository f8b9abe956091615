//! Broadcast Hub
//!
//! Fan-out of text payloads to every connected subscriber.
//!
//! # Architecture
//!
//! Producers never touch subscribers directly. They hand items to a bounded
//! `mpsc` channel with [`offer`], which drops the item when the channel is
//! full. One task per hub drains that channel through [`BroadcastHub::run`]
//! and calls [`BroadcastHub::publish`] for every item.
//!
//! ```text
//! producer --offer--> mpsc(N) --run--> publish --> sink 1
//!                                              --> sink 2
//!                                              --> ...
//! ```
//!
//! Delivery is sequential and awaited per subscriber; there is no
//! per-subscriber queue. A subscriber whose write fails is removed and closed
//! before `publish` returns.

mod relay;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::application::ports::SubscriberSink;
use crate::domain::subscription::{SubscriberId, SubscriberSet};
use crate::infrastructure::metrics::{self, Channel};

pub use relay::IndicatorRelay;

// =============================================================================
// Non-blocking channel offer
// =============================================================================

/// Try to enqueue `item` without waiting.
///
/// A full or closed channel drops the item, logs at warn, and counts it
/// against `channel`. Returns whether the item was accepted.
pub fn offer<T>(tx: &mpsc::Sender<T>, item: T, channel: Channel) -> bool {
    match tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(channel = channel.as_str(), "Channel full, dropping message");
            metrics::record_message_dropped(channel);
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::warn!(channel = channel.as_str(), "Channel closed, dropping message");
            metrics::record_message_dropped(channel);
            false
        }
    }
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Shared subscriber handle.
pub type SharedSink = Arc<dyn SubscriberSink>;

/// Result of one [`BroadcastHub::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the payload.
    pub delivered: usize,
    /// Subscribers removed because their write failed.
    pub pruned: usize,
}

/// Set of subscriber sinks that all receive every published payload.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kline_pipeline::infrastructure::broadcast::BroadcastHub;
///
/// let hub = Arc::new(BroadcastHub::new("raw"));
/// assert_eq!(hub.subscriber_count(), 0);
/// ```
pub struct BroadcastHub {
    name: &'static str,
    subscribers: SubscriberSet<SharedSink>,
}

/// Hub shared between its fan-out task and connection handlers.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

impl BroadcastHub {
    /// Create an empty hub. `name` labels its logs and metrics.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: SubscriberSet::new(),
        }
    }

    /// Hub label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Add a subscriber and return its id.
    pub fn register(&self, sink: SharedSink) -> SubscriberId {
        let id = self.subscribers.register(sink);
        let count = self.subscribers.len();
        metrics::set_subscribers(self.name, count);
        tracing::info!(hub = self.name, subscriber = %id, count, "Subscriber registered");
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.unregister(id).is_some();
        if removed {
            let count = self.subscribers.len();
            metrics::set_subscribers(self.name, count);
            tracing::info!(hub = self.name, subscriber = %id, count, "Subscriber unregistered");
        }
        removed
    }

    /// Whether `id` is still registered.
    #[must_use]
    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.subscribers.contains(id)
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `payload` to every current subscriber.
    ///
    /// Subscribers whose write fails are removed and closed.
    pub async fn publish(&self, payload: &str) -> PublishReport {
        let snapshot = self.subscribers.snapshot();
        let mut failed = Vec::new();
        let mut delivered = 0;

        for (id, sink) in &snapshot {
            match sink.send_text(payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        hub = self.name,
                        subscriber = %id,
                        error = %e,
                        "Write failed, removing subscriber"
                    );
                    failed.push(*id);
                }
            }
        }

        if failed.is_empty() {
            return PublishReport {
                delivered,
                pruned: 0,
            };
        }

        let removed = self.subscribers.unregister_all(&failed);
        for (_, sink) in &removed {
            sink.close().await;
        }

        let pruned = removed.len();
        metrics::record_subscribers_pruned(self.name, pruned as u64);
        metrics::set_subscribers(self.name, self.subscribers.len());

        PublishReport { delivered, pruned }
    }

    /// Publish every item from `rx` until the channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<String>) {
        tracing::info!(hub = self.name, "Broadcast loop started");
        while let Some(payload) = rx.recv().await {
            self.publish(&payload).await;
        }
        tracing::info!(hub = self.name, "Broadcast channel closed, loop finished");
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("name", &self.name)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{MockSubscriberSink, SinkError};

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

    fn failing_sink() -> MockSubscriberSink {
        let mut mock = MockSubscriberSink::new();
        mock.expect_send_text()
            .times(1)
            .returning(|_| Err(SinkError::Write("broken pipe".to_string())));
        mock.expect_close().times(1).returning(|| ());
        mock
    }

    #[test]
    fn offer_drops_when_full_and_keeps_existing_items() {
        let (tx, mut rx) = mpsc::channel(2);

        assert!(offer(&tx, 1, Channel::Raw));
        assert!(offer(&tx, 2, Channel::Raw));
        assert!(!offer(&tx, 3, Channel::Raw));

        assert_eq!(rx.try_recv().ok(), Some(1));
        assert_eq!(rx.try_recv().ok(), Some(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn offer_drops_when_closed() {
        let (tx, rx) = mpsc::channel::<u8>(1);
        drop(rx);
        assert!(!offer(&tx, 1, Channel::Bar));
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = BroadcastHub::new("test");
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        hub.register(a.clone());
        hub.register(b.clone());

        let report = hub.publish("hello").await;

        assert_eq!(report, PublishReport { delivered: 2, pruned: 0 });
        assert_eq!(*a.received.lock(), vec!["hello".to_string()]);
        assert_eq!(*b.received.lock(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let hub = BroadcastHub::new("test");
        assert_eq!(hub.publish("x").await, PublishReport::default());
    }

    #[tokio::test]
    async fn failed_subscriber_is_pruned_and_closed() {
        let hub = BroadcastHub::new("test");
        let healthy = Arc::new(RecordingSink::default());
        hub.register(healthy.clone());
        let broken = hub.register(Arc::new(failing_sink()));

        let first = hub.publish("one").await;
        assert_eq!(first, PublishReport { delivered: 1, pruned: 1 });
        assert!(!hub.is_registered(broken));

        // The mock only allows one write; a second delivery would panic.
        let second = hub.publish("two").await;
        assert_eq!(second, PublishReport { delivered: 1, pruned: 0 });
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(
            *healthy.received.lock(),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = BroadcastHub::new("test");
        let id = hub.register(Arc::new(RecordingSink::default()));

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn run_drains_channel_in_order_until_closed() {
        let hub = Arc::new(BroadcastHub::new("test"));
        let sink = Arc::new(RecordingSink::default());
        hub.register(sink.clone());

        let (tx, rx) = mpsc::channel(8);
        for payload in ["a", "b", "c"] {
            assert!(offer(&tx, payload.to_string(), Channel::Raw));
        }
        drop(tx);

        hub.run(rx).await;

        assert_eq!(
            *sink.received.lock(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
