//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following the
//! Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SubscriberSink`: one downstream connection that accepts text frames.
//!   The WebSocket adapter implements it; tests substitute mocks.

use async_trait::async_trait;

/// Errors raised by a subscriber sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The peer has gone away.
    #[error("subscriber connection closed")]
    Closed,

    /// The transport failed while writing.
    #[error("subscriber write failed: {0}")]
    Write(String),
}

/// A single downstream subscriber connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Deliver one text payload.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the payload could not be written; the caller
    /// treats any error as fatal for this subscriber.
    async fn send_text(&self, payload: &str) -> Result<(), SinkError>;

    /// Close the connection. Failures are ignored.
    async fn close(&self);
}
