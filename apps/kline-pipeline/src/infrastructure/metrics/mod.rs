//! Prometheus Metrics Module
//!
//! Exposes pipeline metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Feed**: Frames received from the exchange and bars parsed from them
//! - **Channels**: Messages dropped on a full internal channel
//! - **Subscribers**: Connected and pruned WebSocket subscribers per hub
//! - **RPC**: Active kline streams and bars streamed
//! - **Indicators**: Recomputations and undefined VWAP points
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on each binary's HTTP port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "kline_pipeline_feed_messages_received_total",
        "Total frames received from the exchange feed"
    );
    describe_counter!(
        "kline_pipeline_feed_bars_parsed_total",
        "Total bar updates parsed from the exchange feed"
    );
    describe_counter!(
        "kline_pipeline_messages_dropped_total",
        "Total messages dropped because an internal channel was full or closed"
    );

    describe_gauge!(
        "kline_pipeline_subscribers",
        "Number of connected WebSocket subscribers per hub"
    );
    describe_counter!(
        "kline_pipeline_subscribers_pruned_total",
        "Total subscribers removed after a failed write"
    );

    describe_gauge!(
        "kline_pipeline_grpc_streams",
        "Number of active StreamKlines invocations"
    );
    describe_counter!(
        "kline_pipeline_bars_streamed_total",
        "Total bars written to gRPC clients"
    );

    describe_counter!(
        "kline_pipeline_indicator_computations_total",
        "Total indicator vectors computed"
    );
    describe_counter!(
        "kline_pipeline_vwap_undefined_points_total",
        "Total closed bars whose VWAP point was sent as 0.0 because cumulative volume was zero"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for the internal bounded channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Raw feed frames on their way to the raw hub.
    Raw,
    /// Parsed bars on their way to the gRPC bridge.
    Bar,
    /// Indicator vectors on their way to the indicator hubs.
    Relay,
}

impl Channel {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Bar => "bar",
            Self::Relay => "relay",
        }
    }
}

/// Record a frame received from the exchange feed.
pub fn record_feed_message() {
    counter!("kline_pipeline_feed_messages_received_total").increment(1);
}

/// Record a bar update parsed from the exchange feed.
pub fn record_bar_parsed() {
    counter!("kline_pipeline_feed_bars_parsed_total").increment(1);
}

/// Record a message dropped on a full or closed channel.
pub fn record_message_dropped(channel: Channel) {
    counter!(
        "kline_pipeline_messages_dropped_total",
        "channel" => channel.as_str()
    )
    .increment(1);
}

/// Update the subscriber count for a hub.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(hub: &'static str, count: usize) {
    gauge!("kline_pipeline_subscribers", "hub" => hub).set(count as f64);
}

/// Record subscribers pruned from a hub.
pub fn record_subscribers_pruned(hub: &'static str, count: u64) {
    counter!("kline_pipeline_subscribers_pruned_total", "hub" => hub).increment(count);
}

/// Update the active gRPC stream count.
#[allow(clippy::cast_precision_loss)]
pub fn set_grpc_streams(count: usize) {
    gauge!("kline_pipeline_grpc_streams").set(count as f64);
}

/// Record a bar written to a gRPC client.
pub fn record_bar_streamed() {
    counter!("kline_pipeline_bars_streamed_total").increment(1);
}

/// Record an indicator vector computation.
pub fn record_indicator_computed(kind: &'static str) {
    counter!("kline_pipeline_indicator_computations_total", "kind" => kind).increment(1);
}

/// Record a newly computed VWAP point that was undefined and sent as 0.0.
pub fn record_vwap_undefined() {
    counter!("kline_pipeline_vwap_undefined_points_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
