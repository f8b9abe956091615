#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_precision_loss
    )
)]

//! Kline Pipeline - Exchange Feed Fan-out and Indicator Service
//!
//! Keeps one connection to an exchange kline stream, fans the raw frames out
//! to WebSocket subscribers, bridges parsed bars over gRPC to an indicator
//! process, and pushes recomputed EMA/VWAP vectors to a second set of
//! WebSocket subscribers.
//!
//! # Layers (inside to outside)
//!
//! - **Domain**: Pure types and computations
//!   - `streaming`: Bars and indicator vectors
//!   - `indicators`: EMA and VWAP over a bar history
//!   - `subscription`: Mutex-guarded subscriber set
//!
//! - **Application**: Ports and use cases
//!   - `ports`: `SubscriberSink` for downstream connections
//!   - `services`: `IndicatorPipeline` (closed-bar history and recompute)
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `exchange`: Upstream WebSocket client and frame normalizer
//!   - `broadcast`: Subscriber hubs, drop-on-full `offer`, indicator relay
//!   - `websocket`: Axum WebSocket endpoints backed by a hub
//!   - `grpc`: `KlineService` server and client
//!   - `config`, `health`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                       +--> raw mpsc --> raw hub --> /ws subscribers   (kline-ingest)
//! exchange WS --client--+
//!                       +--> bar mpsc --> KlineStreamServer
//!                                              |
//!                                            gRPC
//!                                              v
//!              IndicatorPublisher --> relay mpsc --> IndicatorRelay --> ema hub  --> /ws
//!                                                                   --> vwap hub --> /ws/vwap
//!                                                                   (indicator-service)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::indicators::{IndicatorError, compute_ema, compute_vwap};
pub use domain::streaming::{Bar, IndicatorKind, IndicatorVector};
pub use domain::subscription::{SubscriberId, SubscriberSet};

// Application
pub use application::ports::{SinkError, SubscriberSink};
pub use application::services::{IndicatorPipeline, IndicatorSettings};

// Infrastructure config
pub use infrastructure::config::{ConfigError, IndicatorConfig, IngestConfig, Stage};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{
    BroadcastHub, IndicatorRelay, PublishReport, SharedBroadcastHub, offer,
};

// gRPC (for integration tests)
pub use infrastructure::grpc::{
    IndicatorPublisher, KlineStreamServer, PublisherError, client::PublishSummary,
    proto::kline::v1 as proto,
};

// Exchange feed
pub use infrastructure::exchange::{ExchangeFeedClient, FeedClientError};

// HTTP
pub use infrastructure::health::{ServeError, health_routes, serve};
pub use infrastructure::websocket::hub_router;

// Metrics
pub use infrastructure::metrics::{Channel as MetricsChannel, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
