//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Exchange WebSocket feed client.
pub mod exchange;

/// gRPC kline stream server and client.
pub mod grpc;

/// Subscriber fan-out hubs and the indicator relay.
pub mod broadcast;

/// WebSocket subscriber endpoints.
pub mod websocket;

/// Environment configuration.
pub mod config;

/// Health check and metrics HTTP routes.
pub mod health;

/// Signal-driven graceful shutdown.
pub mod shutdown;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
