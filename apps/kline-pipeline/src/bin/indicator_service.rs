//! Indicator Service Binary
//!
//! Consumes closed bars from the kline gRPC stream, recomputes indicators on
//! every closed bar, and pushes them to WebSocket subscribers.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin indicator-service
//! ```
//!
//! # Environment Variables
//!
//! - `STAGE`: `production` targets `host.docker.internal` (default: local)
//! - `KLINE_GRPC_ENDPOINT`: Kline gRPC endpoint (default: derived from `STAGE`)
//! - `INDICATOR_HTTP_PORT`: WebSocket, health, and metrics port (default: 8090)
//! - `INDICATOR_EMA_PERIOD`: EMA period (default: 9)
//! - `INDICATOR_VWAP_ENABLED`: Also serve VWAP on `/ws/vwap` (default: false)
//! - `RELAY_CHANNEL_CAPACITY`: Indicator vector buffer (default: 10)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`, `RUST_LOG`

use std::sync::Arc;

use anyhow::Context;
use kline_pipeline::infrastructure::broadcast::BroadcastHub;
use kline_pipeline::infrastructure::config::load_dotenv;
use kline_pipeline::infrastructure::shutdown::await_shutdown;
use kline_pipeline::infrastructure::telemetry;
use kline_pipeline::{
    IndicatorConfig, IndicatorPipeline, IndicatorPublisher, IndicatorRelay, health_routes,
    hub_router, init_metrics, serve,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let _telemetry_guard = telemetry::init("indicator-service");

    tracing::info!("Starting indicator service");

    init_metrics().context("failed to install Prometheus recorder")?;

    let config = IndicatorConfig::from_env()?;
    log_config(&config);

    let pipeline = IndicatorPipeline::new(config.indicators)?;
    let shutdown_token = CancellationToken::new();

    // Fan-out hubs
    let ema_hub = Arc::new(BroadcastHub::new("ema"));
    let vwap_hub = config
        .indicators
        .vwap_enabled
        .then(|| Arc::new(BroadcastHub::new("vwap")));

    let (relay_tx, relay_rx) = mpsc::channel(config.relay_capacity);
    let relay = IndicatorRelay::new(Arc::clone(&ema_hub), vwap_hub.clone());
    tokio::spawn(relay.run(relay_rx));

    // WebSocket + health
    let mut app = hub_router("/ws", ema_hub).merge(health_routes());
    if let Some(hub) = vwap_hub {
        app = app.merge(hub_router("/ws/vwap", hub));
    }
    let mut http_task = tokio::spawn(serve(app, config.http_port, shutdown_token.clone()));

    // Kline stream
    let stream = IndicatorPublisher::open_stream(&config.grpc_endpoint)
        .await
        .context("kline stream unavailable")?;
    let publisher = IndicatorPublisher::new(pipeline, relay_tx);
    let mut publish_task = tokio::spawn(publisher.consume(stream));

    tracing::info!("Indicator service ready");

    let outcome = tokio::select! {
        result = &mut publish_task => {
            match result {
                Ok(summary) => {
                    tracing::warn!(
                        received = summary.received,
                        receive_errors = summary.receive_errors,
                        relayed = summary.relayed,
                        dropped = summary.dropped,
                        "Kline stream ended, serving existing subscribers until shutdown"
                    );
                    await_shutdown(shutdown_token.clone()).await;
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e).context("publisher task panicked")),
            }
        }
        result = &mut http_task => {
            match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("HTTP server failed")),
                Err(e) => Err(anyhow::Error::new(e).context("HTTP server task panicked")),
            }
        }
        () = await_shutdown(shutdown_token.clone()) => Ok(()),
    };

    shutdown_token.cancel();
    publish_task.abort();

    if let Err(e) = &outcome {
        tracing::error!(error = ?e, "Indicator service terminating");
    }

    tracing::info!("Indicator service stopped");
    outcome
}

/// Log the parsed configuration.
fn log_config(config: &IndicatorConfig) {
    tracing::info!(
        stage = config.stage.as_str(),
        grpc_endpoint = %config.grpc_endpoint,
        http_port = config.http_port,
        ema_period = config.indicators.ema_period,
        vwap_enabled = config.indicators.vwap_enabled,
        relay_capacity = config.relay_capacity,
        "Configuration loaded"
    );
}
