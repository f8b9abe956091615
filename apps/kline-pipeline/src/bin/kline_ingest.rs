//! Kline Ingest Binary
//!
//! Holds the exchange connection, serves raw frames on `/ws`, and bridges
//! parsed bars over gRPC.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin kline-ingest
//! ```
//!
//! # Environment Variables
//!
//! - `FEED_URL`: Exchange WebSocket URL (default: `wss://stream.binance.com:9443/ws/bnbbtc@trade`)
//! - `FEED_STREAM`: Stream to subscribe to (default: `bnbbtc@kline_1m`)
//! - `FEED_SUBSCRIBE_ID`: Subscribe request id (default: 1)
//! - `INGEST_GRPC_PORT`: gRPC server port (default: 50051)
//! - `INGEST_HTTP_PORT`: WebSocket, health, and metrics port (default: 8080)
//! - `RAW_CHANNEL_CAPACITY`: Raw frame buffer (default: 100)
//! - `BAR_CHANNEL_CAPACITY`: Bar buffer (default: 100)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`, `RUST_LOG`
//!
//! The process exits non-zero when the exchange connection ends.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use kline_pipeline::infrastructure::broadcast::BroadcastHub;
use kline_pipeline::infrastructure::config::load_dotenv;
use kline_pipeline::infrastructure::shutdown::await_shutdown;
use kline_pipeline::infrastructure::telemetry;
use kline_pipeline::{
    ExchangeFeedClient, IngestConfig, KlineStreamServer, health_routes, hub_router, init_metrics,
    serve,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let _telemetry_guard = telemetry::init("kline-ingest");

    tracing::info!("Starting kline ingest");

    init_metrics().context("failed to install Prometheus recorder")?;

    let config = IngestConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let (raw_tx, raw_rx) = mpsc::channel::<String>(config.channels.raw_capacity);
    let (bar_tx, bar_rx) = mpsc::channel(config.channels.bar_capacity);

    // Raw fan-out
    let raw_hub = Arc::new(BroadcastHub::new("raw"));
    let fanout_hub = Arc::clone(&raw_hub);
    tokio::spawn(async move {
        fanout_hub.run(raw_rx).await;
    });

    // gRPC bridge
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.grpc_port));
    let grpc_service = KlineStreamServer::new(bar_rx).into_service();
    let grpc_shutdown = shutdown_token.clone();
    let mut grpc_task = tokio::spawn(async move {
        tracing::info!(addr = %grpc_addr, "gRPC server listening");
        let result = Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled_owned())
            .await;
        tracing::info!("gRPC server stopped");
        result
    });

    // WebSocket + health
    let app = hub_router("/ws", raw_hub).merge(health_routes());
    let mut http_task = tokio::spawn(serve(app, config.http_port, shutdown_token.clone()));

    // Upstream feed
    let feed = ExchangeFeedClient::new(config.feed.clone(), raw_tx, bar_tx);
    let mut feed_task = tokio::spawn(feed.run());

    tracing::info!("Kline ingest ready");

    let outcome = tokio::select! {
        result = &mut feed_task => {
            match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("exchange feed ended")),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("exchange feed failed")),
                Err(e) => Err(anyhow::Error::new(e).context("exchange feed task panicked")),
            }
        }
        result = &mut grpc_task => {
            match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("gRPC server failed")),
                Err(e) => Err(anyhow::Error::new(e).context("gRPC server task panicked")),
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
    feed_task.abort();

    if let Err(e) = &outcome {
        tracing::error!(error = ?e, "Kline ingest terminating");
    }

    tracing::info!("Kline ingest stopped");
    outcome
}

/// Log the parsed configuration.
fn log_config(config: &IngestConfig) {
    tracing::info!(
        feed_url = %config.feed.url,
        stream = %config.feed.stream,
        grpc_port = config.grpc_port,
        http_port = config.http_port,
        raw_capacity = config.channels.raw_capacity,
        bar_capacity = config.channels.bar_capacity,
        "Configuration loaded"
    );
}
