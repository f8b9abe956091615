//! gRPC Streaming Server Implementation
//!
//! Implements `KlineService` by draining the shared bar channel into each
//! `StreamKlines` response stream.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use super::proto::kline::v1::{
    KlineData, TradeRequest,
    kline_service_server::{KlineService, KlineServiceServer},
};
use crate::domain::streaming::Bar;
use crate::infrastructure::metrics;

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Per-call response buffer. Kept at one so bars stay in the shared channel
/// until a live client is ready for them.
const RESPONSE_BUFFER: usize = 1;

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC server bridging the bar channel to `StreamKlines` callers.
///
/// Only one consumer is expected. Concurrent calls take turns on the shared
/// receiver, so each bar reaches exactly one of them.
#[derive(Clone)]
pub struct KlineStreamServer {
    bars: Arc<Mutex<mpsc::Receiver<Bar>>>,
    active_streams: Arc<AtomicUsize>,
    bars_streamed: Arc<AtomicU64>,
}

impl KlineStreamServer {
    /// Create a server draining `bars`.
    #[must_use]
    pub fn new(bars: mpsc::Receiver<Bar>) -> Self {
        Self {
            bars: Arc::new(Mutex::new(bars)),
            active_streams: Arc::new(AtomicUsize::new(0)),
            bars_streamed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wrap in the tonic service type.
    #[must_use]
    pub fn into_service(self) -> KlineServiceServer<Self> {
        KlineServiceServer::new(self)
    }

    /// Number of `StreamKlines` calls currently draining.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::Relaxed)
    }

    /// Total bars written to clients.
    #[must_use]
    pub fn bars_streamed(&self) -> u64 {
        self.bars_streamed.load(Ordering::Relaxed)
    }
}

#[tonic::async_trait]
impl KlineService for KlineStreamServer {
    type StreamKlinesStream = BoxedStream<KlineData>;

    async fn stream_klines(
        &self,
        request: Request<TradeRequest>,
    ) -> StreamResult<Self::StreamKlinesStream> {
        let req = request.into_inner();
        tracing::info!(message = %req.message, "StreamKlines requested");

        let (tx, grpc_rx) = mpsc::channel(RESPONSE_BUFFER);
        let bars = Arc::clone(&self.bars);
        let active_streams = Arc::clone(&self.active_streams);
        let bars_streamed = Arc::clone(&self.bars_streamed);

        let active = active_streams.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_grpc_streams(active);

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    () = tx.closed() => {
                        tracing::info!("StreamKlines client went away");
                        break;
                    }
                    bar = async { bars.lock().await.recv().await } => bar,
                };

                let Some(bar) = next else {
                    tracing::info!("Bar channel closed, ending StreamKlines");
                    break;
                };

                if tx.send(Ok(KlineData::from(bar))).await.is_err() {
                    tracing::info!("StreamKlines send failed, ending stream");
                    break;
                }

                bars_streamed.fetch_add(1, Ordering::Relaxed);
                metrics::record_bar_streamed();
            }

            let active = active_streams.fetch_sub(1, Ordering::Relaxed) - 1;
            metrics::set_grpc_streams(active);
        });

        let stream = ReceiverStream::new(grpc_rx);
        Ok(Response::new(Box::pin(stream) as Self::StreamKlinesStream))
    }
}

// =============================================================================
// Tests
// =============================================================================
