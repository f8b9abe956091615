//! Process Shutdown
//!
//! Signal handling shared by both binaries.

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Wait for SIGINT or SIGTERM, then cancel `shutdown_token`.
#[allow(clippy::expect_used)]
pub async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            return;
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn waits_while_token_is_live() {
        let token = CancellationToken::new();
        let mut shutdown = task::spawn(await_shutdown(token.clone()));

        assert_pending!(shutdown.poll());

        token.cancel();
        assert!(shutdown.is_woken());
        assert_ready!(shutdown.poll());
    }

    #[tokio::test]
    async fn returns_at_once_for_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();

        let mut shutdown = task::spawn(await_shutdown(token));

        assert_ready!(shutdown.poll());
    }
}
