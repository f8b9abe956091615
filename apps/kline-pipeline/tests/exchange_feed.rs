//! Exchange Feed Integration Tests
//!
//! Runs the feed client against a local WebSocket server standing in for the
//! exchange.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use kline_pipeline::infrastructure::config::FeedSettings;
use kline_pipeline::{ExchangeFeedClient, FeedClientError};

const CLOSED_KLINE: &str = r#"{"e":"kline","E":1672515782136,"s":"BNBBTC","k":{"t":1672515780000,"T":1672515839999,"s":"BNBBTC","i":"1m","o":"0.0010","c":"0.0020","h":"0.0025","l":"0.0015","v":"1000","n":100,"x":true}}"#;

const TRADE: &str = r#"{"e":"trade","E":1672515782136,"s":"BNBBTC","t":12345,"p":"0.001","q":"100"}"#;

/// Accept one connection, capture the subscribe message, send `frames`, then
/// close.
async fn setup_fake_exchange(
    frames: Vec<Message>,
) -> (SocketAddr, tokio::task::JoinHandle<serde_json::Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let subscribe = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected subscribe text frame, got {other:?}"),
        };

        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        ws.close(None).await.unwrap();
        subscribe
    });

    (addr, handle)
}

fn settings(addr: SocketAddr) -> FeedSettings {
    FeedSettings {
        url: format!("ws://{addr}"),
        stream: "bnbbtc@kline_1m".to_string(),
        subscribe_id: 7,
    }
}

#[tokio::test]
async fn forwards_raw_frames_and_parsed_bars() {
    let (addr, exchange) = setup_fake_exchange(vec![
        Message::Text(CLOSED_KLINE.into()),
        Message::Text(TRADE.into()),
    ])
    .await;

    let (raw_tx, mut raw_rx) = mpsc::channel(8);
    let (bar_tx, mut bar_rx) = mpsc::channel(8);
    let client = ExchangeFeedClient::new(settings(addr), raw_tx, bar_tx);

    let result = timeout(Duration::from_secs(5), client.run())
        .await
        .expect("feed client did not finish");
    assert!(matches!(result, Err(FeedClientError::ConnectionClosed)));

    let subscribe = exchange.await.unwrap();
    assert_eq!(subscribe["method"], "SUBSCRIBE");
    assert_eq!(subscribe["params"][0], "bnbbtc@kline_1m");
    assert_eq!(subscribe["id"], 7);

    assert_eq!(raw_rx.recv().await.unwrap(), CLOSED_KLINE);
    assert_eq!(raw_rx.recv().await.unwrap(), TRADE);
    assert!(raw_rx.try_recv().is_err());

    let bar = bar_rx.recv().await.unwrap();
    assert_eq!(bar.symbol, "BNBBTC");
    assert_eq!(bar.close, 0.002);
    assert_eq!(bar.trade_count, 100);
    assert!(bar.is_closed);
    assert!(bar_rx.try_recv().is_err());
}

#[tokio::test]
async fn binary_frames_are_treated_as_text() {
    let (addr, exchange) =
        setup_fake_exchange(vec![Message::Binary(CLOSED_KLINE.as_bytes().to_vec().into())]).await;

    let (raw_tx, mut raw_rx) = mpsc::channel(8);
    let (bar_tx, mut bar_rx) = mpsc::channel(8);
    let client = ExchangeFeedClient::new(settings(addr), raw_tx, bar_tx);

    let result = timeout(Duration::from_secs(5), client.run()).await.unwrap();
    assert!(result.is_err());
    exchange.await.unwrap();

    assert_eq!(raw_rx.recv().await.unwrap(), CLOSED_KLINE);
    assert!(bar_rx.recv().await.unwrap().is_closed);
}

#[tokio::test]
async fn ping_is_answered_with_matching_pong() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let exchange = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Subscribe request first.
        assert!(matches!(ws.next().await.unwrap().unwrap(), Message::Text(_)));

        ws.send(Message::Ping("heartbeat".into())).await.unwrap();
        let reply = loop {
            match timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("no reply to ping")
                .unwrap()
                .unwrap()
            {
                Message::Pong(payload) => break payload,
                Message::Text(_) | Message::Binary(_) => {}
                other => panic!("unexpected frame {other:?}"),
            }
        };

        ws.close(None).await.unwrap();
        reply
    });

    let (raw_tx, mut raw_rx) = mpsc::channel(8);
    let (bar_tx, _bar_rx) = mpsc::channel(8);
    let client = ExchangeFeedClient::new(settings(addr), raw_tx, bar_tx);

    let result = timeout(Duration::from_secs(5), client.run()).await.unwrap();
    assert!(matches!(result, Err(FeedClientError::ConnectionClosed)));

    let pong = exchange.await.unwrap();
    assert_eq!(pong.as_ref(), b"heartbeat");
    // Control frames are not forwarded to raw subscribers.
    assert!(raw_rx.try_recv().is_err());
}
