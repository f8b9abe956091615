//! Exchange Feed Adapter
//!
//! Upstream WebSocket client for the exchange kline stream and the wire types
//! it decodes.

pub mod client;
pub mod messages;

pub use client::{ExchangeFeedClient, FeedClientError, FrameOutcome, dispatch_frame};
pub use messages::{KlineEvent, KlinePayload, SubscribeRequest, normalize};
