//! `LinkPipe` Client — composable RPC link pipeline with cancellable
//! observable result streams and a subscription bridge for live events.
//!
//! Data flow: caller → link chain → `[link₁ → link₂ → …]` → transport →
//! observable stream → caller. For subscription operations the transport's
//! terminal stream is fed by the [`bridge::SubscriptionBridge`] instead of a
//! single request/response.

pub mod bridge;
pub mod client;
pub mod links;
pub mod observable;

pub use bridge::{BridgeTransport, ChannelRegistry, Listener, ListenerHandle, SubscriptionBridge};
pub use client::{ClientConfig, RpcClient};
pub use links::{
    build_link_chain, Dispatch, DownOutcome, Link, LogRecord, LoggerLink, LoggerOptions,
    TimeoutLink, Transport,
};
pub use observable::{FnObserver, Observable, StreamObserver, Subscriber, Subscription, Teardown};
