//! Client facade: builds the link chain once and turns typed entry points
//! into dispatched operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use linkpipe_core::{Operation, OperationKind};

use crate::links::chain::{build_link_chain, Dispatch, Link, Transport};
use crate::links::logger::LoggerLink;
use crate::links::timeout::TimeoutLink;
use crate::observable::Observable;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Client-level configuration for the default link stack.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline applied by the default timeout link, in milliseconds.
    pub default_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// RpcClient
// ---------------------------------------------------------------------------

/// Entry point for application code.
///
/// Constructed once: the chain is folded at construction and holds no
/// per-call state, so one client serves any number of logically concurrent
/// operations. Correlation ids are allocated from a per-client counter,
/// unique among in-flight calls.
pub struct RpcClient {
    dispatch: Dispatch,
    next_call_id: AtomicU64,
}

impl RpcClient {
    /// Client over an explicit link stack and terminal transport.
    #[must_use]
    pub fn new(links: Vec<Arc<dyn Link>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            dispatch: build_link_chain(links, transport),
            next_call_id: AtomicU64::new(1),
        }
    }

    /// Client with the default stack: `[logger, timeout] → transport`.
    #[must_use]
    pub fn with_defaults(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            vec![
                Arc::new(LoggerLink::default()),
                Arc::new(TimeoutLink::new(config.default_timeout_ms)),
            ],
            transport,
        )
    }

    /// Read call: resolves to one value then completes (or fails).
    pub fn query(&self, path: impl Into<String>, input: serde_json::Value) -> Observable {
        self.call(OperationKind::Query, path, input)
    }

    /// Write call: one value then completion; the handler is expected to
    /// notify the event channel after its commit.
    pub fn mutation(&self, path: impl Into<String>, input: serde_json::Value) -> Observable {
        self.call(OperationKind::Mutation, path, input)
    }

    /// Open-ended stream; stays live until unsubscribe or an upstream
    /// terminal.
    pub fn subscription(&self, path: impl Into<String>, input: serde_json::Value) -> Observable {
        self.call(OperationKind::Subscription, path, input)
    }

    fn call(
        &self,
        kind: OperationKind,
        path: impl Into<String>,
        input: serde_json::Value,
    ) -> Observable {
        let id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        (self.dispatch)(Operation::new(id, kind, path, input))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
