//! Subscription bridge: adapts a broadcast event source into an observable
//! stream per subscriber.
//!
//! On subscribe, the bridge registers a listener on the named channel; each
//! event fired on that channel becomes one `next` value. Teardown
//! deregisters exactly that listener. Events fired before subscription (or
//! after unsubscribe) are lost — the registry guarantees at-most-once,
//! no-replay delivery.

pub mod registry;

use std::sync::Arc;

use linkpipe_core::{Operation, OperationKind, OperationResult};

use crate::links::chain::Transport;
use crate::observable::{Observable, Teardown};

pub use registry::{ChannelRegistry, Listener, ListenerHandle};

// ---------------------------------------------------------------------------
// SubscriptionBridge
// ---------------------------------------------------------------------------

/// Per-subscriber adapter over a [`ChannelRegistry`].
///
/// Two subscriptions to the same channel are two independent listener
/// registrations; tearing one down leaves the other live.
#[derive(Clone)]
pub struct SubscriptionBridge {
    registry: Arc<ChannelRegistry>,
}

impl SubscriptionBridge {
    /// Bridge over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// The shared registry, for emitters (e.g. mutation handlers notifying
    /// "data changed" after their write commits).
    #[must_use]
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Open-ended stream of events on the named channel. Each emission on
    /// the channel is delivered as one successful result whose payload is
    /// the event payload, verbatim.
    #[must_use]
    pub fn stream(&self, channel: impl Into<String>) -> Observable {
        let registry = Arc::clone(&self.registry);
        let channel = channel.into();
        Observable::new(move |subscriber| {
            let handle = registry.on(
                &channel,
                Arc::new(move |payload| {
                    subscriber.next(OperationResult::data(payload.clone()));
                }),
            );
            let registry = Arc::clone(&registry);
            Ok(Box::new(move || registry.off(&handle)) as Teardown)
        })
    }
}

// ---------------------------------------------------------------------------
// BridgeTransport
// ---------------------------------------------------------------------------

/// Handler resolving one query or mutation. One value or one failure; the
/// transport supplies the completion.
pub type RequestHandler =
    Arc<dyn Fn(&Operation) -> Result<OperationResult, linkpipe_core::ChainError> + Send + Sync>;

/// Terminal transport that serves subscription operations from the bridge
/// channel named by the operation path, and delegates query/mutation to the
/// request handler.
///
/// Mutation handlers are expected to emit on the relevant channel after
/// their write commits; that emission is what reaches live subscription
/// streams.
pub struct BridgeTransport {
    bridge: SubscriptionBridge,
    handler: RequestHandler,
}

impl BridgeTransport {
    /// Transport over the given bridge and request handler.
    #[must_use]
    pub fn new(bridge: SubscriptionBridge, handler: RequestHandler) -> Self {
        Self { bridge, handler }
    }
}

impl Transport for BridgeTransport {
    fn dispatch(&self, op: Operation) -> Observable {
        match op.kind {
            OperationKind::Subscription => self.bridge.stream(op.path),
            OperationKind::Query | OperationKind::Mutation => {
                let handler = Arc::clone(&self.handler);
                Observable::new(move |subscriber| {
                    match handler(&op) {
                        Ok(result) => {
                            subscriber.next(result);
                            subscriber.complete();
                        }
                        Err(error) => subscriber.error(error),
                    }
                    Ok(Box::new(|| {}) as Teardown)
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
