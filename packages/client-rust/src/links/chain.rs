//! Link chain composition: folds an ordered list of links and a terminal
//! transport into a single dispatch function.
//!
//! Composition order for `[L1, L2, .., Ln]`:
//! `dispatch = L1(op, || L2(op, .. || Ln(op, || transport(op))))`. A link
//! that never invokes `next` short-circuits the chain; downstream links and
//! the transport never execute for that call. This is the supported
//! mechanism for cache hits and auth rejection.
//!
//! Link implementer contract:
//! - return a valid [`Observable`];
//! - propagate unsubscribe to any upstream stream it subscribed to;
//! - never swallow an `error` silently — recovery must still deliver a
//!   value/completion or a substitute error.

use std::sync::Arc;

use linkpipe_core::Operation;

use crate::observable::Observable;

/// The "continue to the next link" continuation. Cloning is cheap; links
/// capture a clone inside their producer so subscribing stays lazy.
pub type Dispatch = Arc<dyn Fn(Operation) -> Observable + Send + Sync>;

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// One middleware step in the pipeline.
///
/// Stateless across calls: any bookkeeping (a start timestamp, a retry
/// counter) is scoped to a single invocation, captured inside the returned
/// stream's producer. A chain instance is built once and reused for every
/// operation.
pub trait Link: Send + Sync {
    /// Handles one operation. Pass through with `next(op)`, short-circuit by
    /// answering without calling `next`, or wrap the downstream stream.
    fn call(&self, op: Operation, next: Dispatch) -> Observable;
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Terminal collaborator performing the actual remote call.
///
/// For query/mutation the returned stream resolves to one value then
/// completes; for subscription it stays open, one value per upstream event,
/// until either side ends it.
pub trait Transport: Send + Sync {
    /// Issues the operation against the remote endpoint.
    fn dispatch(&self, op: Operation) -> Observable;
}

// ---------------------------------------------------------------------------
// Chain builder
// ---------------------------------------------------------------------------

/// Folds links right-to-left into one dispatch function terminating in the
/// transport. The fold is explicit so composition order is testable on its
/// own, with no recursion hidden in nested continuations.
#[must_use]
pub fn build_link_chain(links: Vec<Arc<dyn Link>>, transport: Arc<dyn Transport>) -> Dispatch {
    let mut dispatch: Dispatch = Arc::new(move |op| transport.dispatch(op));
    for link in links.into_iter().rev() {
        let next = dispatch;
        dispatch = Arc::new(move |op| link.call(op, Arc::clone(&next)));
    }
    dispatch
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
