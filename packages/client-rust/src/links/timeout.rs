//! Timeout link: races the downstream stream against a timer.
//!
//! The core pipeline has no built-in timeout; this link layers one on. The
//! timer guards time-to-first-delivery: it is disarmed by the first `next`
//! or any terminal signal. On expiry the link emits
//! [`ChainError::Timeout`] and unsubscribes downstream so the transport
//! tears down its in-flight call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use linkpipe_core::{ChainError, Operation, OperationResult};

use crate::links::chain::{Dispatch, Link};
use crate::observable::{Observable, StreamObserver, Subscriber, Teardown};

// ---------------------------------------------------------------------------
// TimeoutLink
// ---------------------------------------------------------------------------

/// Per-operation deadline middleware. Requires a Tokio runtime at subscribe
/// time; without one the stream fails with a setup error instead of
/// panicking.
#[derive(Debug, Clone)]
pub struct TimeoutLink {
    timeout_ms: u64,
}

impl TimeoutLink {
    /// Timeout link with the given deadline in milliseconds.
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }
}

impl Link for TimeoutLink {
    fn call(&self, op: Operation, next: Dispatch) -> Observable {
        let timeout_ms = self.timeout_ms;
        Observable::new(move |subscriber| {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                return Err(ChainError::setup("timeout link requires a tokio runtime"));
            };

            let disarmed = Arc::new(AtomicBool::new(false));
            let observer = Arc::new(DisarmingObserver {
                subscriber: subscriber.clone(),
                disarmed: Arc::clone(&disarmed),
            });
            let downstream = Arc::new(next(op.clone()).subscribe(observer));

            let timer = {
                let downstream = Arc::clone(&downstream);
                let disarmed = Arc::clone(&disarmed);
                runtime.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                    if !disarmed.load(Ordering::Acquire) {
                        subscriber.error(ChainError::Timeout { timeout_ms });
                        downstream.unsubscribe();
                    }
                })
            };

            Ok(Box::new(move || {
                timer.abort();
                downstream.unsubscribe();
            }) as Teardown)
        })
    }
}

/// Forwards everything downstream produced; the first delivery (or any
/// terminal) disarms the timer.
struct DisarmingObserver {
    subscriber: Subscriber,
    disarmed: Arc<AtomicBool>,
}

impl StreamObserver for DisarmingObserver {
    fn on_next(&self, value: OperationResult) {
        self.disarmed.store(true, Ordering::Release);
        self.subscriber.next(value);
    }

    fn on_error(&self, error: ChainError) {
        self.disarmed.store(true, Ordering::Release);
        self.subscriber.error(error);
    }

    fn on_complete(&self) {
        self.disarmed.store(true, Ordering::Release);
        self.subscriber.complete();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
