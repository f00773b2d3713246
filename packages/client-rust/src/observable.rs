//! Observable stream primitive: a cancellable, possibly-unbounded producer
//! of operation results with explicit completion and error signaling.
//!
//! Every link in the chain speaks this type. The guarantees links rely on:
//!
//! - After the first terminal signal (`error`, `complete`, or unsubscribe)
//!   no further delivery reaches the observer on that subscription.
//! - Producer teardown runs exactly once, whether triggered by a terminal
//!   signal or by unsubscribe, and unsubscribe is idempotent.
//! - Each subscribe is an independent execution of the producer; there is
//!   no shared replay between subscriptions.
//! - A producer that fails during setup reports through the `error` channel
//!   (the producer returns `Result`), so callers have one uniform failure
//!   channel.

use std::sync::Arc;

use linkpipe_core::{ChainError, OperationResult};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// StreamObserver
// ---------------------------------------------------------------------------

/// Receiver side of a subscription.
///
/// Methods take `&self`; implementations use interior mutability for any
/// bookkeeping. Used as `Arc<dyn StreamObserver>`.
pub trait StreamObserver: Send + Sync {
    /// One value delivered by the producer.
    fn on_next(&self, value: OperationResult);

    /// Terminal failure; no further deliveries follow.
    fn on_error(&self, error: ChainError);

    /// Terminal completion; no further deliveries follow.
    fn on_complete(&self);
}

/// Closure-based observer for callers that only care about some signals.
/// Handlers left unset ignore their signal.
#[derive(Default)]
pub struct FnObserver {
    next: Option<Box<dyn Fn(OperationResult) + Send + Sync>>,
    error: Option<Box<dyn Fn(ChainError) + Send + Sync>>,
    complete: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FnObserver {
    /// Observer with no handlers; attach them with the builder methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `next` handler.
    #[must_use]
    pub fn next(mut self, handler: impl Fn(OperationResult) + Send + Sync + 'static) -> Self {
        self.next = Some(Box::new(handler));
        self
    }

    /// Sets the `error` handler.
    #[must_use]
    pub fn error(mut self, handler: impl Fn(ChainError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(handler));
        self
    }

    /// Sets the `complete` handler.
    #[must_use]
    pub fn complete(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.complete = Some(Box::new(handler));
        self
    }
}

impl StreamObserver for FnObserver {
    fn on_next(&self, value: OperationResult) {
        if let Some(handler) = &self.next {
            handler(value);
        }
    }

    fn on_error(&self, error: ChainError) {
        if let Some(handler) = &self.error {
            handler(error);
        }
    }

    fn on_complete(&self) {
        if let Some(handler) = &self.complete {
            handler();
        }
    }
}

// ---------------------------------------------------------------------------
// Shared subscription state
// ---------------------------------------------------------------------------

/// Producer-side cleanup, run exactly once per subscription.
pub type Teardown = Box<dyn FnOnce() + Send>;

enum State {
    Active {
        observer: Arc<dyn StreamObserver>,
        teardown: Option<Teardown>,
    },
    Closed,
}

struct Shared {
    state: Mutex<State>,
}

impl Shared {
    /// Clones the observer out if the subscription is still live. Deliveries
    /// happen outside the lock so observers may re-enter (e.g. unsubscribe
    /// from inside `on_next`).
    fn live_observer(&self) -> Option<Arc<dyn StreamObserver>> {
        match &*self.state.lock() {
            State::Active { observer, .. } => Some(Arc::clone(observer)),
            State::Closed => None,
        }
    }

    /// Moves to `Closed`, returning what was active. The caller delivers any
    /// terminal signal and runs the teardown after the lock is released.
    fn close(&self) -> Option<(Arc<dyn StreamObserver>, Option<Teardown>)> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Active { observer, teardown } => Some((observer, teardown)),
            State::Closed => None,
        }
    }

    /// Silent close: stop deliveries and run teardown without any terminal
    /// signal to the observer. Idempotent.
    fn unsubscribe(&self) {
        if let Some((_observer, teardown)) = self.close() {
            if let Some(teardown) = teardown {
                teardown();
            }
        }
    }

    /// Stores the producer's teardown, or runs it immediately when the
    /// subscription already terminated during synchronous setup.
    fn attach_teardown(&self, new_teardown: Teardown) {
        {
            let mut state = self.state.lock();
            if let State::Active { teardown, .. } = &mut *state {
                *teardown = Some(new_teardown);
                return;
            }
        }
        // Already closed: the terminal signal won the race, so clean up now.
        new_teardown();
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Handle the producer pushes deliveries through.
///
/// All methods are gated: once the subscription is closed they become
/// no-ops, so producers never have to coordinate with cancellation.
#[derive(Clone)]
pub struct Subscriber {
    shared: Arc<Shared>,
}

impl Subscriber {
    /// Delivers one value, unless the subscription already terminated.
    pub fn next(&self, value: OperationResult) {
        if let Some(observer) = self.shared.live_observer() {
            observer.on_next(value);
        }
    }

    /// Delivers a terminal error, then runs teardown. First terminal wins.
    pub fn error(&self, error: ChainError) {
        if let Some((observer, teardown)) = self.shared.close() {
            observer.on_error(error);
            if let Some(teardown) = teardown {
                teardown();
            }
        }
    }

    /// Delivers completion, then runs teardown. First terminal wins.
    pub fn complete(&self) {
        if let Some((observer, teardown)) = self.shared.close() {
            observer.on_complete();
            if let Some(teardown) = teardown {
                teardown();
            }
        }
    }

    /// True once a terminal signal or unsubscribe has landed. Long-lived
    /// producers can poll this to stop doing work early.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Closed)
    }
}

/// Forwarding observer: a pure pass-through link subscribes downstream with
/// a clone of its own subscriber.
impl StreamObserver for Subscriber {
    fn on_next(&self, value: OperationResult) {
        self.next(value);
    }

    fn on_error(&self, error: ChainError) {
        self.error(error);
    }

    fn on_complete(&self) {
        self.complete();
    }
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

type Producer = dyn Fn(Subscriber) -> Result<Teardown, ChainError> + Send + Sync;

/// A lazy, restartable stream factory. Nothing runs until [`subscribe`];
/// each subscribe invokes the producer from scratch.
///
/// [`subscribe`]: Observable::subscribe
#[derive(Clone)]
pub struct Observable {
    producer: Arc<Producer>,
}

impl Observable {
    /// Wraps a producer. The producer receives the gated [`Subscriber`] and
    /// returns its teardown; returning `Err` delivers the failure on the
    /// observer's `error` channel instead of unwinding into the caller.
    pub fn new<P>(producer: P) -> Self
    where
        P: Fn(Subscriber) -> Result<Teardown, ChainError> + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Stream that delivers one value then completes, synchronously on
    /// subscribe. The resolved shape of every query/mutation transport.
    #[must_use]
    pub fn once(result: OperationResult) -> Self {
        Self::new(move |subscriber| {
            subscriber.next(result.clone());
            subscriber.complete();
            Ok(Box::new(|| {}))
        })
    }

    /// Runs the producer for this subscription and returns the cancellation
    /// handle. Dropping the handle unsubscribes; call
    /// [`Subscription::detach`] to opt out.
    pub fn subscribe(&self, observer: Arc<dyn StreamObserver>) -> Subscription {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Active {
                observer,
                teardown: None,
            }),
        });
        let subscriber = Subscriber {
            shared: Arc::clone(&shared),
        };

        match (self.producer)(subscriber.clone()) {
            Ok(teardown) => shared.attach_teardown(teardown),
            Err(error) => subscriber.error(error),
        }

        Subscription {
            shared,
            detached: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Cancellation handle for one subscription.
pub struct Subscription {
    shared: Arc<Shared>,
    detached: bool,
}

impl Subscription {
    /// Stops future deliveries and runs producer teardown. Safe to call any
    /// number of times; after the first call (or a terminal signal) this is
    /// a no-op.
    pub fn unsubscribe(&self) {
        self.shared.unsubscribe();
    }

    /// True once the subscription terminated or was unsubscribed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Closed)
    }

    /// Consumes the handle without unsubscribing. The subscription then
    /// lives until a terminal signal from the producer.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.shared.unsubscribe();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use linkpipe_core::ErrorShape;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    use super::*;

    /// Records every signal in arrival order.
    #[derive(Default)]
    struct RecordingObserver {
        events: PlMutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl StreamObserver for RecordingObserver {
        fn on_next(&self, value: OperationResult) {
            let tag = match value {
                OperationResult::Data { data } => format!("next:{data}"),
                OperationResult::Error { error } => format!("next-err:{}", error.code),
            };
            self.events.lock().push(tag);
        }

        fn on_error(&self, error: ChainError) {
            self.events.lock().push(format!("error:{error}"));
        }

        fn on_complete(&self) {
            self.events.lock().push("complete".to_string());
        }
    }

    #[test]
    fn delivers_value_then_complete() {
        let observer = Arc::new(RecordingObserver::default());
        let stream = Observable::once(OperationResult::data(json!("ok")));
        let sub = stream.subscribe(Arc::clone(&observer) as Arc<dyn StreamObserver>);

        assert_eq!(observer.events(), vec!["next:\"ok\"", "complete"]);
        assert!(sub.is_closed());
    }

    #[test]
    fn no_delivery_after_complete() {
        let observer = Arc::new(RecordingObserver::default());
        let stream = Observable::new(|subscriber| {
            subscriber.next(OperationResult::data(json!(1)));
            subscriber.complete();
            subscriber.next(OperationResult::data(json!(2)));
            subscriber.error(ChainError::transport("late"));
            Ok(Box::new(|| {}) as Teardown)
        });
        stream
            .subscribe(Arc::clone(&observer) as Arc<dyn StreamObserver>)
            .detach();

        assert_eq!(observer.events(), vec!["next:1", "complete"]);
    }

    #[test]
    fn no_delivery_after_error() {
        let observer = Arc::new(RecordingObserver::default());
        let stream = Observable::new(|subscriber| {
            subscriber.error(ChainError::transport("boom"));
            subscriber.next(OperationResult::data(json!(1)));
            subscriber.complete();
            Ok(Box::new(|| {}) as Teardown)
        });
        stream
            .subscribe(Arc::clone(&observer) as Arc<dyn StreamObserver>)
            .detach();

        assert_eq!(observer.events(), vec!["error:transport failure: boom"]);
    }

    #[test]
    fn unsubscribe_stops_deliveries_and_runs_teardown_once() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let observer = Arc::new(RecordingObserver::default());

        let producer_subscriber: Arc<PlMutex<Option<Subscriber>>> =
            Arc::new(PlMutex::new(None));
        let slot = Arc::clone(&producer_subscriber);
        let counter = Arc::clone(&teardowns);
        let stream = Observable::new(move |subscriber| {
            *slot.lock() = Some(subscriber);
            let counter = Arc::clone(&counter);
            Ok(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }) as Teardown)
        });

        let sub = stream.subscribe(Arc::clone(&observer) as Arc<dyn StreamObserver>);
        sub.unsubscribe();
        sub.unsubscribe();

        // A producer still holding the subscriber cannot reach the observer.
        let held = producer_subscriber.lock().take().unwrap();
        assert!(held.is_closed());
        held.next(OperationResult::data(json!("late")));
        held.complete();

        assert!(observer.events().is_empty());
        assert_eq!(teardowns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn terminal_signal_runs_teardown_without_unsubscribe() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&teardowns);
        let stream = Observable::new(move |subscriber| {
            subscriber.complete();
            let counter = Arc::clone(&counter);
            Ok(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }) as Teardown)
        });

        let sub = stream.subscribe(Arc::new(RecordingObserver::default()));
        assert_eq!(teardowns.load(Ordering::Relaxed), 1);
        drop(sub);
        assert_eq!(teardowns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn dropping_the_handle_unsubscribes() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&teardowns);
        let stream = Observable::new(move |_subscriber| {
            let counter = Arc::clone(&counter);
            Ok(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }) as Teardown)
        });

        drop(stream.subscribe(Arc::new(RecordingObserver::default())));
        assert_eq!(teardowns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn each_subscribe_is_an_independent_execution() {
        let executions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executions);
        let stream = Observable::new(move |subscriber| {
            let run = counter.fetch_add(1, Ordering::Relaxed);
            subscriber.next(OperationResult::data(json!(run)));
            subscriber.complete();
            Ok(Box::new(|| {}) as Teardown)
        });

        let first = Arc::new(RecordingObserver::default());
        let second = Arc::new(RecordingObserver::default());
        stream
            .subscribe(Arc::clone(&first) as Arc<dyn StreamObserver>)
            .detach();
        stream
            .subscribe(Arc::clone(&second) as Arc<dyn StreamObserver>)
            .detach();

        assert_eq!(first.events(), vec!["next:0", "complete"]);
        assert_eq!(second.events(), vec!["next:1", "complete"]);
    }

    #[test]
    fn producer_setup_failure_reports_through_error_channel() {
        let observer = Arc::new(RecordingObserver::default());
        let stream = Observable::new(|_subscriber| Err(ChainError::setup("no runtime")));
        stream
            .subscribe(Arc::clone(&observer) as Arc<dyn StreamObserver>)
            .detach();

        assert_eq!(
            observer.events(),
            vec!["error:stream setup failed: no runtime"]
        );
    }

    #[test]
    fn unsubscribe_from_inside_on_next_does_not_deadlock() {
        let seen = Arc::new(AtomicUsize::new(0));
        let handle: Arc<PlMutex<Option<Subscription>>> = Arc::new(PlMutex::new(None));
        let producer_subscriber: Arc<PlMutex<Option<Subscriber>>> =
            Arc::new(PlMutex::new(None));

        let counter = Arc::clone(&seen);
        let reentrant = Arc::clone(&handle);
        let observer = Arc::new(FnObserver::new().next(move |_value| {
            counter.fetch_add(1, Ordering::Relaxed);
            // Cancel from inside the delivery callback.
            if let Some(sub) = &*reentrant.lock() {
                sub.unsubscribe();
            }
        }));

        let slot = Arc::clone(&producer_subscriber);
        let stream = Observable::new(move |subscriber| {
            *slot.lock() = Some(subscriber);
            Ok(Box::new(|| {}) as Teardown)
        });

        *handle.lock() = Some(stream.subscribe(observer as Arc<dyn StreamObserver>));
        let pushed = producer_subscriber.lock().take().unwrap();
        pushed.next(OperationResult::data(json!(1)));
        pushed.next(OperationResult::data(json!(2)));

        // First delivery cancelled the subscription; the second never lands.
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn error_shaped_result_is_a_next_delivery_not_a_stream_error() {
        let observer = Arc::new(RecordingObserver::default());
        let stream = Observable::once(OperationResult::error(ErrorShape::new(
            "BAD_REQUEST",
            "invalid input",
        )));
        stream
            .subscribe(Arc::clone(&observer) as Arc<dyn StreamObserver>)
            .detach();

        assert_eq!(observer.events(), vec!["next-err:BAD_REQUEST", "complete"]);
    }
}
