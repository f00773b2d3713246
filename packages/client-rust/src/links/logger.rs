//! Logger link: reference middleware that observes requests going up and
//! results coming down, timing each round trip.
//!
//! The logger is purely an observer. Every value, error, and completion is
//! forwarded unchanged to its own subscriber, and unsubscribe propagates
//! upstream. Its only side effect is handing structured records to the
//! configured log function (default: `tracing` events).

use std::sync::Arc;
use std::time::{Duration, Instant};

use linkpipe_core::{contains_error_marker, ChainError, Operation, OperationResult};

use crate::links::chain::{Dispatch, Link};
use crate::observable::{Observable, StreamObserver, Subscriber};

// ---------------------------------------------------------------------------
// Log records
// ---------------------------------------------------------------------------

/// What came back down for one request: a delivered result or a stream
/// failure.
#[derive(Debug)]
pub enum DownOutcome<'a> {
    /// A value delivered on the stream (success- or error-shaped).
    Result(&'a OperationResult),
    /// The stream's error channel fired.
    Failure(&'a ChainError),
}

/// One structured record handed to the log function. Direction is a tagged
/// variant; the down-only fields exist only on the down tag.
#[derive(Debug)]
pub enum LogRecord<'a> {
    /// Request observed on its way to the transport.
    Up {
        operation: &'a Operation,
    },
    /// Result or failure observed on its way back, with the round-trip time
    /// and the outcome classification used for reporting severity.
    Down {
        operation: &'a Operation,
        outcome: DownOutcome<'a>,
        elapsed: Duration,
        error_outcome: bool,
    },
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Predicate deciding whether a record is emitted at all.
pub type EnabledFn = Arc<dyn Fn(&LogRecord<'_>) -> bool + Send + Sync>;

/// Receiver for emitted records.
pub type LogFn = Arc<dyn Fn(&LogRecord<'_>) + Send + Sync>;

/// Predicate deciding whether a down outcome counts as an error for
/// reporting. What counts as an application error is the application's
/// contract; this only picks severity, never changes what is forwarded.
pub type ClassifyFn = Arc<dyn Fn(&DownOutcome<'_>) -> bool + Send + Sync>;

/// Configuration for [`LoggerLink`].
#[derive(Clone)]
pub struct LoggerOptions {
    /// Emit predicate. Default: always emit.
    pub enabled: EnabledFn,
    /// Record receiver. Default: structured `tracing` events, `error!` for
    /// error outcomes and `info!` otherwise.
    pub log: LogFn,
    /// Error-outcome classification. Default: stream failures, error-shaped
    /// results, and success payloads carrying an `"error"` key.
    pub classify: ClassifyFn,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            enabled: Arc::new(|_record| true),
            log: Arc::new(default_log),
            classify: Arc::new(default_classify),
        }
    }
}

impl LoggerOptions {
    /// Replaces the emit predicate.
    #[must_use]
    pub fn enabled(mut self, f: impl Fn(&LogRecord<'_>) -> bool + Send + Sync + 'static) -> Self {
        self.enabled = Arc::new(f);
        self
    }

    /// Replaces the record receiver.
    #[must_use]
    pub fn log(mut self, f: impl Fn(&LogRecord<'_>) + Send + Sync + 'static) -> Self {
        self.log = Arc::new(f);
        self
    }

    /// Replaces the classification predicate.
    #[must_use]
    pub fn classify(
        mut self,
        f: impl Fn(&DownOutcome<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.classify = Arc::new(f);
        self
    }
}

fn default_classify(outcome: &DownOutcome<'_>) -> bool {
    match outcome {
        DownOutcome::Failure(_) => true,
        DownOutcome::Result(result) => match result {
            OperationResult::Error { .. } => true,
            OperationResult::Data { data } => contains_error_marker(data),
        },
    }
}

#[allow(clippy::cast_possible_truncation)]
fn default_log(record: &LogRecord<'_>) {
    match record {
        LogRecord::Up { operation } => {
            tracing::info!(
                direction = "up",
                kind = %operation.kind,
                id = operation.id,
                path = %operation.path,
                ">> request"
            );
        }
        LogRecord::Down {
            operation,
            elapsed,
            error_outcome,
            ..
        } => {
            let elapsed_ms = elapsed.as_millis() as u64;
            if *error_outcome {
                tracing::error!(
                    direction = "down",
                    kind = %operation.kind,
                    id = operation.id,
                    path = %operation.path,
                    elapsed_ms,
                    "<< response"
                );
            } else {
                tracing::info!(
                    direction = "down",
                    kind = %operation.kind,
                    id = operation.id,
                    path = %operation.path,
                    elapsed_ms,
                    "<< response"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LoggerLink
// ---------------------------------------------------------------------------

/// Observing link. Per invocation: emit the up record, capture the start
/// time, subscribe downstream, emit one down record per delivered value (or
/// on stream failure) with the elapsed round-trip time.
pub struct LoggerLink {
    options: LoggerOptions,
}

impl LoggerLink {
    /// Logger with the given options.
    #[must_use]
    pub fn new(options: LoggerOptions) -> Self {
        Self { options }
    }
}

impl Default for LoggerLink {
    fn default() -> Self {
        Self::new(LoggerOptions::default())
    }
}

impl Link for LoggerLink {
    fn call(&self, op: Operation, next: Dispatch) -> Observable {
        let options = self.options.clone();
        Observable::new(move |subscriber| {
            let up = LogRecord::Up { operation: &op };
            if (options.enabled)(&up) {
                (options.log)(&up);
            }

            let observer = Arc::new(DownObserver {
                subscriber: subscriber.clone(),
                operation: op.clone(),
                start: Instant::now(),
                options: options.clone(),
            });
            let downstream = next(op.clone()).subscribe(observer);
            Ok(Box::new(move || downstream.unsubscribe()) as crate::observable::Teardown)
        })
    }
}

/// Downstream observer: logs the down record, then forwards unchanged.
struct DownObserver {
    subscriber: Subscriber,
    operation: Operation,
    start: Instant,
    options: LoggerOptions,
}

impl DownObserver {
    fn emit(&self, outcome: DownOutcome<'_>) {
        let error_outcome = (self.options.classify)(&outcome);
        let record = LogRecord::Down {
            operation: &self.operation,
            outcome,
            elapsed: self.start.elapsed(),
            error_outcome,
        };
        if (self.options.enabled)(&record) {
            (self.options.log)(&record);
        }
    }
}

impl StreamObserver for DownObserver {
    fn on_next(&self, value: OperationResult) {
        self.emit(DownOutcome::Result(&value));
        self.subscriber.next(value);
    }

    fn on_error(&self, error: ChainError) {
        self.emit(DownOutcome::Failure(&error));
        self.subscriber.error(error);
    }

    fn on_complete(&self) {
        self.subscriber.complete();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
