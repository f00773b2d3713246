//! Result types: the success/error union delivered for every operation.
//!
//! A query or mutation delivers exactly one [`OperationResult`] followed by
//! completion (or a stream-level error instead). A subscription delivers one
//! `OperationResult` per upstream event, never a terminal value.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ErrorShape
// ---------------------------------------------------------------------------

/// Structured error description carried by an error-shaped result.
///
/// This is taxonomy (a): a call rejected before or at the remote procedure
/// (validation failure, unknown path, handler error) surfaces as a
/// structurally valid delivery whose discriminant says "error". Transport
/// failures travel the stream's error channel instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorShape {
    /// Machine-readable error code (e.g. `BAD_REQUEST`, `NOT_FOUND`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional opaque detail payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
}

impl ErrorShape {
    /// Creates an error shape without detail payload.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// OperationResult
// ---------------------------------------------------------------------------

/// One delivery on an operation's result stream, discriminated on
/// success/error.
///
/// The payload is opaque to the pipeline; the `status` tag is the wire
/// discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OperationResult {
    /// Successful delivery with an opaque payload.
    Data { data: serde_json::Value },
    /// Error-shaped delivery with a structured description.
    Error { error: ErrorShape },
}

impl OperationResult {
    /// Successful result wrapping the given payload.
    #[must_use]
    pub fn data(data: serde_json::Value) -> Self {
        Self::Data { data }
    }

    /// Error-shaped result from a structured description.
    #[must_use]
    pub fn error(error: ErrorShape) -> Self {
        Self::Error { error }
    }

    /// True for the error-shaped variant.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Default application-level error heuristic: a JSON object payload carrying
/// an `"error"` key counts as an error outcome even though the delivery is
/// structurally successful.
///
/// This is deliberately only a default. What counts as an application error
/// is the application's contract; observing links take a pluggable predicate
/// and fall back to this when none is given.
#[must_use]
pub fn contains_error_marker(payload: &serde_json::Value) -> bool {
    payload
        .as_object()
        .is_some_and(|object| object.contains_key("error"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
