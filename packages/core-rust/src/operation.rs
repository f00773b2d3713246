//! Operation types: the immutable description of one client-issued call.
//!
//! An [`Operation`] is created per call, threaded unchanged through the link
//! chain, and discarded after its terminal result (for subscriptions, after
//! unsubscribe). Links that need to annotate an operation clone it; nothing
//! in the pipeline mutates one in place.

use serde::{Deserialize, Serialize};

/// Opaque per-operation metadata. Links and transports may read it; the
/// pipeline itself never interprets it.
pub type OperationMeta = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// The three call kinds exposed to application code.
///
/// This is the entire public vocabulary of the pipeline: reads, writes, and
/// open-ended streams. Wire names are lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read; no side effect assumed.
    Query,
    /// Write; expected to notify the event channel after its commit.
    Mutation,
    /// Open-ended stream of results until either side ends it.
    Subscription,
}

impl OperationKind {
    /// Lowercase name, for log records and span fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One client-issued call: kind, remote procedure path, opaque input, a
/// correlation id unique per in-flight call, and opaque metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Correlation id, unique among in-flight calls on one client.
    pub id: u64,
    /// Call kind.
    pub kind: OperationKind,
    /// Dot-separated path identifying the remote procedure (e.g. `posts.add`).
    pub path: String,
    /// Opaque input payload; the pipeline never inspects it.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Opaque metadata mapping.
    #[serde(default, skip_serializing_if = "OperationMeta::is_empty")]
    pub meta: OperationMeta,
}

impl Operation {
    /// Creates an operation with empty metadata.
    #[must_use]
    pub fn new(
        id: u64,
        kind: OperationKind,
        path: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id,
            kind,
            path: path.into(),
            input,
            meta: OperationMeta::new(),
        }
    }

    /// Returns a copy carrying the given metadata entry. The original is
    /// left untouched; annotation always goes through a clone.
    #[must_use]
    pub fn with_meta(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut copy = self.clone();
        copy.meta.insert(key.into(), value);
        copy
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
