//! Stream-level error taxonomy.
//!
//! [`ChainError`] travels the error channel of a result stream. It is
//! distinct from an error-shaped [`OperationResult`](crate::OperationResult):
//! the latter is a structurally successful delivery describing a remote
//! failure, while `ChainError` means the stream itself broke (transport
//! fault, timeout, torn-down channel). Links forward these unchanged; they
//! never downgrade one into an error-shaped result or swallow it silently.

/// Error delivered on a result stream's error channel.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Network or remote endpoint failure.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The downstream stream produced nothing before the deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The event channel backing a subscription went away.
    #[error("subscription channel closed: {channel}")]
    ChannelClosed { channel: String },

    /// A stream producer failed during subscribe. Setup faults are reported
    /// here so callers have one uniform failure channel.
    #[error("stream setup failed: {message}")]
    Setup { message: String },

    /// Escape hatch for link-specific failures.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChainError {
    /// Transport failure from any displayable cause.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Setup failure from any displayable cause.
    #[must_use]
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }
}
