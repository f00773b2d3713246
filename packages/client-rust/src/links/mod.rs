//! Middleware links and the chain builder.

pub mod chain;
pub mod logger;
pub mod timeout;

pub use chain::{build_link_chain, Dispatch, Link, Transport};
pub use logger::{DownOutcome, LogRecord, LoggerLink, LoggerOptions};
pub use timeout::TimeoutLink;
