//! `LinkPipe` Core — operation and result data model shared by every link in
//! the client pipeline.

pub mod error;
pub mod operation;
pub mod result;

pub use error::ChainError;
pub use operation::{Operation, OperationKind, OperationMeta};
pub use result::{contains_error_marker, ErrorShape, OperationResult};
