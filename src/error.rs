// Compression errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompressError {
    /// The caller's buffer cannot hold the stream. `required` is the exact
    /// size the stream needs.
    #[error("output buffer too small: need {required} bytes, have {capacity}")]
    OutputTooSmall { required: usize, capacity: usize },

    /// The parser or resolver produced a state that should be impossible.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
