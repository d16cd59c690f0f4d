//! Error types for the paged range cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading through the caching stream
#[derive(Error, Debug)]
pub enum Error {
    /// Seek or position set landed outside the stream bounds
    #[error("position {requested} is outside the stream bounds 0..={length}")]
    InvalidPosition { requested: i128, length: u64 },

    /// Operation not offered by this capability
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// I/O error while draining a range fetch
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error from the range backend
    #[error("HTTP range request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend could not report the total resource length
    #[error("cannot determine resource length: {0}")]
    LengthProbe(String),

    /// The remote object changed identity since the accessor was opened
    #[error("remote resource changed since the accessor was opened")]
    ResourceChanged,

    /// A range fetch ended before the requested span was fully drained
    #[error("range fetch yielded {actual} bytes, expected {expected}")]
    IncompleteFetch { expected: u64, actual: u64 },

    /// An in-flight operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The stream has been disposed
    #[error("stream has been disposed")]
    Disposed,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
