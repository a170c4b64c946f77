//! Error types and handling for pipestream
//!
//! Every stage-local failure is converted into a [`StreamError`] and travels
//! down the pipeline as the terminal item of the stream, where the terminal
//! operator surfaces it to the caller.

use std::fmt::Display;

/// Main error type for pipeline operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    /// A transform, predicate or flush hook failed
    #[error("Transform error: {0}")]
    Transform(String),
    /// A second reader or writer tried to attach to a locked endpoint
    #[error("Stream is already locked by another reader or writer")]
    ConcurrentAccess,
    /// The underlying writer accepted zero bytes while bytes remained
    #[error("Writer made no progress at position {position} ({remaining} bytes remaining)")]
    NoProgress { position: u64, remaining: usize },
    /// I/O related errors
    #[error("IO error: {0}")]
    IO(String),
    /// The source failed while producing items
    #[error("Source error: {0}")]
    Source(String),
    /// Write attempted on a closed endpoint
    #[error("Stream is closed")]
    Closed,
    /// The endpoint was aborted with the given reason
    #[error("Stream aborted: {0}")]
    Aborted(String),
    /// Items could not be concatenated by the selected collect policy
    #[error("Collect error: {0}")]
    Collect(String),
    /// Custom error with message
    #[error("Stream error: {0}")]
    Custom(String),
}

impl StreamError {
    /// Wrap any displayable failure of a user-supplied function.
    pub fn transform(err: impl Display) -> Self {
        StreamError::Transform(err.to_string())
    }

    /// Wrap any displayable failure of a source iterator or stream.
    pub fn source(err: impl Display) -> Self {
        StreamError::Source(err.to_string())
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::IO(err.to_string())
    }
}

/// Result type for pipestream operations
pub type StreamResult<T> = Result<T, StreamError>;
