//! Error types for the disk layer.

use std::io;

use thiserror::Error;

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur while reading or writing the page store.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// A request payload did not match the store's page size.
    #[error("payload has {actual} bytes, page size is {expected}")]
    PayloadSize { expected: usize, actual: usize },

    /// The scheduler's worker has shut down; the request was dropped.
    #[error("disk scheduler has shut down")]
    Stopped,
}

impl DiskError {
    /// Returns true if this is a transient error that can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { source } => {
                source.kind() == io::ErrorKind::Interrupted
                    || source.kind() == io::ErrorKind::WouldBlock
            }
            _ => false,
        }
    }
}
