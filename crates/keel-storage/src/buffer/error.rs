//! Buffer pool errors.

use thiserror::Error;

use crate::disk::DiskError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// No frame available: the free list is empty and every resident
    /// page is pinned.
    #[error("no free frames available, all pages are pinned")]
    NoFreeFrames,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The disk scheduler reported an I/O failure.
    #[error("disk I/O failed: {source}")]
    Disk {
        #[from]
        source: DiskError,
    },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried.
    ///
    /// `NoFreeFrames` clears once some caller unpins a page.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(BufferError::NoFreeFrames.is_retryable());
        assert!(!BufferError::config("bad pool size").is_retryable());
    }

    #[test]
    fn test_disk_error_conversion() {
        let err: BufferError = DiskError::Stopped.into();
        assert!(matches!(err, BufferError::Disk { .. }));
    }
}
