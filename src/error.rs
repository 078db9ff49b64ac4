//! Error types and handling for msgbuf

/// Result type alias for msgbuf operations
pub type Result<T> = std::result::Result<T, MsgBufError>;

/// Error kinds raised by the buffer pool, message handles and the multiplexer
///
/// A poll that times out is not an error: `poll` returns `Ok(0)`.
#[derive(Debug, thiserror::Error)]
pub enum MsgBufError {
    /// Registration table is full
    #[error("Capacity exceeded: {what} holds at most {capacity} entries")]
    CapacityExceeded { what: &'static str, capacity: usize },

    /// Zero-length request or a length no size class can hold
    #[error("Invalid size {requested}: {message}")]
    InvalidSize { requested: usize, message: String },

    /// Handle accessed after it was released
    #[error("Use after release: message handle {handle} was already released")]
    UseAfterRelease { handle: u64 },

    /// Handle released a second time
    #[error("Double release: message handle {handle} was already released")]
    DoubleRelease { handle: u64 },

    /// The system allocator returned null
    #[error("Allocation failure: {size} bytes aligned to {align}")]
    AllocationFailure { size: usize, align: usize },

    /// Buffer handed to a pool that did not create it
    #[error("Foreign buffer: buffer from pool {buffer_pool} returned to pool {pool}")]
    ForeignBuffer { pool: u64, buffer_pool: u64 },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Transport has nothing to deliver right now
    #[error("Operation would block")]
    WouldBlock,

    /// I/O related errors (poll, eventfd, sockets)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl MsgBufError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an I/O error from a nix errno
    pub fn from_errno(errno: nix::errno::Errno, context: &str) -> Self {
        Self::from_io(std::io::Error::from_raw_os_error(errno as i32), context)
    }

    /// Create a capacity exceeded error
    pub fn capacity_exceeded(what: &'static str, capacity: usize) -> Self {
        Self::CapacityExceeded { what, capacity }
    }

    /// Create an invalid size error
    pub fn invalid_size(requested: usize, message: impl Into<String>) -> Self {
        Self::InvalidSize {
            requested,
            message: message.into(),
        }
    }

    /// Create a use-after-release error
    pub fn use_after_release(handle: u64) -> Self {
        Self::UseAfterRelease { handle }
    }

    /// Create a double release error
    pub fn double_release(handle: u64) -> Self {
        Self::DoubleRelease { handle }
    }

    /// Create an allocation failure error
    pub fn allocation_failure(size: usize, align: usize) -> Self {
        Self::AllocationFailure { size, align }
    }

    /// Create a foreign buffer error
    pub fn foreign_buffer(pool: u64, buffer_pool: u64) -> Self {
        Self::ForeignBuffer { pool, buffer_pool }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// True for the programmer errors that a released handle reports
    pub fn is_release_misuse(&self) -> bool {
        matches!(self, Self::UseAfterRelease { .. } | Self::DoubleRelease { .. })
    }
}

impl From<std::io::Error> for MsgBufError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<nix::errno::Errno> for MsgBufError {
    fn from(errno: nix::errno::Errno) -> Self {
        Self::from_errno(errno, "system call failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MsgBufError::invalid_size(0, "zero-length request");
        assert!(matches!(err, MsgBufError::InvalidSize { requested: 0, .. }));

        let err = MsgBufError::capacity_exceeded("multiplexer", 4);
        assert!(matches!(err, MsgBufError::CapacityExceeded { capacity: 4, .. }));

        let err = MsgBufError::double_release(7);
        assert!(err.is_release_misuse());
        assert!(!MsgBufError::WouldBlock.is_release_misuse());
    }

    #[test]
    fn test_error_display() {
        let err = MsgBufError::use_after_release(42);
        let display = format!("{}", err);
        assert!(display.contains("Use after release"));
        assert!(display.contains("42"));

        let err = MsgBufError::from_errno(nix::errno::Errno::EBADF, "poll");
        assert!(format!("{}", err).starts_with("I/O error: poll"));
    }
}
