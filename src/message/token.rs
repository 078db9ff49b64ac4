//! Cross-thread release of handed-off handles

use std::fmt;

use crate::error::Result;

use super::handle::{HandleId, MessageHandle, OwnerKind};

/// A message handle handed to a transport for zero-copy I/O
///
/// The transport reads the bytes while the token is alive and calls
/// [`complete`](Self::complete) from its I/O thread once it has finished with
/// them. Completion runs the handle's release action on the completing thread.
/// Because `complete` consumes the token, a handoff completes at most once.
/// Dropping an uncompleted token also releases the handle.
pub struct ReleaseToken {
    handle: MessageHandle,
}

impl ReleaseToken {
    pub(crate) fn new(handle: MessageHandle) -> Self {
        Self { handle }
    }

    /// Identifier of the wrapped handle
    pub fn id(&self) -> HandleId {
        self.handle.id()
    }

    /// Length of the handed-off data
    pub fn len(&self) -> usize {
        self.handle.len()
    }

    /// Check if the handed-off data is empty
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Owner kind of the wrapped handle
    pub fn owner_kind(&self) -> OwnerKind {
        self.handle.owner_kind()
    }

    /// Bytes the transport should read
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.handle.as_slice()
    }

    /// Raw pointer for transports that take `(ptr, len)`
    pub fn as_ptr(&self) -> Result<*const u8> {
        self.handle.as_ptr()
    }

    /// Signal that the transport is finished with the buffer
    pub fn complete(mut self) -> Result<()> {
        self.handle.release()
    }
}

impl fmt::Debug for ReleaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseToken")
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::{BufferPool, BufferPoolConfig};
    use std::thread;

    #[test]
    fn test_completion_on_another_thread_returns_buffer() {
        let pool = BufferPool::shared(BufferPoolConfig::new("token-unit")).unwrap();
        let handle = MessageHandle::copy_from(&pool, b"payload").unwrap();
        let id = handle.id();

        let token = handle.into_release_token().unwrap();
        assert_eq!(token.id(), id);

        let worker = thread::spawn(move || {
            assert_eq!(token.as_slice().unwrap(), b"payload");
            token.complete()
        });
        worker.join().unwrap().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.rents(), 1);
        assert_eq!(stats.returns(), 1);
    }

    #[test]
    fn test_released_handle_cannot_be_handed_off() {
        let pool = BufferPool::shared(BufferPoolConfig::new("token-unit")).unwrap();
        let mut handle = MessageHandle::with_len(&pool, 8).unwrap();
        handle.release().unwrap();
        assert!(handle.into_release_token().is_err());
        assert_eq!(pool.stats().returns(), 1);
    }
}
