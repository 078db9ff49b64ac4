//! Single-owner message buffer handle

use std::{
    fmt,
    ptr::NonNull,
    slice,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use log::{error, warn};
use serde::Serialize;

use crate::{
    buffers::{BufferPool, PooledBuffer},
    error::{MsgBufError, Result},
};

use super::token::ReleaseToken;

/// Opaque identifier of a handle, unique within the process
pub type HandleId = u64;

/// Callback invoked exactly once when an externally owned buffer is released
pub type ReleaseCallback = Box<dyn FnOnce(NonNull<u8>, usize) + Send + 'static>;

/// Who is responsible for the memory behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OwnerKind {
    /// Caller keeps the memory; release does nothing
    Caller,
    /// Memory is a pooled buffer; release returns it to the pool
    Pool,
    /// Memory is owned elsewhere; release runs the callback
    External,
}

enum Owner {
    Caller,
    Pool {
        pool: Arc<BufferPool>,
        buffer: Option<PooledBuffer>,
    },
    External {
        callback: Option<ReleaseCallback>,
    },
}

impl Owner {
    fn kind(&self) -> OwnerKind {
        match self {
            Owner::Caller => OwnerKind::Caller,
            Owner::Pool { .. } => OwnerKind::Pool,
            Owner::External { .. } => OwnerKind::External,
        }
    }
}

/// Wrapper around one message buffer with exactly-once release
///
/// The `released` flag is a one-shot: the first [`release`](Self::release)
/// flips it and performs the owner's release action; every later release or
/// data access sees the flag and returns an error without touching memory,
/// the pool, or its counters. A handle dropped without being released
/// releases itself.
pub struct MessageHandle {
    id: HandleId,
    data: NonNull<u8>,
    len: usize,
    owner: Owner,
    released: AtomicBool,
}

impl MessageHandle {
    /// Pool-owned handle of `len` bytes
    pub fn with_len(pool: &Arc<BufferPool>, len: usize) -> Result<Self> {
        let buffer = pool.rent(len)?;
        Ok(Self::from_pooled(Arc::clone(pool), buffer))
    }

    /// Pool-owned handle holding a copy of `bytes`
    ///
    /// The copy is a single linear bulk copy.
    pub fn copy_from(pool: &Arc<BufferPool>, bytes: &[u8]) -> Result<Self> {
        let mut buffer = pool.rent(bytes.len())?;
        buffer.as_mut_slice().copy_from_slice(bytes);
        Ok(Self::from_pooled(Arc::clone(pool), buffer))
    }

    /// Wrap a buffer just rented from `pool`
    fn from_pooled(pool: Arc<BufferPool>, buffer: PooledBuffer) -> Self {
        debug_assert_eq!(buffer.pool_id(), pool.id());
        let data = buffer.non_null();
        let len = buffer.len();
        Self::new(
            data,
            len,
            Owner::Pool {
                pool,
                buffer: Some(buffer),
            },
        )
    }

    /// Zero-copy handle over externally managed memory
    ///
    /// `release` is invoked exactly once with the original pointer and length
    /// when the handle is released.
    ///
    /// # Safety
    /// - `data` must be valid for reads and writes of `len` bytes until
    ///   `release` runs
    /// - nothing else may access the memory while the handle is alive
    pub unsafe fn from_raw_parts<F>(data: NonNull<u8>, len: usize, release: F) -> Self
    where
        F: FnOnce(NonNull<u8>, usize) + Send + 'static,
    {
        Self::new(
            data,
            len,
            Owner::External {
                callback: Some(Box::new(release)),
            },
        )
    }

    /// Zero-copy handle over a freshly allocated region
    ///
    /// The region is freed by the release callback, on whichever thread
    /// releases the handle.
    pub fn zero_copy(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(MsgBufError::invalid_size(0, "zero-copy region cannot be empty"));
        }

        let boxed: Box<[u8]> = bytes.into_boxed_slice();
        let len = boxed.len();
        let raw = Box::into_raw(boxed) as *mut u8;
        let data = NonNull::new(raw).ok_or_else(|| MsgBufError::allocation_failure(len, 1))?;

        // SAFETY: the box is leaked above and rebuilt exactly once by the callback.
        let handle = unsafe {
            Self::from_raw_parts(data, len, |ptr, len| {
                let slice = std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len);
                drop(Box::from_raw(slice));
            })
        };
        Ok(handle)
    }

    /// Handle over caller-owned memory; release is a no-op
    ///
    /// # Safety
    /// - `data` must be valid for reads and writes of `len` bytes for the
    ///   whole life of the handle
    pub unsafe fn from_caller(data: NonNull<u8>, len: usize) -> Self {
        Self::new(data, len, Owner::Caller)
    }

    fn new(data: NonNull<u8>, len: usize, owner: Owner) -> Self {
        Self {
            id: next_handle_id(),
            data,
            len,
            owner,
            released: AtomicBool::new(false),
        }
    }

    /// Opaque identifier
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Owner kind
    pub fn owner_kind(&self) -> OwnerKind {
        self.owner.kind()
    }

    /// Used length in bytes (recorded at construction)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the used length is zero
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of the pooled buffer, or the length for other owners
    pub fn capacity(&self) -> usize {
        match &self.owner {
            Owner::Pool {
                buffer: Some(buffer),
                ..
            } => buffer.capacity(),
            _ => self.len,
        }
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Raw pointer to the data
    pub fn as_ptr(&self) -> Result<*const u8> {
        self.ensure_live()?;
        Ok(self.data.as_ptr())
    }

    /// Mutable raw pointer to the data
    pub fn as_mut_ptr(&mut self) -> Result<*mut u8> {
        self.ensure_live()?;
        Ok(self.data.as_ptr())
    }

    /// Used bytes
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.ensure_live()?;
        Ok(unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) })
    }

    /// Used bytes, mutable
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        self.ensure_live()?;
        Ok(unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.len) })
    }

    /// Shrink the used length, e.g. after a short receive
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        self.ensure_live()?;
        if len > self.len {
            return Err(MsgBufError::invalid_size(
                len,
                format!("cannot grow handle {} beyond {} bytes", self.id, self.len),
            ));
        }
        if let Owner::Pool {
            buffer: Some(buffer),
            ..
        } = &mut self.owner
        {
            buffer.set_len(len)?;
        }
        self.len = len;
        Ok(())
    }

    /// Release the handle's memory
    ///
    /// Pool-owned buffers return to their pool, external buffers run their
    /// callback, caller-owned memory is left alone. A second call returns
    /// [`MsgBufError::DoubleRelease`] and changes nothing.
    pub fn release(&mut self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            error!("double release of message handle {}", self.id);
            return Err(MsgBufError::double_release(self.id));
        }

        match &mut self.owner {
            Owner::Caller => Ok(()),
            Owner::Pool { pool, buffer } => match buffer.take() {
                Some(buffer) => pool.return_buffer(buffer),
                None => Err(MsgBufError::double_release(self.id)),
            },
            Owner::External { callback } => match callback.take() {
                Some(callback) => {
                    callback(self.data, self.len);
                    Ok(())
                }
                None => Err(MsgBufError::double_release(self.id)),
            },
        }
    }

    /// Move the handle into a token a transport completes when it is done
    pub fn into_release_token(self) -> Result<ReleaseToken> {
        self.ensure_live()?;
        Ok(ReleaseToken::new(self))
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            error!("access to released message handle {}", self.id);
            return Err(MsgBufError::use_after_release(self.id));
        }
        Ok(())
    }
}

// SAFETY: the handle exclusively owns (or exclusively borrows, per the
// constructors' contracts) its memory and the callback is `Send`.
unsafe impl Send for MessageHandle {}

impl Drop for MessageHandle {
    fn drop(&mut self) {
        if !self.is_released() {
            if let Err(e) = self.release() {
                warn!("failed to release message handle {} on drop: {}", self.id, e);
            }
        }
    }
}

impl fmt::Debug for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandle")
            .field("id", &self.id)
            .field("ptr", &self.data)
            .field("len", &self.len)
            .field("owner", &self.owner_kind())
            .field("released", &self.is_released())
            .finish()
    }
}

fn next_handle_id() -> HandleId {
    static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);
    HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed)
}
