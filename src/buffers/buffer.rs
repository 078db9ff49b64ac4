//! Pooled native buffer

use std::{
    alloc::{self, Layout},
    fmt,
    ptr::NonNull,
    slice,
};

use crate::error::{MsgBufError, Result};

use super::size_class::SizeClass;

/// A native memory region of exactly one size class's capacity
///
/// The used length is tracked separately from the capacity and every slice
/// accessor exposes only the used length.
pub struct PooledBuffer {
    /// Pointer to the buffer data
    data: NonNull<u8>,
    /// Used length in bytes
    len: usize,
    /// Class the buffer was allocated for
    class: SizeClass,
    /// Alignment of the allocation
    align: usize,
    /// Pool that owns this buffer
    pool_id: u64,
}

impl PooledBuffer {
    /// Allocate fresh zeroed memory for a size class
    pub(crate) fn allocate(pool_id: u64, class: SizeClass, align: usize) -> Result<Self> {
        let layout = Self::layout(class.capacity(), align)?;
        // SAFETY: class capacities are never zero.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let data = NonNull::new(raw)
            .ok_or_else(|| MsgBufError::allocation_failure(class.capacity(), align))?;

        Ok(Self {
            data,
            len: 0,
            class,
            align,
            pool_id,
        })
    }

    fn layout(size: usize, align: usize) -> Result<Layout> {
        Layout::from_size_align(size, align).map_err(|e| {
            MsgBufError::invalid_parameter("layout", format!("{} bytes / {}: {}", size, align, e))
        })
    }

    /// Get a raw pointer to the buffer data
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Get a mutable raw pointer to the buffer data
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_ptr()
    }

    pub(crate) fn non_null(&self) -> NonNull<u8> {
        self.data
    }

    /// Get the used bytes as a slice
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Get the used bytes as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Used length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the used length is zero
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of the underlying region
    pub fn capacity(&self) -> usize {
        self.class.capacity()
    }

    /// Size class this buffer belongs to
    pub fn size_class(&self) -> SizeClass {
        self.class
    }

    /// Identifier of the owning pool
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// Alignment of the allocation
    pub fn alignment(&self) -> usize {
        self.align
    }

    /// Change the used length without touching contents
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(MsgBufError::invalid_size(
                len,
                format!("exceeds buffer capacity {}", self.capacity()),
            ));
        }
        self.len = len;
        Ok(())
    }

    /// Write data at an offset, growing the used length if needed
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.capacity())
            .ok_or_else(|| {
                MsgBufError::invalid_size(
                    offset.saturating_add(data.len()),
                    format!("write exceeds buffer capacity {}", self.capacity()),
                )
            })?;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.data.as_ptr().add(offset), data.len());
        }

        if end > self.len {
            self.len = end;
        }

        Ok(())
    }

    /// Zero the whole region, including bytes past the used length
    pub fn zero(&mut self) {
        unsafe {
            std::ptr::write_bytes(self.data.as_ptr(), 0, self.capacity());
        }
    }
}

// SAFETY: the region is exclusively owned by this value.
unsafe impl Send for PooledBuffer {}
unsafe impl Sync for PooledBuffer {}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // Layout was validated at allocation time
        if let Ok(layout) = Self::layout(self.capacity(), self.align) {
            unsafe { alloc::dealloc(self.data.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("ptr", &self.data)
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("pool_id", &self.pool_id)
            .finish()
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for PooledBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::{config::BufferPoolConfig, size_class::SizeClassLadder};

    fn class_for(len: usize) -> SizeClass {
        SizeClassLadder::from_config(&BufferPoolConfig::default())
            .unwrap()
            .class_for(len)
            .unwrap()
    }

    #[test]
    fn test_allocation_is_aligned() {
        let buffer = PooledBuffer::allocate(1, class_for(100), 64).unwrap();
        assert_eq!(buffer.as_ptr() as usize % 64, 0);
        assert_eq!(buffer.capacity(), 128);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_view_is_limited_to_used_length() {
        let mut buffer = PooledBuffer::allocate(1, class_for(64), 16).unwrap();
        buffer.write(0, b"hello").unwrap();
        assert_eq!(buffer.as_slice(), b"hello");
        assert_eq!(buffer.len(), 5);

        buffer.set_len(2).unwrap();
        assert_eq!(buffer.as_slice(), b"he");
        assert!(buffer.set_len(65).is_err());
    }

    #[test]
    fn test_write_past_capacity_fails() {
        let mut buffer = PooledBuffer::allocate(1, class_for(16), 16).unwrap();
        assert!(buffer.write(10, &[0u8; 7]).is_err());
        assert!(buffer.write(usize::MAX, &[1]).is_err());
        assert!(buffer.write(8, &[0xAB; 8]).is_ok());
        assert_eq!(buffer.len(), 16);
    }
}
