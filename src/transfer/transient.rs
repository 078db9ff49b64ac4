//! Transient stack buffers for small payloads

use crate::error::{MsgBufError, Result};

/// Length classes of transient buffers
pub const TRANSIENT_CLASSES: [usize; 4] = [64, 256, 1024, 4096];

/// Largest payload a transient buffer holds
pub const TRANSIENT_LIMIT: usize = 4096;

/// Smallest transient class holding `len` bytes
pub fn transient_class(len: usize) -> Option<usize> {
    TRANSIENT_CLASSES.iter().copied().find(|&class| len <= class)
}

/// Run `f` over a zeroed stack buffer of exactly `len` bytes
///
/// The buffer lives on this call's stack frame, sized by length class, and
/// is gone when `f` returns. No pool or heap is touched.
pub fn with_transient<R>(len: usize, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
    let class = transient_class(len).ok_or_else(|| {
        MsgBufError::invalid_size(
            len,
            format!("transient buffers hold at most {} bytes", TRANSIENT_LIMIT),
        )
    })?;

    let result = match class {
        64 => {
            let mut buf = [0u8; 64];
            f(&mut buf[..len])
        }
        256 => {
            let mut buf = [0u8; 256];
            f(&mut buf[..len])
        }
        1024 => {
            let mut buf = [0u8; 1024];
            f(&mut buf[..len])
        }
        _ => {
            let mut buf = [0u8; TRANSIENT_LIMIT];
            f(&mut buf[..len])
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_lookup() {
        assert_eq!(transient_class(0), Some(64));
        assert_eq!(transient_class(64), Some(64));
        assert_eq!(transient_class(65), Some(256));
        assert_eq!(transient_class(4096), Some(4096));
        assert_eq!(transient_class(4097), None);
    }

    #[test]
    fn test_buffer_has_exact_length() {
        let len = with_transient(100, |buf| {
            buf.fill(1);
            buf.len()
        })
        .unwrap();
        assert_eq!(len, 100);
        assert!(with_transient(TRANSIENT_LIMIT + 1, |_| ()).is_err());
    }
}
