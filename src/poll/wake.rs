//! Wake endpoint for unblocking a pending poll
//!
//! A poll has no out-of-band interrupt. To cut an infinite wait short, register
//! a [`WakeEndpoint`] with the multiplexer and call [`WakeEndpoint::wake`] from
//! another thread. Uses eventfd on Linux and a socket pair elsewhere.

use std::os::fd::{AsFd, BorrowedFd};
#[cfg(target_os = "linux")]
use std::os::fd::{AsRawFd, OwnedFd};
#[cfg(not(target_os = "linux"))]
use std::{
    io::{Read, Write},
    os::unix::net::UnixStream,
};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(target_os = "linux")]
use nix::{
    errno::Errno,
    sys::eventfd::{eventfd, EfdFlags},
    unistd::{read, write},
};

use crate::error::{MsgBufError, Result};

/// Readable descriptor that another thread can signal
#[derive(Debug)]
pub struct WakeEndpoint {
    #[cfg(target_os = "linux")]
    event_fd: OwnedFd,
    #[cfg(not(target_os = "linux"))]
    reader: UnixStream,
    #[cfg(not(target_os = "linux"))]
    writer: UnixStream,
    wake_count: AtomicU64,
}

impl WakeEndpoint {
    /// Create a non-blocking wake endpoint
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self> {
        let event_fd = eventfd(0, EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)
            .map_err(|e| MsgBufError::from_errno(e, "create wake eventfd"))?;
        Ok(Self {
            event_fd,
            wake_count: AtomicU64::new(0),
        })
    }

    /// Create a non-blocking wake endpoint
    #[cfg(not(target_os = "linux"))]
    pub fn new() -> Result<Self> {
        let (reader, writer) =
            UnixStream::pair().map_err(|e| MsgBufError::from_io(e, "create wake socket pair"))?;
        reader
            .set_nonblocking(true)
            .and_then(|_| writer.set_nonblocking(true))
            .map_err(|e| MsgBufError::from_io(e, "set wake socket non-blocking"))?;
        Ok(Self {
            reader,
            writer,
            wake_count: AtomicU64::new(0),
        })
    }

    /// Make the endpoint readable
    ///
    /// Safe to call from any thread. Wakes coalesce until [`drain`](Self::drain).
    pub fn wake(&self) -> Result<()> {
        self.wake_count.fetch_add(1, Ordering::Relaxed);

        #[cfg(target_os = "linux")]
        {
            let value: u64 = 1;
            match write(self.event_fd.as_raw_fd(), &value.to_ne_bytes()) {
                // counter saturated, already readable
                Ok(_) | Err(Errno::EAGAIN) => Ok(()),
                Err(e) => Err(MsgBufError::from_errno(e, "signal wake eventfd")),
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            match (&self.writer).write(&[1u8]) {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
                Err(e) => Err(MsgBufError::from_io(e, "signal wake socket")),
            }
        }
    }

    /// Consume pending wakes so the endpoint stops reporting readable
    ///
    /// Returns `true` if at least one wake was pending.
    pub fn drain(&self) -> Result<bool> {
        #[cfg(target_os = "linux")]
        {
            let mut buf = [0u8; 8];
            match read(self.event_fd.as_raw_fd(), &mut buf) {
                Ok(_) => Ok(true),
                Err(Errno::EAGAIN) => Ok(false),
                Err(e) => Err(MsgBufError::from_errno(e, "drain wake eventfd")),
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            let mut buf = [0u8; 64];
            let mut drained = false;
            loop {
                match (&self.reader).read(&mut buf) {
                    Ok(0) => return Ok(drained),
                    Ok(_) => drained = true,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(drained),
                    Err(e) => return Err(MsgBufError::from_io(e, "drain wake socket")),
                }
            }
        }
    }

    /// Number of `wake` calls so far
    pub fn wake_count(&self) -> u64 {
        self.wake_count.load(Ordering::Relaxed)
    }
}

impl AsFd for WakeEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        #[cfg(target_os = "linux")]
        {
            self.event_fd.as_fd()
        }
        #[cfg(not(target_os = "linux"))]
        {
            self.reader.as_fd()
        }
    }
}
