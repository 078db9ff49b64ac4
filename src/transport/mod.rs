//! Transport contract consumed by the transfer layer
//!
//! The wire protocol lives outside this crate. It is reached only through
//! [`Transport`]: copy-based raw send/receive plus a zero-copy send that takes
//! ownership of a [`ReleaseToken`] and completes it once the transport has
//! finished reading the buffer.

pub mod mock;

use std::ops::BitOr;

use crate::{error::Result, message::ReleaseToken};

pub use mock::{MockTransport, MockTransportStats};

/// Flags passed through to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransferFlags(u32);

impl TransferFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Do not block; report would-block instead
    pub const DONT_WAIT: Self = Self(1);
    /// More message parts follow
    pub const SEND_MORE: Self = Self(2);

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check whether every bit of `other` is set
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TransferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of a raw receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// Bytes written into the caller's buffer
    Received(usize),
    /// Nothing available and the call was non-blocking
    WouldBlock,
}

/// A messaging transport endpoint
pub trait Transport: Send + Sync {
    /// Send bytes the transport must copy before returning
    fn send_raw(&self, data: &[u8], flags: TransferFlags) -> Result<usize>;

    /// Receive into caller memory
    fn recv_raw(&self, buf: &mut [u8], flags: TransferFlags) -> Result<RecvOutcome>;

    /// Send without copying
    ///
    /// The transport owns `token` until it has finished with the bytes and
    /// must then call [`ReleaseToken::complete`], possibly from another thread.
    fn send_zero_copy(&self, token: ReleaseToken, flags: TransferFlags) -> Result<()>;
}
