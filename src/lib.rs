//! # msgbuf - Native Message Buffer Management
//!
//! msgbuf is the native-memory layer beneath a messaging transport binding.
//! It hands out reusable buffers, tracks who owns each message, picks a copy
//! or zero-copy path per payload, and waits on many endpoints at once.
//!
//! ## Features
//!
//! - **Size-classed pool**: power-of-two classes, each with its own idle stack
//! - **Message handles**: caller, pool, or externally owned, released at most once
//! - **Zero-copy handoff**: transports complete a [`ReleaseToken`] on any thread
//! - **Transfer strategies**: transient, pool-copy, or zero-copy by payload length
//! - **Readiness multiplexing**: level-triggered `poll(2)` with a wake endpoint
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Transfer                        │
//! │  select(len, kind) ─► Transient │ PoolCopy │    │
//! │                        ZeroCopy                 │
//! ├─────────────────────────────────────────────────┤
//! │  MessageHandle           │  BufferPool          │
//! │  - Owner tag             │  - Size classes      │
//! │  - One-shot release      │  - Idle stacks       │
//! │  - ReleaseToken          │  - Hit/miss counters │
//! └─────────────────────────────────────────────────┘
//!           │
//!           ▼
//! ┌─────────────────┐    ┌─────────────────────────┐
//! │   Transport     │    │  ReadinessMultiplexer   │
//! │ (send/recv raw) │    │  (register/poll/ready)  │
//! └─────────────────┘    └─────────────────────────┘
//! ```

// Core modules
pub mod error;
pub mod buffers;
pub mod message;
pub mod transfer;
pub mod transport;

// Readiness waiting, independent of the buffer layer
pub mod poll;

// Main API re-exports
pub use error::{MsgBufError, Result};
pub use buffers::{BufferPool, BufferPoolConfig, BufferPoolConfigBuilder, BufferPoolStats, PooledBuffer, SizeClass, SizeClassStats};
pub use message::{HandleId, MessageHandle, OwnerKind, ReleaseToken};
pub use transfer::{select, OperationKind, Transfer, TransferStats, TransferStrategy, TransferThresholds};
pub use transport::{MockTransport, RecvOutcome, TransferFlags, Transport};
pub use poll::{EndpointRef, EventKind, Interest, ReadinessMultiplexer, Readiness, WakeEndpoint};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Default configuration constants
pub mod config {
    pub use crate::buffers::config::{DEFAULT_ALIGNMENT, DEFAULT_MAX_CLASS_SIZE, DEFAULT_MIN_CLASS_SIZE};
    pub use crate::transfer::{DEFAULT_TRANSIENT_MAX, DEFAULT_ZERO_COPY_MIN, TRANSIENT_LIMIT};

    /// Default registration table size for a multiplexer
    pub const DEFAULT_MULTIPLEXER_CAPACITY: usize = 64;
}
