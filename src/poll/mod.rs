//! Readiness multiplexing across many endpoints
//!
//! ```text
//!   other thread
//!   wake.wake() ───┐
//!                  ▼
//!   ┌────────────────────────────┐
//!   │ ReadinessMultiplexer       │  poll(-1) ──► 1
//!   │  [0] socket   READABLE     │  is_ready(#1, In) ──► true
//!   │  [1] wake     READABLE     │
//!   └────────────────────────────┘
//! ```

pub mod interest;
pub mod multiplexer;
pub mod wake;

pub use interest::{EventKind, Interest, Readiness};
pub use multiplexer::{EndpointRef, ReadinessMultiplexer};
pub use wake::WakeEndpoint;
