//! Message handles with explicit ownership
//!
//! A [`MessageHandle`] wraps one buffer that is pool-owned, externally owned
//! with a release callback, or caller owned. Its release action fires exactly
//! once; misuse after release is reported as an error.

pub mod handle;
pub mod token;

pub use handle::{HandleId, MessageHandle, OwnerKind, ReleaseCallback};
pub use token::ReleaseToken;
