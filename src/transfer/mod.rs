//! Transfer strategy selection and execution
//!
//! [`select`] is a pure function of payload length and direction. The
//! boundaries it uses live in [`TransferThresholds`] so they can be
//! re-measured and moved without touching call sites. [`Transfer`] runs the
//! chosen path against a [`Transport`](crate::transport::Transport).

pub mod executor;
pub mod strategy;
pub mod thresholds;
pub mod transient;

pub use executor::{Transfer, TransferStats};
pub use strategy::{select, OperationKind, TransferStrategy};
pub use thresholds::{TransferThresholds, DEFAULT_TRANSIENT_MAX, DEFAULT_ZERO_COPY_MIN};
pub use transient::{transient_class, with_transient, TRANSIENT_CLASSES, TRANSIENT_LIMIT};
