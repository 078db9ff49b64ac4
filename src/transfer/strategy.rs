//! Strategy selection by payload length

use std::fmt;

use serde::Serialize;

use super::thresholds::TransferThresholds;

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    /// Bytes leave through the transport
    Send,
    /// Bytes arrive from the transport
    Receive,
}

/// How a payload crosses into the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransferStrategy {
    /// Stack buffer keyed by length class, alive for one call
    Transient,
    /// Copy through a pooled buffer
    PoolCopy,
    /// Hand a freshly allocated region to the transport with a release callback
    ZeroCopy,
}

impl TransferStrategy {
    /// Short name used in logs and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            TransferStrategy::Transient => "transient",
            TransferStrategy::PoolCopy => "pool-copy",
            TransferStrategy::ZeroCopy => "zero-copy",
        }
    }
}

impl fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the transfer strategy for a payload
///
/// Small payloads stay off the pool entirely. Large sends are handed off
/// without a copy, since copying dominates the fixed handoff cost there. The
/// middle is within noise either way and takes the simpler pool copy.
/// Receives never hand off: the transport writes into caller memory.
pub fn select(thresholds: &TransferThresholds, len: usize, kind: OperationKind) -> TransferStrategy {
    if len <= thresholds.transient_max {
        return TransferStrategy::Transient;
    }
    match kind {
        OperationKind::Send if len >= thresholds.zero_copy_min => TransferStrategy::ZeroCopy,
        _ => TransferStrategy::PoolCopy,
    }
}
