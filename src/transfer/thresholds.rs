//! Crossover thresholds between transfer strategies
//!
//! The defaults come from measurements on one machine. They are constants to
//! re-measure on the target (see the `transfer_bench` bench), not truths.

use serde::{Deserialize, Serialize};

use crate::error::{MsgBufError, Result};

use super::transient::TRANSIENT_LIMIT;

/// Largest length sent through a transient buffer by default
pub const DEFAULT_TRANSIENT_MAX: usize = 512;

/// Smallest send handed off zero-copy by default
pub const DEFAULT_ZERO_COPY_MIN: usize = 32 * 1024;

/// Environment override for [`TransferThresholds::transient_max`]
pub const TRANSIENT_MAX_ENV: &str = "MSGBUF_TRANSIENT_MAX";

/// Environment override for [`TransferThresholds::zero_copy_min`]
pub const ZERO_COPY_MIN_ENV: &str = "MSGBUF_ZERO_COPY_MIN";

/// Length boundaries used by strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferThresholds {
    /// Lengths up to and including this use a transient buffer
    pub transient_max: usize,
    /// Sends of at least this length use zero-copy handoff
    pub zero_copy_min: usize,
}

impl Default for TransferThresholds {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSIENT_MAX, DEFAULT_ZERO_COPY_MIN)
    }
}

impl TransferThresholds {
    /// Create thresholds
    pub const fn new(transient_max: usize, zero_copy_min: usize) -> Self {
        Self {
            transient_max,
            zero_copy_min,
        }
    }

    /// Set the transient boundary
    pub fn with_transient_max(mut self, len: usize) -> Self {
        self.transient_max = len;
        self
    }

    /// Set the zero-copy boundary
    pub fn with_zero_copy_min(mut self, len: usize) -> Self {
        self.zero_copy_min = len;
        self
    }

    /// Defaults overridden by `MSGBUF_TRANSIENT_MAX` / `MSGBUF_ZERO_COPY_MIN`
    pub fn from_env() -> Result<Self> {
        let mut thresholds = Self::default();
        if let Some(value) = read_env(TRANSIENT_MAX_ENV)? {
            thresholds.transient_max = value;
        }
        if let Some(value) = read_env(ZERO_COPY_MIN_ENV)? {
            thresholds.zero_copy_min = value;
        }
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Validate the boundaries
    pub fn validate(&self) -> Result<()> {
        if self.transient_max > TRANSIENT_LIMIT {
            return Err(MsgBufError::invalid_parameter(
                "transient_max",
                format!("Transient buffers hold at most {} bytes", TRANSIENT_LIMIT),
            ));
        }

        if self.zero_copy_min <= self.transient_max {
            return Err(MsgBufError::invalid_parameter(
                "zero_copy_min",
                "Zero-copy boundary must be above the transient boundary",
            ));
        }

        Ok(())
    }
}

fn read_env(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| MsgBufError::invalid_parameter(name, format!("'{}': {}", raw, e))),
        Err(_) => Ok(None),
    }
}
