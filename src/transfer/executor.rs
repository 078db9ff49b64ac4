//! Runs the selected transfer path against a transport

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::{debug, trace};
use serde::Serialize;

use crate::{
    buffers::BufferPool,
    error::{MsgBufError, Result},
    message::MessageHandle,
    transport::{RecvOutcome, TransferFlags, Transport},
};

use super::{
    strategy::{select, OperationKind, TransferStrategy},
    thresholds::TransferThresholds,
    transient::with_transient,
};

/// Count of transfers per strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    /// Transfers through a transient buffer
    pub transient: u64,
    /// Transfers through a pooled buffer
    pub pool_copy: u64,
    /// Zero-copy handoffs
    pub zero_copy: u64,
    /// Receives that found nothing to read
    pub would_block: u64,
}

#[derive(Debug, Default)]
struct AtomicTransferStats {
    transient: AtomicU64,
    pool_copy: AtomicU64,
    zero_copy: AtomicU64,
    would_block: AtomicU64,
}

impl AtomicTransferStats {
    fn record(&self, strategy: TransferStrategy) {
        let counter = match strategy {
            TransferStrategy::Transient => &self.transient,
            TransferStrategy::PoolCopy => &self.pool_copy,
            TransferStrategy::ZeroCopy => &self.zero_copy,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransferStats {
        TransferStats {
            transient: self.transient.load(Ordering::Relaxed),
            pool_copy: self.pool_copy.load(Ordering::Relaxed),
            zero_copy: self.zero_copy.load(Ordering::Relaxed),
            would_block: self.would_block.load(Ordering::Relaxed),
        }
    }
}

/// Sends and receives payloads using the strategy their length calls for
#[derive(Debug)]
pub struct Transfer {
    pool: Arc<BufferPool>,
    thresholds: TransferThresholds,
    stats: AtomicTransferStats,
}

impl Transfer {
    /// Create an executor over a shared pool
    ///
    /// Sends too large for the pool must take the zero-copy path, so
    /// `zero_copy_min` may not exceed one past the pool's largest class.
    pub fn new(pool: Arc<BufferPool>, thresholds: TransferThresholds) -> Result<Self> {
        thresholds.validate()?;
        let limit = pool.max_len().saturating_add(1);
        if thresholds.zero_copy_min > limit {
            return Err(MsgBufError::invalid_parameter(
                "zero_copy_min",
                format!(
                    "{} leaves sends above the largest pooled buffer ({} bytes) without a path",
                    thresholds.zero_copy_min,
                    pool.max_len()
                ),
            ));
        }
        Ok(Self {
            pool,
            thresholds,
            stats: AtomicTransferStats::default(),
        })
    }

    /// Strategy chosen for a payload
    pub fn strategy(&self, len: usize, kind: OperationKind) -> TransferStrategy {
        select(&self.thresholds, len, kind)
    }

    /// Thresholds in effect
    pub fn thresholds(&self) -> &TransferThresholds {
        &self.thresholds
    }

    /// Pool backing the copy path
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Per-strategy counters
    pub fn stats(&self) -> TransferStats {
        self.stats.snapshot()
    }

    /// Send borrowed bytes
    ///
    /// The zero-copy path copies once into a fresh region that the transport
    /// frees when it is done; use [`send_owned`](Self::send_owned) to skip
    /// that copy.
    pub fn send<T>(&self, transport: &T, data: &[u8], flags: TransferFlags) -> Result<TransferStrategy>
    where
        T: Transport + ?Sized,
    {
        let strategy = self.strategy(data.len(), OperationKind::Send);
        trace!("send {} bytes via {}", data.len(), strategy);

        match strategy {
            TransferStrategy::Transient => {
                with_transient(data.len(), |buf| {
                    buf.copy_from_slice(data);
                    transport.send_raw(buf, flags)
                })??;
            }
            TransferStrategy::PoolCopy => {
                let mut handle = MessageHandle::copy_from(&self.pool, data)?;
                let sent = transport.send_raw(handle.as_slice()?, flags);
                handle.release()?;
                sent?;
            }
            TransferStrategy::ZeroCopy => {
                let handle = MessageHandle::zero_copy(data.to_vec())?;
                transport.send_zero_copy(handle.into_release_token()?, flags)?;
            }
        }

        self.stats.record(strategy);
        Ok(strategy)
    }

    /// Send an owned payload, handing it off without a copy when large
    pub fn send_owned<T>(&self, transport: &T, data: Vec<u8>, flags: TransferFlags) -> Result<TransferStrategy>
    where
        T: Transport + ?Sized,
    {
        match self.strategy(data.len(), OperationKind::Send) {
            TransferStrategy::ZeroCopy => {
                let handle = MessageHandle::zero_copy(data)?;
                transport.send_zero_copy(handle.into_release_token()?, flags)?;
                self.stats.record(TransferStrategy::ZeroCopy);
                Ok(TransferStrategy::ZeroCopy)
            }
            _ => self.send(transport, &data, flags),
        }
    }

    /// Receive up to `max_len` bytes and hand them to `f`
    ///
    /// The received bytes are only valid inside `f`. Returns `Ok(None)` when
    /// the transport would block.
    pub fn recv_with<T, R, F>(&self, transport: &T, max_len: usize, flags: TransferFlags, f: F) -> Result<Option<R>>
    where
        T: Transport + ?Sized,
        F: FnOnce(&[u8]) -> R,
    {
        let strategy = self.strategy(max_len, OperationKind::Receive);

        let outcome = match strategy {
            TransferStrategy::Transient => with_transient(max_len, |buf| {
                transport
                    .recv_raw(buf, flags)
                    .map(|outcome| match outcome {
                        RecvOutcome::Received(n) => Some(f(&buf[..n.min(buf.len())])),
                        RecvOutcome::WouldBlock => None,
                    })
            })??,
            _ => match self.recv_message(transport, max_len, flags)? {
                Some(mut handle) => {
                    let result = handle.as_slice().map(f);
                    handle.release()?;
                    Some(result?)
                }
                None => None,
            },
        };

        match outcome {
            Some(result) => {
                self.stats.record(strategy);
                Ok(Some(result))
            }
            None => {
                self.stats.would_block.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Receive into a message the caller keeps
    ///
    /// The message is pool-owned unless `max_len` exceeds the pool's largest
    /// class, in which case it is a dedicated region freed on release.
    pub fn recv_message<T>(&self, transport: &T, max_len: usize, flags: TransferFlags) -> Result<Option<MessageHandle>>
    where
        T: Transport + ?Sized,
    {
        let mut handle = if max_len > self.pool.max_len() {
            debug!(
                "receive of {} bytes exceeds pool '{}', using a dedicated region",
                max_len,
                self.pool.config().name
            );
            MessageHandle::zero_copy(vec![0u8; max_len])?
        } else {
            MessageHandle::with_len(&self.pool, max_len)?
        };
        match transport.recv_raw(handle.as_mut_slice()?, flags)? {
            RecvOutcome::Received(n) => {
                handle.truncate(n.min(max_len))?;
                Ok(Some(handle))
            }
            RecvOutcome::WouldBlock => {
                handle.release()?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffers::BufferPoolConfig, transport::MockTransport};
    use std::time::Duration;

    fn transfer() -> Transfer {
        let pool = BufferPool::shared(BufferPoolConfig::new("transfer-unit")).unwrap();
        Transfer::new(pool, TransferThresholds::default()).unwrap()
    }

    #[test]
    fn test_send_paths_by_length() {
        let transfer = transfer();
        let transport = MockTransport::new().unwrap();

        let small = vec![1u8; 64];
        let mid = vec![1u8; 1024];
        let large = vec![1u8; 65536];
        assert_eq!(transfer.send(&transport, &small, TransferFlags::NONE).unwrap(), TransferStrategy::Transient);
        assert_eq!(transfer.send(&transport, &mid, TransferFlags::NONE).unwrap(), TransferStrategy::PoolCopy);
        assert_eq!(transfer.send(&transport, &large, TransferFlags::NONE).unwrap(), TransferStrategy::ZeroCopy);

        assert!(transport.wait_idle(Duration::from_secs(5)));
        let stats = transport.stats();
        assert_eq!(stats.raw_sends, 2);
        assert_eq!(stats.zero_copy_completed, 1);
        assert_eq!(stats.checksum_total, 64 + 1024 + 65536);

        let pool_stats = transfer.pool().stats();
        assert_eq!(pool_stats.rents(), 1);
        assert_eq!(pool_stats.outstanding(), 0);
    }

    #[test]
    fn test_zero_copy_min_must_cover_oversized_sends() {
        let pool = BufferPool::shared(BufferPoolConfig::new("transfer-limit")).unwrap();
        let max_len = pool.max_len();

        let too_high = TransferThresholds::new(512, max_len * 2);
        assert!(matches!(
            Transfer::new(Arc::clone(&pool), too_high),
            Err(MsgBufError::InvalidParameter { .. })
        ));

        let transfer = Transfer::new(pool, TransferThresholds::new(512, max_len + 1)).unwrap();
        let transport = MockTransport::new().unwrap();
        let payload = vec![1u8; max_len + 1];
        assert_eq!(
            transfer.send(&transport, &payload, TransferFlags::NONE).unwrap(),
            TransferStrategy::ZeroCopy
        );
        assert!(transport.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_oversized_receive_uses_dedicated_region() {
        let transfer = transfer();
        let transport = MockTransport::new().unwrap();
        let len = transfer.pool().max_len() + 1024;

        let last = transfer
            .recv_with(&transport, len, TransferFlags::NONE, |bytes| (bytes.len(), bytes[len - 1]))
            .unwrap();
        assert_eq!(last, Some((len, ((len - 1) & 0xFF) as u8)));

        let message = transfer
            .recv_message(&transport, len, TransferFlags::NONE)
            .unwrap()
            .unwrap();
        assert_eq!(message.owner_kind(), crate::message::OwnerKind::External);
        assert_eq!(message.len(), len);
        assert_eq!(transfer.pool().stats().rents(), 0);
    }

    #[test]
    fn test_recv_with_pattern() {
        let transfer = transfer();
        let transport = MockTransport::new().unwrap();

        let small = transfer
            .recv_with(&transport, 300, TransferFlags::NONE, |bytes| bytes[299])
            .unwrap();
        assert_eq!(small, Some((299 & 0xFF) as u8));

        let large = transfer
            .recv_with(&transport, 10_000, TransferFlags::NONE, |bytes| bytes.len())
            .unwrap();
        assert_eq!(large, Some(10_000));

        transport.set_recv_ready(false);
        let none = transfer
            .recv_with(&transport, 10_000, TransferFlags::DONT_WAIT, |bytes| bytes.len())
            .unwrap();
        assert!(none.is_none());

        let stats = transfer.stats();
        assert_eq!(stats.transient, 1);
        assert_eq!(stats.pool_copy, 1);
        assert_eq!(stats.would_block, 1);
        assert_eq!(transfer.pool().stats().outstanding(), 0);
    }
}
