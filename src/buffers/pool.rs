//! Size-classed buffer pool
//!
//! Each size class owns an independent idle stack and its own counters, so
//! unrelated classes never contend with each other. A stack's critical
//! section is a single `push` or `pop` behind a per-class spin lock.
//!
//! The stacks are LIFO on purpose. The most recently returned buffer is served
//! first, which keeps contention cheaper than a fair queue would. The cost is
//! cross-thread cache locality: thread A may immediately reuse a buffer thread
//! B just returned and inherit B's cold cache lines. This trade-off was
//! measured and accepted; do not replace the stacks with FIFO queues.

use std::sync::Arc;

use log::{debug, info};
use spin::Mutex;

use crate::error::{MsgBufError, Result};

use super::{
    buffer::PooledBuffer,
    config::BufferPoolConfig,
    size_class::{SizeClass, SizeClassLadder},
    stats::{next_pool_id, AtomicSizeClassStats, BufferPoolStats},
};

/// Idle stack and counters for one size class
#[derive(Debug)]
struct ClassSlot {
    class: SizeClass,
    idle: Mutex<Vec<PooledBuffer>>,
    stats: AtomicSizeClassStats,
}

/// A pool of reusable native buffers on a power-of-two size ladder
///
/// Memory only grows during normal traffic. Buffers are freed by
/// [`BufferPool::clear`] or when the pool itself is dropped.
#[derive(Debug)]
pub struct BufferPool {
    /// Pool identifier stamped into every buffer it creates
    id: u64,
    /// Configuration
    config: BufferPoolConfig,
    /// Length to class mapping
    ladder: SizeClassLadder,
    /// One slot per class, indexed by class index
    slots: Box<[ClassSlot]>,
}

impl BufferPool {
    /// Create a new buffer pool
    pub fn new(config: BufferPoolConfig) -> Result<Self> {
        let ladder = SizeClassLadder::from_config(&config)?;

        let slots = ladder
            .iter()
            .map(|class| ClassSlot {
                class,
                idle: Mutex::new(Vec::with_capacity(config.initial_stack_capacity)),
                stats: AtomicSizeClassStats::new(),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let pool = Self {
            id: next_pool_id(),
            config,
            ladder,
            slots,
        };

        for spec in pool.config.prewarm.clone() {
            pool.prewarm(spec.size, spec.count)?;
        }

        debug!(
            "buffer pool '{}' ready: {} classes ({}..{} bytes)",
            pool.config.name,
            ladder.len(),
            ladder.smallest().capacity(),
            ladder.largest().capacity()
        );

        Ok(pool)
    }

    /// Create a pool behind an `Arc` for sharing with handles and threads
    pub fn shared(config: BufferPoolConfig) -> Result<Arc<Self>> {
        Self::new(config).map(Arc::new)
    }

    /// Rent a buffer able to hold `len` bytes
    ///
    /// The buffer comes from the smallest class whose capacity is at least
    /// `len`; its used length is `len`. A fresh buffer is zeroed, a reused one
    /// holds whatever the previous renter left behind.
    pub fn rent(&self, len: usize) -> Result<PooledBuffer> {
        let slot = self.slot_for(len)?;

        let reused = {
            let mut idle = slot.idle.lock();
            let buffer = idle.pop();
            slot.stats.set_idle(idle.len());
            buffer
        };

        let mut buffer = match reused {
            Some(buffer) => {
                slot.stats.record_hit();
                buffer
            }
            None => {
                let buffer = PooledBuffer::allocate(self.id, slot.class, self.config.alignment)?;
                slot.stats.record_allocations(1);
                slot.stats.record_miss();
                debug!(
                    "pool '{}' miss: allocated {} byte buffer for {} byte request",
                    self.config.name,
                    slot.class.capacity(),
                    len
                );
                buffer
            }
        };

        buffer.set_len(len)?;
        Ok(buffer)
    }

    /// Return a buffer to its class
    pub fn return_buffer(&self, buffer: PooledBuffer) -> Result<()> {
        if buffer.pool_id() != self.id {
            return Err(MsgBufError::foreign_buffer(self.id, buffer.pool_id()));
        }

        let slot = &self.slots[buffer.size_class().index()];
        {
            let mut idle = slot.idle.lock();
            idle.push(buffer);
            slot.stats.set_idle(idle.len());
        }
        slot.stats.record_return();

        Ok(())
    }

    /// Reserve idle-stack room so `slots` returns never reallocate the stack
    ///
    /// Capacity only grows; a smaller request is a no-op. Returns the new
    /// stack capacity.
    pub fn set_capacity(&self, class_size: usize, slots: usize) -> Result<usize> {
        let slot = self.slot_for(class_size)?;
        let mut idle = slot.idle.lock();
        if idle.capacity() < slots {
            let additional = slots - idle.len();
            idle.reserve_exact(additional);
        }
        Ok(idle.capacity())
    }

    /// Allocate until the class serving `class_size` holds `count` idle buffers
    ///
    /// Returns how many buffers were created. Not meant for the hot path.
    pub fn prewarm(&self, class_size: usize, count: usize) -> Result<usize> {
        let slot = self.slot_for(class_size)?;
        let missing = count.saturating_sub(slot.stats.idle());

        let mut fresh = Vec::with_capacity(missing);
        for _ in 0..missing {
            fresh.push(PooledBuffer::allocate(self.id, slot.class, self.config.alignment)?);
        }
        slot.stats.record_allocations(missing as u64);

        {
            let mut idle = slot.idle.lock();
            idle.reserve(missing);
            idle.extend(fresh);
            slot.stats.set_idle(idle.len());
        }

        if missing > 0 {
            debug!(
                "pool '{}' prewarmed {} buffers of {} bytes",
                self.config.name,
                missing,
                slot.class.capacity()
            );
        }

        Ok(missing)
    }

    /// Destroy every idle buffer, returning the number of bytes freed
    ///
    /// Rented buffers stay valid and rejoin their stacks when returned.
    pub fn clear(&self) -> usize {
        let mut freed = 0;
        for slot in self.slots.iter() {
            let drained = {
                let mut idle = slot.idle.lock();
                slot.stats.set_idle(0);
                std::mem::take(&mut *idle)
            };
            freed += drained.len() * slot.class.capacity();
            drop(drained);
        }
        info!("pool '{}' cleared, {} bytes freed", self.config.name, freed);
        freed
    }

    /// Class that serves `len` bytes
    pub fn class_for(&self, len: usize) -> Option<SizeClass> {
        self.ladder.class_for(len)
    }

    /// All size classes, smallest first
    pub fn size_classes(&self) -> Vec<SizeClass> {
        self.ladder.iter().collect()
    }

    /// Largest length the pool can serve
    pub fn max_len(&self) -> usize {
        self.ladder.largest().capacity()
    }

    /// Idle buffers in the class serving `class_size`
    pub fn idle_count(&self, class_size: usize) -> usize {
        self.class_for(class_size)
            .map(|class| self.slots[class.index()].stats.idle())
            .unwrap_or(0)
    }

    /// Get current statistics
    ///
    /// Reads atomics only; no class lock is taken.
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            classes: self
                .slots
                .iter()
                .map(|slot| slot.stats.snapshot(slot.class.capacity()))
                .collect(),
        }
    }

    /// Pool identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get pool configuration
    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    fn slot_for(&self, len: usize) -> Result<&ClassSlot> {
        if len == 0 {
            return Err(MsgBufError::invalid_size(0, "zero-length request"));
        }
        let class = self.ladder.class_for(len).ok_or_else(|| {
            MsgBufError::invalid_size(
                len,
                format!("exceeds largest size class ({} bytes)", self.max_len()),
            )
        })?;
        Ok(&self.slots[class.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BufferPool {
        BufferPool::new(BufferPoolConfig::new("unit")).unwrap()
    }

    #[test]
    fn test_miss_then_hit_reuses_region() {
        let pool = pool();

        let first = pool.rent(64).unwrap();
        let ptr = first.as_ptr();
        let stats = pool.stats();
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 0);

        pool.return_buffer(first).unwrap();

        let second = pool.rent(64).unwrap();
        assert_eq!(second.as_ptr(), ptr);
        assert_eq!(pool.stats().hits(), 1);
        pool.return_buffer(second).unwrap();
    }

    #[test]
    fn test_rent_rejects_bad_sizes() {
        let pool = pool();
        assert!(matches!(pool.rent(0), Err(MsgBufError::InvalidSize { requested: 0, .. })));
        assert!(matches!(
            pool.rent(pool.max_len() + 1),
            Err(MsgBufError::InvalidSize { .. })
        ));
        assert_eq!(pool.stats().rents(), 0);
    }

    #[test]
    fn test_foreign_buffer_is_rejected() {
        let a = pool();
        let b = pool();
        let buffer = a.rent(32).unwrap();
        assert!(matches!(b.return_buffer(buffer), Err(MsgBufError::ForeignBuffer { .. })));
        assert_eq!(b.stats().returns(), 0);
    }

    #[test]
    fn test_set_capacity_only_grows() {
        let pool = pool();
        let grown = pool.set_capacity(256, 32).unwrap();
        assert!(grown >= 32);
        assert_eq!(pool.set_capacity(256, 4).unwrap(), grown);
        assert_eq!(pool.idle_count(256), 0);
    }

    #[test]
    fn test_prewarm_and_clear() {
        let pool = pool();
        assert_eq!(pool.prewarm(1000, 4).unwrap(), 4);
        assert_eq!(pool.prewarm(1024, 4).unwrap(), 0);
        assert_eq!(pool.idle_count(1024), 4);

        let buffer = pool.rent(1024).unwrap();
        assert_eq!(pool.stats().hits(), 1);

        assert_eq!(pool.clear(), 3 * 1024);
        assert_eq!(pool.idle_count(1024), 0);

        pool.return_buffer(buffer).unwrap();
        assert_eq!(pool.idle_count(1024), 1);
    }

    #[test]
    fn test_stats_read_while_class_lock_held() {
        let pool = pool();
        let buffer = pool.rent(256).unwrap();
        pool.return_buffer(buffer).unwrap();

        let slot = pool.slot_for(256).unwrap();
        let _guard = slot.idle.lock();
        let stats = pool.stats();
        assert_eq!(stats.class(256).unwrap().idle, 1);
        assert_eq!(pool.idle_count(256), 1);
        assert_eq!(stats.returns(), 1);
    }

    #[test]
    fn test_prewarm_from_config() {
        let config = BufferPoolConfig::new("warm").with_prewarm(64, 8).with_prewarm(4096, 2);
        let pool = BufferPool::new(config).unwrap();
        assert_eq!(pool.idle_count(64), 8);
        assert_eq!(pool.idle_count(4096), 2);
        assert_eq!(pool.stats().allocations(), 10);
    }
}
