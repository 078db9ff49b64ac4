//! Buffer pool statistics tracking

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Snapshot of one size class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SizeClassStats {
    /// Capacity of buffers in this class
    pub capacity: usize,
    /// Successful rents
    pub rents: u64,
    /// Buffers handed back
    pub returns: u64,
    /// Rents served from the idle stack
    pub hits: u64,
    /// Rents that had to allocate
    pub misses: u64,
    /// Buffers ever created for this class (misses plus prewarming)
    pub allocations: u64,
    /// Idle buffers at snapshot time
    pub idle: usize,
}

impl SizeClassStats {
    /// Buffers rented and not yet returned
    pub fn outstanding(&self) -> u64 {
        self.rents.saturating_sub(self.returns)
    }
}

/// Statistics for buffer pool monitoring and performance analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferPoolStats {
    /// Per-class snapshots, smallest class first
    pub classes: Vec<SizeClassStats>,
}

impl BufferPoolStats {
    /// Total successful rents
    pub fn rents(&self) -> u64 {
        self.classes.iter().map(|c| c.rents).sum()
    }

    /// Total returns
    pub fn returns(&self) -> u64 {
        self.classes.iter().map(|c| c.returns).sum()
    }

    /// Total hits
    pub fn hits(&self) -> u64 {
        self.classes.iter().map(|c| c.hits).sum()
    }

    /// Total misses
    pub fn misses(&self) -> u64 {
        self.classes.iter().map(|c| c.misses).sum()
    }

    /// Total buffers created
    pub fn allocations(&self) -> u64 {
        self.classes.iter().map(|c| c.allocations).sum()
    }

    /// Buffers rented and not yet returned
    pub fn outstanding(&self) -> u64 {
        self.rents().saturating_sub(self.returns())
    }

    /// Bytes held idle across all classes
    pub fn idle_bytes(&self) -> usize {
        self.classes.iter().map(|c| c.capacity * c.idle).sum()
    }

    /// Snapshot of the class with the given capacity
    pub fn class(&self, capacity: usize) -> Option<&SizeClassStats> {
        self.classes.iter().find(|c| c.capacity == capacity)
    }

    /// Fraction of rents served without allocating (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let rents = self.rents();
        if rents == 0 {
            return 0.0;
        }
        self.hits() as f64 / rents as f64
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "BufferPoolStats {{ rents: {}, returns: {}, hits: {}, misses: {}, \
             outstanding: {}, idle_bytes: {}, hit_rate: {:.2}% }}",
            self.rents(),
            self.returns(),
            self.hits(),
            self.misses(),
            self.outstanding(),
            self.idle_bytes(),
            self.hit_rate() * 100.0
        )
    }
}

/// Thread-safe counters for one size class
///
/// Counters only grow and use relaxed ordering; a snapshot taken while other
/// threads rent and return is eventually consistent. The idle gauge mirrors
/// the class stack length so snapshots never take the stack lock.
#[derive(Debug, Default)]
pub struct AtomicSizeClassStats {
    rents: AtomicU64,
    returns: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    allocations: AtomicU64,
    idle: AtomicUsize,
}

impl AtomicSizeClassStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rent served from the idle stack
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.rents.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rent that allocated a fresh buffer
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.rents.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer handed back
    pub fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    /// Record newly created buffers
    pub fn record_allocations(&self, count: u64) {
        self.allocations.fetch_add(count, Ordering::Relaxed);
    }

    /// Publish the idle stack length
    ///
    /// Called with the stack lock held, right after the stack changed.
    pub fn set_idle(&self, idle: usize) {
        self.idle.store(idle, Ordering::Relaxed);
    }

    /// Idle buffers as of the last stack change
    pub fn idle(&self) -> usize {
        self.idle.load(Ordering::Relaxed)
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self, capacity: usize) -> SizeClassStats {
        SizeClassStats {
            capacity,
            rents: self.rents.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            idle: self.idle(),
        }
    }
}

/// Helper for generating pool identifiers
pub fn next_pool_id() -> u64 {
    static POOL_COUNTER: AtomicU64 = AtomicU64::new(1);
    POOL_COUNTER.fetch_add(1, Ordering::Relaxed)
}
