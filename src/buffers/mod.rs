//! Size-classed buffer pool
//!
//! Buffers live on a power-of-two capacity ladder (16 B to 4 MiB by default).
//! Renting rounds a length up to its class and reuses an idle buffer when one
//! is available; returning pushes the buffer back without freeing it.

pub mod buffer;
pub mod config;
pub mod pool;
pub mod size_class;
pub mod stats;

// Re-export main types
pub use buffer::PooledBuffer;
pub use config::{BufferPoolConfig, BufferPoolConfigBuilder, PrewarmSpec};
pub use pool::BufferPool;
pub use size_class::{SizeClass, SizeClassLadder};
pub use stats::{AtomicSizeClassStats, BufferPoolStats, SizeClassStats};
