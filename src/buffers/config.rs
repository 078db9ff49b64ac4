//! Buffer pool configuration

use serde::{Deserialize, Serialize};

use crate::error::{MsgBufError, Result};

/// Smallest default size class (16 bytes)
pub const DEFAULT_MIN_CLASS_SIZE: usize = 16;

/// Largest default size class (4 MiB)
pub const DEFAULT_MAX_CLASS_SIZE: usize = 4 * 1024 * 1024;

/// Default alignment of every pooled buffer
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Number of buffers to allocate up front for one size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrewarmSpec {
    /// Any length served by the target class
    pub size: usize,
    /// Idle buffers the class should hold after construction
    pub count: usize,
}

/// Configuration for a size-classed buffer pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Name of the buffer pool, used in logs
    pub name: String,
    /// Capacity of the smallest size class (power of two)
    pub min_class_size: usize,
    /// Capacity of the largest size class (power of two)
    pub max_class_size: usize,
    /// Alignment requirement for buffers
    pub alignment: usize,
    /// Stack slots reserved per class so early returns never reallocate
    pub initial_stack_capacity: usize,
    /// Classes primed before the pool is handed out
    pub prewarm: Vec<PrewarmSpec>,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_class_size: DEFAULT_MIN_CLASS_SIZE,
            max_class_size: DEFAULT_MAX_CLASS_SIZE,
            alignment: DEFAULT_ALIGNMENT,
            initial_stack_capacity: 0,
            prewarm: Vec::new(),
        }
    }
}

impl BufferPoolConfig {
    /// Create a new configuration with custom name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the class size range
    pub fn with_class_range(mut self, min: usize, max: usize) -> Self {
        self.min_class_size = min;
        self.max_class_size = max;
        self
    }

    /// Set buffer alignment
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set per-class reserved stack slots
    pub fn with_initial_stack_capacity(mut self, slots: usize) -> Self {
        self.initial_stack_capacity = slots;
        self
    }

    /// Prime the class serving `size` with `count` buffers
    pub fn with_prewarm(mut self, size: usize, count: usize) -> Self {
        self.prewarm.push(PrewarmSpec { size, count });
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.min_class_size.is_power_of_two() {
            return Err(MsgBufError::invalid_parameter(
                "min_class_size",
                "Smallest class size must be a power of two",
            ));
        }

        if !self.max_class_size.is_power_of_two() {
            return Err(MsgBufError::invalid_parameter(
                "max_class_size",
                "Largest class size must be a power of two",
            ));
        }

        if self.max_class_size < self.min_class_size {
            return Err(MsgBufError::invalid_parameter(
                "max_class_size",
                "Largest class size cannot be below the smallest",
            ));
        }

        if !self.alignment.is_power_of_two() {
            return Err(MsgBufError::invalid_parameter(
                "alignment",
                "Alignment must be a power of two",
            ));
        }

        if self.alignment > self.min_class_size {
            return Err(MsgBufError::invalid_parameter(
                "alignment",
                "Alignment cannot exceed the smallest class size",
            ));
        }

        if std::alloc::Layout::from_size_align(self.max_class_size, self.alignment).is_err() {
            return Err(MsgBufError::invalid_parameter(
                "max_class_size",
                format!(
                    "{} bytes at alignment {} is not a valid allocation layout",
                    self.max_class_size, self.alignment
                ),
            ));
        }

        for spec in &self.prewarm {
            if spec.size == 0 || spec.size > self.max_class_size {
                return Err(MsgBufError::invalid_parameter(
                    "prewarm",
                    format!("No size class serves {} bytes", spec.size),
                ));
            }
        }

        Ok(())
    }

    /// Number of classes on the ladder
    pub fn class_count(&self) -> usize {
        (self.max_class_size / self.min_class_size).trailing_zeros() as usize + 1
    }

    /// Bytes committed by the prewarm list
    pub fn prewarm_bytes(&self) -> usize {
        self.prewarm
            .iter()
            .map(|spec| spec.size.next_power_of_two().max(self.min_class_size) * spec.count)
            .sum()
    }
}

/// Builder pattern for buffer pool configuration
pub struct BufferPoolConfigBuilder {
    config: BufferPoolConfig,
}

impl BufferPoolConfigBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: BufferPoolConfig::new(name),
        }
    }

    /// Set smallest class size
    pub fn min_class_size(mut self, size: usize) -> Self {
        self.config.min_class_size = size;
        self
    }

    /// Set largest class size
    pub fn max_class_size(mut self, size: usize) -> Self {
        self.config.max_class_size = size;
        self
    }

    /// Set alignment
    pub fn alignment(mut self, alignment: usize) -> Self {
        self.config.alignment = alignment;
        self
    }

    /// Set reserved stack slots per class
    pub fn initial_stack_capacity(mut self, slots: usize) -> Self {
        self.config.initial_stack_capacity = slots;
        self
    }

    /// Add a prewarm entry
    pub fn prewarm(mut self, size: usize, count: usize) -> Self {
        self.config.prewarm.push(PrewarmSpec { size, count });
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<BufferPoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
