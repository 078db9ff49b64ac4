//! Power-of-two size class ladder

use serde::Serialize;

use crate::error::Result;

use super::config::BufferPoolConfig;

/// One rung of the capacity ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SizeClass {
    index: usize,
    capacity: usize,
}

impl SizeClass {
    /// Position on the ladder, smallest class first
    pub fn index(&self) -> usize {
        self.index
    }

    /// Capacity of every buffer in this class
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Maps requested lengths onto size classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassLadder {
    min_shift: u32,
    count: usize,
}

impl SizeClassLadder {
    /// Build the ladder described by a pool configuration
    pub fn from_config(config: &BufferPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            min_shift: config.min_class_size.trailing_zeros(),
            count: config.class_count(),
        })
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always false: a validated ladder holds at least one class
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Smallest class
    pub fn smallest(&self) -> SizeClass {
        self.class_at_unchecked(0)
    }

    /// Largest class
    pub fn largest(&self) -> SizeClass {
        self.class_at_unchecked(self.count - 1)
    }

    /// Class at a ladder position
    pub fn class_at(&self, index: usize) -> Option<SizeClass> {
        (index < self.count).then(|| self.class_at_unchecked(index))
    }

    /// Smallest class whose capacity holds `len` bytes
    ///
    /// Rounds up, never down. `None` for zero or for lengths above the
    /// largest class.
    pub fn class_for(&self, len: usize) -> Option<SizeClass> {
        if len == 0 || len > self.largest().capacity {
            return None;
        }
        let shift = len.next_power_of_two().trailing_zeros();
        let index = shift.saturating_sub(self.min_shift) as usize;
        Some(self.class_at_unchecked(index))
    }

    /// Iterate classes from smallest to largest
    pub fn iter(&self) -> impl Iterator<Item = SizeClass> + '_ {
        (0..self.count).map(move |index| self.class_at_unchecked(index))
    }

    fn class_at_unchecked(&self, index: usize) -> SizeClass {
        SizeClass {
            index,
            capacity: 1usize << (self.min_shift as usize + index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> SizeClassLadder {
        SizeClassLadder::from_config(&BufferPoolConfig::default()).unwrap()
    }

    #[test]
    fn test_rounds_up_to_next_class() {
        let ladder = ladder();
        assert_eq!(ladder.class_for(1).unwrap().capacity(), 16);
        assert_eq!(ladder.class_for(16).unwrap().capacity(), 16);
        assert_eq!(ladder.class_for(17).unwrap().capacity(), 32);
        assert_eq!(ladder.class_for(1000).unwrap().capacity(), 1024);
        assert_eq!(ladder.class_for(4 * 1024 * 1024).unwrap().index(), 18);
    }

    #[test]
    fn test_out_of_range_lengths() {
        let ladder = ladder();
        assert!(ladder.class_for(0).is_none());
        assert!(ladder.class_for(4 * 1024 * 1024 + 1).is_none());
        assert!(ladder.class_for(usize::MAX).is_none());
    }

    #[test]
    fn test_iteration_is_doubling() {
        let ladder = ladder();
        let capacities: Vec<usize> = ladder.iter().map(|c| c.capacity()).collect();
        assert_eq!(capacities.len(), ladder.len());
        for pair in capacities.windows(2) {
            assert_eq!(pair[1], pair[0] * 2);
        }
        assert_eq!(ladder.smallest().capacity(), 16);
        assert_eq!(ladder.largest().capacity(), 4 * 1024 * 1024);
        assert!(ladder.class_at(19).is_none());
    }
}
