//! Buffer pool behaviour through the public API

use msgbuf::{
    buffers::{BufferPool, BufferPoolConfig},
    MsgBufError,
};
use proptest::prelude::*;

fn pool() -> BufferPool {
    BufferPool::new(BufferPoolConfig::new("pool-tests")).unwrap()
}

#[test]
fn test_miss_then_hit_scenario() {
    let pool = pool();

    let first = pool.rent(64).unwrap();
    assert_eq!(first.capacity(), 64);
    let stats = pool.stats();
    assert_eq!(stats.misses(), 1);
    assert_eq!(stats.hits(), 0);
    let identity = first.as_ptr();
    pool.return_buffer(first).unwrap();

    let second = pool.rent(64).unwrap();
    assert_eq!(second.as_ptr(), identity);
    let stats = pool.stats();
    assert_eq!(stats.hits(), 1);
    assert_eq!(stats.misses(), 1);
    pool.return_buffer(second).unwrap();
}

#[test]
fn test_classes_are_independent() {
    let pool = pool();
    let small = pool.rent(16).unwrap();
    let large = pool.rent(1 << 20).unwrap();
    pool.return_buffer(small).unwrap();
    pool.return_buffer(large).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.class(16).unwrap().returns, 1);
    assert_eq!(stats.class(1 << 20).unwrap().returns, 1);
    assert_eq!(stats.class(64).unwrap().rents, 0);
    assert_eq!(stats.idle_bytes(), 16 + (1 << 20));
}

#[test]
fn test_default_ladder_bounds() {
    let pool = pool();
    let classes = pool.size_classes();
    assert_eq!(classes.first().unwrap().capacity(), 16);
    assert_eq!(classes.last().unwrap().capacity(), 4 * 1024 * 1024);
    assert!(matches!(
        pool.rent(4 * 1024 * 1024 + 1),
        Err(MsgBufError::InvalidSize { .. })
    ));
}

#[test]
fn test_alignment_is_honoured() {
    let config = BufferPoolConfig::new("aligned").with_alignment(64).with_class_range(64, 4096);
    let pool = BufferPool::new(config).unwrap();
    for len in [1usize, 100, 4096] {
        let buffer = pool.rent(len).unwrap();
        assert_eq!(buffer.as_ptr() as usize % 64, 0);
        pool.return_buffer(buffer).unwrap();
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = BufferPoolConfig::new("bad").with_class_range(100, 4096);
    assert!(matches!(BufferPool::new(config), Err(MsgBufError::InvalidParameter { .. })));
}

#[test]
fn test_failed_allocation_leaves_counters_untouched() {
    let config = BufferPoolConfig::new("huge").with_class_range(16, 1 << 62);
    let pool = BufferPool::new(config).unwrap();

    let result = pool.rent(1 << 62);
    assert!(matches!(result, Err(MsgBufError::AllocationFailure { .. })));

    let stats = pool.stats();
    assert_eq!(stats.rents(), 0);
    assert_eq!(stats.misses(), 0);
    assert_eq!(stats.allocations(), 0);
    assert_eq!(stats.outstanding(), 0);

    let small = pool.rent(64).unwrap();
    pool.return_buffer(small).unwrap();
    assert_eq!(pool.stats().rents(), 1);
}

proptest! {
    #[test]
    fn prop_rent_rounds_to_smallest_fitting_class(len in 1usize..=4 * 1024 * 1024) {
        let pool = pool();
        let buffer = pool.rent(len).unwrap();
        let capacity = buffer.capacity();

        prop_assert!(capacity >= len);
        prop_assert!(capacity.is_power_of_two());
        prop_assert!(capacity == 16 || capacity / 2 < len);
        prop_assert_eq!(buffer.len(), len);
        prop_assert_eq!(pool.class_for(len).unwrap().capacity(), capacity);

        pool.return_buffer(buffer).unwrap();
    }

    #[test]
    fn prop_return_then_rent_same_class_reuses_region(len in 1usize..=65536, other in 1usize..=65536) {
        let pool = pool();
        let buffer = pool.rent(len).unwrap();
        let identity = buffer.as_ptr();
        let class = buffer.capacity();
        pool.return_buffer(buffer).unwrap();

        let again = pool.rent(other).unwrap();
        if again.capacity() == class {
            prop_assert_eq!(again.as_ptr(), identity);
            prop_assert_eq!(pool.stats().hits(), 1);
        } else {
            prop_assert_eq!(pool.stats().misses(), 2);
        }
        pool.return_buffer(again).unwrap();
    }
}
