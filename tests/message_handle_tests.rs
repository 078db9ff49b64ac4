//! Message handle ownership and at-most-once release

use std::{
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use msgbuf::{
    buffers::{BufferPool, BufferPoolConfig},
    message::{MessageHandle, OwnerKind},
    MsgBufError,
};

fn shared_pool() -> Arc<BufferPool> {
    BufferPool::shared(BufferPoolConfig::new("handle-tests")).unwrap()
}

#[test]
fn test_counters_balance_after_release() {
    let pool = shared_pool();
    let mut handles: Vec<_> = (1..=20)
        .map(|i| MessageHandle::with_len(&pool, i * 100).unwrap())
        .collect();

    for handle in handles.iter_mut().step_by(2) {
        handle.release().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.rents() - stats.returns(), stats.outstanding());
    assert_eq!(stats.outstanding(), 10);

    drop(handles);
    let stats = pool.stats();
    assert_eq!(stats.rents(), stats.returns());
    assert_eq!(stats.outstanding(), 0);
}

#[test]
fn test_second_release_leaves_pool_alone() {
    let pool = shared_pool();
    let mut victim = MessageHandle::copy_from(&pool, &[7u8; 256]).unwrap();
    victim.release().unwrap();
    let before = pool.stats();

    // Another renter now owns the returned region.
    let mut bystander = MessageHandle::with_len(&pool, 256).unwrap();
    bystander.as_mut_slice().unwrap().fill(0x42);

    assert!(matches!(victim.release(), Err(MsgBufError::DoubleRelease { .. })));
    assert!(matches!(victim.as_slice(), Err(MsgBufError::UseAfterRelease { .. })));

    let after = pool.stats();
    assert_eq!(after.returns(), before.returns());
    assert_eq!(after.outstanding(), 1);
    assert!(bystander.as_slice().unwrap().iter().all(|&b| b == 0x42));

    bystander.release().unwrap();
    assert_eq!(pool.stats().outstanding(), 0);
}

#[test]
fn test_release_token_completes_on_io_thread() {
    let pool = shared_pool();
    let handle = MessageHandle::copy_from(&pool, b"handoff").unwrap();
    let id = handle.id();
    let token = handle.into_release_token().unwrap();
    assert_eq!(token.id(), id);
    assert_eq!(token.owner_kind(), OwnerKind::Pool);

    thread::spawn(move || {
        assert_eq!(token.as_slice().unwrap(), b"handoff");
        token.complete().unwrap();
    })
    .join()
    .unwrap();

    let stats = pool.stats();
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(pool.idle_count(7), 1);
}

#[test]
fn test_external_callback_runs_once_with_its_region() {
    let mut backing = vec![3u8; 128].into_boxed_slice();
    let expected = backing.as_mut_ptr() as usize;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut handle = unsafe {
        MessageHandle::from_raw_parts(NonNull::new(backing.as_mut_ptr()).unwrap(), 128, move |ptr, len| {
            assert_eq!(ptr.as_ptr() as usize, expected);
            assert_eq!(len, 128);
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };
    assert_eq!(handle.owner_kind(), OwnerKind::External);
    assert_eq!(handle.as_slice().unwrap()[0], 3);

    handle.release().unwrap();
    assert!(handle.release().is_err());
    drop(handle);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(backing);
}

#[test]
fn test_zero_copy_rejects_empty_payload() {
    assert!(matches!(
        MessageHandle::zero_copy(Vec::new()),
        Err(MsgBufError::InvalidSize { requested: 0, .. })
    ));
    assert!(matches!(
        MessageHandle::with_len(&shared_pool(), 0),
        Err(MsgBufError::InvalidSize { requested: 0, .. })
    ));
}
