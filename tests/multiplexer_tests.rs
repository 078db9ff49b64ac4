//! Readiness multiplexer over real descriptors

use std::{
    io::Write,
    os::unix::net::UnixStream,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use msgbuf::{
    poll::{EventKind, Interest, ReadinessMultiplexer, WakeEndpoint},
    MsgBufError,
};

#[test]
fn test_only_signalled_endpoint_is_ready() {
    let first = Arc::new(WakeEndpoint::new().unwrap());
    let second = Arc::new(WakeEndpoint::new().unwrap());
    let mut mux = ReadinessMultiplexer::with_capacity(2).unwrap();
    let ref1 = mux.register(Arc::clone(&first), Interest::READABLE).unwrap();
    let ref2 = mux.register(Arc::clone(&second), Interest::READABLE).unwrap();

    first.wake().unwrap();
    assert_eq!(mux.poll(-1).unwrap(), 1);
    assert!(mux.is_ready(ref1, EventKind::In));
    assert!(!mux.is_ready(ref2, EventKind::In));
}

#[test]
fn test_zero_timeout_returns_immediately() {
    let idle = Arc::new(WakeEndpoint::new().unwrap());
    let mut mux = ReadinessMultiplexer::with_capacity(4).unwrap();
    let endpoint = mux.register(Arc::clone(&idle), Interest::READABLE).unwrap();

    let start = Instant::now();
    assert_eq!(mux.poll(0).unwrap(), 0);
    assert!(start.elapsed() < Duration::from_millis(10));
    assert!(!mux.is_ready(endpoint, EventKind::In));
}

#[test]
fn test_bounded_wait_times_out_with_zero() {
    let idle = Arc::new(WakeEndpoint::new().unwrap());
    let mut mux = ReadinessMultiplexer::with_capacity(1).unwrap();
    mux.register(Arc::clone(&idle), Interest::READABLE).unwrap();

    let start = Instant::now();
    assert_eq!(mux.poll(30).unwrap(), 0);
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn test_registration_past_capacity_fails() {
    let mut mux = ReadinessMultiplexer::with_capacity(1).unwrap();
    mux.register(WakeEndpoint::new().unwrap(), Interest::READABLE).unwrap();

    let err = mux
        .register(WakeEndpoint::new().unwrap(), Interest::READABLE)
        .unwrap_err();
    assert!(matches!(err, MsgBufError::CapacityExceeded { capacity: 1, .. }));
    assert_eq!(mux.len(), 1);
}

#[test]
fn test_wake_from_another_thread_unblocks_infinite_poll() {
    let wake = Arc::new(WakeEndpoint::new().unwrap());
    let (_quiet, peer) = UnixStream::pair().unwrap();
    let mut mux = ReadinessMultiplexer::with_capacity(2).unwrap();
    let socket = mux.register(peer, Interest::READABLE).unwrap();
    let waker = mux.register(Arc::clone(&wake), Interest::READABLE).unwrap();

    let remote = Arc::clone(&wake);
    let signaller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        remote.wake().unwrap();
    });

    assert_eq!(mux.poll(-1).unwrap(), 1);
    assert!(mux.is_ready(waker, EventKind::In));
    assert!(!mux.is_ready(socket, EventKind::In));
    signaller.join().unwrap();

    assert!(wake.drain().unwrap());
    assert_eq!(mux.poll(0).unwrap(), 0);
}

#[test]
fn test_socket_endpoints_report_read_and_write() {
    let (mut near, far) = UnixStream::pair().unwrap();
    let mut mux = ReadinessMultiplexer::with_capacity(2).unwrap();
    let endpoint = mux.register(far, Interest::BOTH).unwrap();

    assert_eq!(mux.poll(0).unwrap(), 1);
    assert!(mux.is_ready(endpoint, EventKind::Out));
    assert!(!mux.is_ready(endpoint, EventKind::In));

    near.write_all(b"ping").unwrap();
    assert_eq!(mux.poll(100).unwrap(), 1);
    assert!(mux.is_ready(endpoint, EventKind::In));
    assert!(mux.is_ready(endpoint, EventKind::Out));

    drop(near);
    mux.poll(100).unwrap();
    assert!(mux.is_ready(endpoint, EventKind::In));
}
