//! Basic usage example of the msgbuf buffer layer

use msgbuf::{
    buffers::{BufferPool, BufferPoolConfig},
    message::MessageHandle,
    poll::{EventKind, Interest, ReadinessMultiplexer, WakeEndpoint},
    transfer::{OperationKind, Transfer, TransferThresholds},
    transport::{MockTransport, TransferFlags},
    Result,
};
use std::{sync::Arc, thread, time::Duration};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    println!("msgbuf Example");
    println!("==============");

    // Create a buffer pool with a few warm 4KB buffers
    let pool_config = BufferPoolConfig::new("example_pool").with_prewarm(4096, 8);
    println!("Creating buffer pool: {}", pool_config.name);
    let pool = BufferPool::shared(pool_config)?;
    println!("  Size classes: {}", pool.size_classes().len());
    println!("  Idle 4KB buffers: {}", pool.idle_count(4096));

    // Rent, fill and release a pooled message
    println!("\nBuilding messages...");
    let mut handle = MessageHandle::copy_from(&pool, b"Hello from msgbuf!")?;
    println!("  Handle {} holds {} bytes ({:?})", handle.id(), handle.len(), handle.owner_kind());
    println!("  Contents: {}", String::from_utf8_lossy(handle.as_slice()?));
    handle.release()?;

    // Releasing twice is an error, not a corruption
    match handle.release() {
        Err(e) => println!("  Second release rejected: {}", e),
        Ok(()) => println!("  Second release unexpectedly succeeded"),
    }
    println!("  {}", pool.stats().summary());

    // Pick a strategy per payload and send through the mock transport
    println!("\nSending payloads...");
    let transfer = Transfer::new(Arc::clone(&pool), TransferThresholds::default())?;
    let transport = MockTransport::new()?;
    for size in [64usize, 1024, 65536] {
        let payload = vec![1u8; size];
        let strategy = transfer.send(&transport, &payload, TransferFlags::NONE)?;
        println!("  {:>6} bytes -> {}", size, strategy);
    }
    transport.wait_idle(Duration::from_secs(5));
    println!("  Transport checksum: {}", transport.stats().checksum_total);
    println!(
        "  A 65536 byte receive would use {}",
        transfer.strategy(65536, OperationKind::Receive)
    );

    // Wait on two endpoints, woken from another thread
    println!("\nWaiting for readiness...");
    let idle = Arc::new(WakeEndpoint::new()?);
    let wake = Arc::new(WakeEndpoint::new()?);
    let mut mux = ReadinessMultiplexer::with_capacity(2)?;
    let idle_ref = mux.register(Arc::clone(&idle), Interest::READABLE)?;
    let wake_ref = mux.register(Arc::clone(&wake), Interest::READABLE)?;

    let waker = {
        let wake = Arc::clone(&wake);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            wake.wake()
        })
    };

    let ready = mux.poll(-1)?;
    println!("  Ready endpoints: {}", ready);
    println!("  Idle endpoint readable: {}", mux.is_ready(idle_ref, EventKind::In));
    println!("  Wake endpoint readable: {}", mux.is_ready(wake_ref, EventKind::In));
    wake.drain()?;
    if let Ok(result) = waker.join() {
        result?;
    }

    println!("\nExample completed successfully!");
    Ok(())
}
