//! In-process transport used by tests, benches and the CLI
//!
//! Sending sums the bytes into a checksum, receiving writes the `i & 0xFF`
//! pattern, and zero-copy sends are completed on a background I/O thread.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    error::{MsgBufError, Result},
    message::ReleaseToken,
};

use super::{RecvOutcome, TransferFlags, Transport};

/// Sum of all bytes, reported for every send
pub fn checksum(data: &[u8]) -> i64 {
    data.iter().map(|&b| b as i64).sum()
}

/// Fill a buffer with the receive pattern
pub fn fill_pattern(buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = (i & 0xFF) as u8;
    }
}

/// Counters kept by [`MockTransport`]
#[derive(Debug, Default)]
struct Counters {
    raw_sends: AtomicU64,
    raw_recvs: AtomicU64,
    bytes_sent: AtomicU64,
    zero_copy_submitted: AtomicU64,
    zero_copy_completed: AtomicU64,
    checksum_total: AtomicI64,
}

/// Snapshot of [`MockTransport`] activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockTransportStats {
    /// Copy-based sends
    pub raw_sends: u64,
    /// Receives that delivered data
    pub raw_recvs: u64,
    /// Bytes accepted by either send path
    pub bytes_sent: u64,
    /// Zero-copy sends handed to the I/O thread
    pub zero_copy_submitted: u64,
    /// Zero-copy sends the I/O thread completed
    pub zero_copy_completed: u64,
    /// Sum of every send checksum
    pub checksum_total: i64,
}

impl MockTransportStats {
    /// Zero-copy sends not yet completed
    pub fn zero_copy_pending(&self) -> u64 {
        self.zero_copy_submitted.saturating_sub(self.zero_copy_completed)
    }
}

/// Transport that consumes data in-process
pub struct MockTransport {
    counters: Arc<Counters>,
    recv_ready: AtomicBool,
    send_ready: AtomicBool,
    io_queue: Mutex<Option<mpsc::Sender<ReleaseToken>>>,
    io_thread: Mutex<Option<JoinHandle<()>>>,
}

impl MockTransport {
    /// Create the transport and start its I/O thread
    pub fn new() -> Result<Self> {
        let counters = Arc::new(Counters::default());
        let (sender, receiver) = mpsc::channel::<ReleaseToken>();

        let io_counters = Arc::clone(&counters);
        let io_thread = thread::Builder::new()
            .name("msgbuf-mock-io".to_string())
            .spawn(move || {
                for token in receiver {
                    let sum = token.as_slice().map(checksum).unwrap_or_default();
                    io_counters.checksum_total.fetch_add(sum, Ordering::Relaxed);
                    if let Err(e) = token.complete() {
                        warn!("mock transport failed to complete handoff: {}", e);
                    }
                    io_counters.zero_copy_completed.fetch_add(1, Ordering::Release);
                }
                debug!("mock transport I/O thread stopped");
            })
            .map_err(|e| MsgBufError::from_io(e, "spawn mock I/O thread"))?;

        Ok(Self {
            counters,
            recv_ready: AtomicBool::new(true),
            send_ready: AtomicBool::new(true),
            io_queue: Mutex::new(Some(sender)),
            io_thread: Mutex::new(Some(io_thread)),
        })
    }

    /// Make receives report would-block (`false`) or deliver data (`true`)
    pub fn set_recv_ready(&self, ready: bool) {
        self.recv_ready.store(ready, Ordering::Relaxed);
    }

    /// Make non-blocking sends fail with [`MsgBufError::WouldBlock`] (`false`)
    pub fn set_send_ready(&self, ready: bool) {
        self.send_ready.store(ready, Ordering::Relaxed);
    }

    /// Current counters
    pub fn stats(&self) -> MockTransportStats {
        let c = &self.counters;
        MockTransportStats {
            raw_sends: c.raw_sends.load(Ordering::Relaxed),
            raw_recvs: c.raw_recvs.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            zero_copy_submitted: c.zero_copy_submitted.load(Ordering::Relaxed),
            zero_copy_completed: c.zero_copy_completed.load(Ordering::Acquire),
            checksum_total: c.checksum_total.load(Ordering::Relaxed),
        }
    }

    /// Wait until every submitted zero-copy send has completed
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.stats().zero_copy_pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_micros(50));
        }
        true
    }

    fn check_send(&self, flags: TransferFlags) -> Result<()> {
        if flags.contains(TransferFlags::DONT_WAIT) && !self.send_ready.load(Ordering::Relaxed) {
            return Err(MsgBufError::WouldBlock);
        }
        Ok(())
    }

    /// Stop the I/O thread after it drains pending handoffs
    pub fn shutdown(&self) {
        let sender = self.io_queue.lock().ok().and_then(|mut queue| queue.take());
        drop(sender);

        let io_thread = self.io_thread.lock().ok().and_then(|mut t| t.take());
        if let Some(io_thread) = io_thread {
            if io_thread.join().is_err() {
                warn!("mock transport I/O thread panicked");
            }
        }
    }
}

impl Transport for MockTransport {
    fn send_raw(&self, data: &[u8], flags: TransferFlags) -> Result<usize> {
        self.check_send(flags)?;
        self.counters.raw_sends.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes_sent.fetch_add(data.len() as u64, Ordering::Relaxed);
        self.counters.checksum_total.fetch_add(checksum(data), Ordering::Relaxed);
        Ok(data.len())
    }

    fn recv_raw(&self, buf: &mut [u8], _flags: TransferFlags) -> Result<RecvOutcome> {
        if !self.recv_ready.load(Ordering::Relaxed) {
            return Ok(RecvOutcome::WouldBlock);
        }
        fill_pattern(buf);
        self.counters.raw_recvs.fetch_add(1, Ordering::Relaxed);
        Ok(RecvOutcome::Received(buf.len()))
    }

    fn send_zero_copy(&self, token: ReleaseToken, flags: TransferFlags) -> Result<()> {
        self.check_send(flags)?;
        let queue = self
            .io_queue
            .lock()
            .map_err(|_| MsgBufError::invalid_parameter("transport", "I/O queue poisoned"))?;
        let sender = queue
            .as_ref()
            .ok_or_else(|| MsgBufError::invalid_parameter("transport", "transport shut down"))?;

        let len = token.len() as u64;
        self.counters.zero_copy_submitted.fetch_add(1, Ordering::Relaxed);
        if sender.send(token).is_err() {
            self.counters.zero_copy_submitted.fetch_sub(1, Ordering::Relaxed);
            return Err(MsgBufError::invalid_parameter("transport", "I/O thread stopped"));
        }
        self.counters.bytes_sent.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
