//! Level-triggered readiness multiplexer over `poll(2)`
//!
//! Registrations live in a fixed-capacity table. Each [`poll`] call writes a
//! fresh readiness snapshot for every registration; [`is_ready`] reads that
//! snapshot in O(1). A snapshot is stale as soon as the next poll runs.
//!
//! [`poll`]: ReadinessMultiplexer::poll
//! [`is_ready`]: ReadinessMultiplexer::is_ready

use std::{
    fmt,
    os::fd::{AsFd, AsRawFd},
    time::{Duration, Instant},
};

use log::{debug, trace};
use nix::{
    errno::Errno,
    poll::{poll, PollFd},
};

use crate::error::{MsgBufError, Result};

use super::interest::{EventKind, Interest, Readiness};

/// Stable index of a registration
///
/// Assigned by [`ReadinessMultiplexer::register`] and valid for the
/// multiplexer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointRef(usize);

impl EndpointRef {
    /// Position in the registration table
    pub fn index(self) -> usize {
        self.0
    }
}

struct Registration {
    endpoint: Box<dyn AsFd + Send>,
    interest: Interest,
}

/// Waits on many endpoints in one call
///
/// Driven by a single thread; the endpoints themselves may be signalled from
/// anywhere.
pub struct ReadinessMultiplexer {
    capacity: usize,
    registrations: Vec<Registration>,
    snapshot: Vec<Readiness>,
    ready_count: usize,
}

impl ReadinessMultiplexer {
    /// Create a multiplexer that accepts at most `capacity` registrations
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MsgBufError::invalid_parameter("capacity", "must be at least 1"));
        }
        Ok(Self {
            capacity,
            registrations: Vec::with_capacity(capacity),
            snapshot: Vec::with_capacity(capacity),
            ready_count: 0,
        })
    }

    /// Register an endpoint
    ///
    /// The multiplexer keeps the endpoint alive until it is dropped. Register
    /// an `Arc` to keep using the endpoint elsewhere.
    pub fn register<E>(&mut self, endpoint: E, interest: Interest) -> Result<EndpointRef>
    where
        E: AsFd + Send + 'static,
    {
        if self.registrations.len() >= self.capacity {
            return Err(MsgBufError::capacity_exceeded("readiness multiplexer", self.capacity));
        }

        let endpoint_ref = EndpointRef(self.registrations.len());
        debug!(
            "registered fd {} as endpoint {} with {:?}",
            endpoint.as_fd().as_raw_fd(),
            endpoint_ref.0,
            interest
        );

        self.registrations.push(Registration {
            endpoint: Box::new(endpoint),
            interest,
        });
        self.snapshot.push(Readiness::EMPTY);

        Ok(endpoint_ref)
    }

    /// Wait for readiness and return how many registrations are ready
    ///
    /// A negative timeout blocks until something is ready, zero checks once
    /// without blocking, and a positive timeout waits at most that many
    /// milliseconds. Running out of time returns `Ok(0)`.
    pub fn poll(&mut self, timeout_ms: i64) -> Result<usize> {
        if self.registrations.is_empty() && timeout_ms < 0 {
            return Err(MsgBufError::invalid_parameter(
                "timeout_ms",
                "infinite wait with no registered endpoints",
            ));
        }

        let deadline = (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms as u64));
        let mut wait = clamp_timeout(timeout_ms);

        let mut poll_fds: Vec<PollFd<'_>> = self
            .registrations
            .iter()
            .map(|registration| PollFd::new(&registration.endpoint, registration.interest.poll_flags()))
            .collect();

        let timed_out = loop {
            match poll(&mut poll_fds, wait) {
                Ok(_) => break false,
                Err(Errno::EINTR) => {
                    if let Some(deadline) = deadline {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            break true;
                        }
                        wait = clamp_timeout(remaining.as_millis().max(1) as i64);
                    }
                    trace!("poll interrupted, retrying with {} ms", wait);
                }
                Err(e) => return Err(MsgBufError::from_errno(e, "poll endpoints")),
            }
        };

        // Written in place so repeated polls reuse the snapshot table.
        self.ready_count = 0;
        for (slot, fd) in self.snapshot.iter_mut().zip(poll_fds.iter()) {
            *slot = match fd.revents() {
                Some(flags) if !timed_out => Readiness::from_poll_flags(flags),
                _ => Readiness::EMPTY,
            };
            if !slot.is_empty() {
                self.ready_count += 1;
            }
        }
        trace!("poll({}) -> {} ready", timeout_ms, self.ready_count);

        Ok(self.ready_count)
    }

    /// Whether `endpoint` reported `kind` in the last poll
    ///
    /// Unknown references report `false`.
    pub fn is_ready(&self, endpoint: EndpointRef, kind: EventKind) -> bool {
        self.readiness(endpoint).contains(kind)
    }

    /// Full readiness mask of `endpoint` from the last poll
    pub fn readiness(&self, endpoint: EndpointRef) -> Readiness {
        self.snapshot.get(endpoint.0).copied().unwrap_or_default()
    }

    /// Registrations ready after the last poll
    pub fn ready(&self) -> impl Iterator<Item = EndpointRef> + '_ {
        self.snapshot
            .iter()
            .enumerate()
            .filter(|(_, readiness)| !readiness.is_empty())
            .map(|(index, _)| EndpointRef(index))
    }

    /// Ready count from the last poll
    pub fn ready_count(&self) -> usize {
        self.ready_count
    }

    /// Interest an endpoint was registered with
    pub fn interest(&self, endpoint: EndpointRef) -> Option<Interest> {
        self.registrations.get(endpoint.0).map(|registration| registration.interest)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for ReadinessMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessMultiplexer")
            .field("capacity", &self.capacity)
            .field("registered", &self.registrations.len())
            .field("ready_count", &self.ready_count)
            .finish()
    }
}

/// Map a millisecond timeout onto what `poll(2)` accepts
fn clamp_timeout(timeout_ms: i64) -> i32 {
    if timeout_ms < 0 {
        -1
    } else {
        timeout_ms.min(i32::MAX as i64) as i32
    }
}
