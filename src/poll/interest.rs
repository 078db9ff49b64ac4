//! Interest masks and readiness snapshots

use std::{fmt, ops::BitOr};

use nix::poll::PollFlags;
use serde::Serialize;

/// Events a registration wants to be woken for
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interest(u8);

impl Interest {
    /// Data can be read
    pub const READABLE: Interest = Interest(0b01);
    /// Data can be written
    pub const WRITABLE: Interest = Interest(0b10);
    /// Both directions
    pub const BOTH: Interest = Interest(0b11);

    pub fn is_readable(self) -> bool {
        self.0 & Self::READABLE.0 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }

    pub(crate) fn poll_flags(self) -> PollFlags {
        let mut flags = PollFlags::empty();
        if self.is_readable() {
            flags |= PollFlags::POLLIN;
        }
        if self.is_writable() {
            flags |= PollFlags::POLLOUT;
        }
        flags
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Self) -> Self::Output {
        Interest(self.0 | rhs.0)
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => write!(f, "Interest(READABLE | WRITABLE)"),
            (true, false) => write!(f, "Interest(READABLE)"),
            (false, true) => write!(f, "Interest(WRITABLE)"),
            (false, false) => write!(f, "Interest(NONE)"),
        }
    }
}

/// One kind of readiness reported by a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// Readable (`POLLIN`)
    In,
    /// Writable (`POLLOUT`)
    Out,
    /// Error condition (`POLLERR`)
    Error,
    /// Peer hung up (`POLLHUP`)
    Hangup,
    /// Descriptor not open (`POLLNVAL`)
    Invalid,
}

impl EventKind {
    const fn bit(self) -> u8 {
        match self {
            EventKind::In => 1 << 0,
            EventKind::Out => 1 << 1,
            EventKind::Error => 1 << 2,
            EventKind::Hangup => 1 << 3,
            EventKind::Invalid => 1 << 4,
        }
    }
}

/// Events one registration reported in the last poll
///
/// Only meaningful until the next poll overwrites it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Readiness(u8);

impl Readiness {
    /// Nothing ready
    pub const EMPTY: Readiness = Readiness(0);

    pub(crate) fn from_poll_flags(flags: PollFlags) -> Self {
        let mut bits = 0;
        if flags.contains(PollFlags::POLLIN) {
            bits |= EventKind::In.bit();
        }
        if flags.contains(PollFlags::POLLOUT) {
            bits |= EventKind::Out.bit();
        }
        if flags.contains(PollFlags::POLLERR) {
            bits |= EventKind::Error.bit();
        }
        if flags.contains(PollFlags::POLLHUP) {
            bits |= EventKind::Hangup.bit();
        }
        if flags.contains(PollFlags::POLLNVAL) {
            bits |= EventKind::Invalid.bit();
        }
        Readiness(bits)
    }

    /// Whether `kind` was reported
    pub fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl From<EventKind> for Readiness {
    fn from(kind: EventKind) -> Self {
        Readiness(kind.bit())
    }
}
