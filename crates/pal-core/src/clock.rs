//! # Clock Abstraction
//!
//! Time is an injected dependency. The ledger stamps stage events from its
//! clock and the engine derives manufacturing/expiry instants from its clock,
//! so tests pin both with [`FixedClock`] or step them with [`ManualClock`].

use parking_lot::Mutex;

use crate::temporal::Timestamp;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant, truncated to seconds.
    fn now(&self) -> Timestamp;
}

/// System clock backed by the real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Fixed clock for testing that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Test clock that can be moved forward or backward explicitly.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Set the clock to an arbitrary instant (may go backwards).
    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
