//! # Host Context
//!
//! The ledger never reads the wall clock or decides who is calling. The host
//! supplies both once per operation through a [`CallContext`], and every lock
//! evaluation inside that operation uses the same instant.

use crate::types::{Address, Timestamp};

/// Identity and instant for a single top-level operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Who is invoking the operation.
    pub caller: Address,
    /// Evaluation instant, in Unix seconds.
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current time in Unix seconds.
    fn now(&self) -> Timestamp;

    /// Builds a [`CallContext`] for `caller` at the current instant.
    fn context(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.now())
    }
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
