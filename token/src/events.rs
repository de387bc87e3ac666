//! # Ledger Events
//!
//! Externally observable records of balance movements. The ledger hands each
//! event to an [`EventSink`] after the operation's mutations have been
//! applied; a failed operation records nothing.
//!
//! How events are encoded, stored, or delivered is the sink's business.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount};

/// A recorded ledger effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TokenEvent {
    /// Balance moved. `from` is `None` when the supply was minted at
    /// construction.
    #[serde(rename = "transfer")]
    Transfer {
        from: Option<Address>,
        to: Address,
        #[serde(with = "crate::types::amount_string")]
        amount: Amount,
    },
    /// An allowance was set.
    #[serde(rename = "approval")]
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "crate::types::amount_string")]
        amount: Amount,
    },
    /// Supply was destroyed.
    #[serde(rename = "burn")]
    Burn {
        #[serde(with = "crate::types::amount_string")]
        amount: Amount,
    },
}

/// Receiver of ledger events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &TokenEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &TokenEvent) {}
}

/// Keeps events in memory. Clones share the same buffer, so a test can hand
/// one clone to the service and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TokenEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<TokenEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<TokenEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &TokenEvent) {
        self.events.lock().push(event.clone());
    }
}
