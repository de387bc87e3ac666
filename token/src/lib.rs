// Copyright (c) 2026 Hena Token Developers. MIT License.
// See LICENSE for details.

//! # Hena Token Core Library
//!
//! A fungible-token ledger with a time-lock engine layered on top. Accounts
//! hold balances and allowances; any part of a balance can be restricted
//! for a window of time, or all of it indefinitely, without touching the
//! balance itself. What an account may spend is always computed fresh from
//! the balance, the lock entries and the instant of the call.
//!
//! ## Architecture
//!
//! - **types**: Addresses, amounts, instants, lock kinds.
//! - **error**: One error enum for every failure the ledger can report.
//! - **access**: Owner and owner-or-manager capability checks.
//! - **lock**: The lock book: entries, overrides, tags, evaluation.
//! - **ledger**: Balances, allowances, transfers and burns.
//! - **service**: The public operation surface tying it all together.
//! - **events**: Transfer, approval and burn records, plus sinks.
//! - **clock**: Caller identity and the current instant, from the host.
//! - **config**: Constants and the construction parameters.
//!
//! ## Ground rules
//!
//! 1. Every check runs before the first mutation. A failed call changes nothing.
//! 2. Amounts are unsigned and every addition or multiplication is checked.
//! 3. Events are recorded after the state change, never before.

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lock;
pub mod service;
pub mod types;

pub use access::AccessGuard;
pub use clock::{CallContext, Clock, FixedClock, SystemClock};
pub use config::TokenConfig;
pub use error::{ErrorKind, TokenError};
pub use events::{EventSink, NullSink, RecordingSink, TokenEvent};
pub use ledger::AccountLedger;
pub use lock::{LockAmount, LockBook, LockRequest, LockState, TimeLock};
pub use service::{LockSchedule, TokenMetadata, TokenService, TokenState};
pub use types::{Address, Amount, LockKind, Timestamp};
