//! # Error Taxonomy
//!
//! Every failure the ledger can report. Variants carry enough context to
//! explain themselves in a log line; [`ErrorKind`] collapses them into the
//! stable categories that callers (and the JSON-RPC gateway) branch on.
//!
//! Any error aborts the whole operation before the first mutation, so an
//! `Err` always means "nothing changed".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount, LockKind, Timestamp};

/// Errors produced by ledger, lock and service operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Malformed input: missing or negative amount, mismatched schedule
    /// arrays, duplicate lock key, and similar.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An address string failed structural validation.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// Checked arithmetic would have overflowed `u128`.
    #[error("arithmetic overflow while {0}")]
    Overflow(&'static str),

    /// The caller lacks the capability the operation requires.
    #[error("unauthorized: {caller} is not {required}")]
    Unauthorized {
        /// Identity that attempted the call.
        caller: Address,
        /// Human-readable capability name.
        required: &'static str,
    },

    /// The spendable balance does not cover the requested amount.
    #[error("insufficient funds: {account} has {available} available, requested {requested}")]
    InsufficientFunds {
        /// Account being debited.
        account: Address,
        /// Balance minus active locks at the evaluation instant.
        available: Amount,
        /// Amount the caller asked to move.
        requested: Amount,
    },

    /// The spender's allowance does not cover the requested amount.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}, requested {requested}")]
    InsufficientAllowance {
        /// Account whose funds would move.
        owner: Address,
        /// Account spending on the owner's behalf.
        spender: Address,
        /// Current allowance.
        allowance: Amount,
        /// Amount the spender asked to move.
        requested: Amount,
    },

    /// Percentage outside `1..=100`.
    #[error("percentage {0} is not in range 1..=100")]
    InvalidPercentage(u32),

    /// A lock's end instant is not strictly after the current instant.
    #[error("lock end {end} is not in the future (now {now})")]
    LockNotInFuture {
        /// Requested end instant.
        end: Timestamp,
        /// Evaluation instant of the operation.
        now: Timestamp,
    },

    /// The account already holds the maximum number of lock entries.
    #[error("lock capacity exceeded for {account}: limit is {capacity}")]
    CapacityExceeded {
        /// Account whose collection is full.
        account: Address,
        /// The per-account bound.
        capacity: usize,
    },

    /// An entry with the same `(kind, end)` key already exists.
    #[error("duplicate lock for {account}: a {kind} lock ending at {end} already exists")]
    DuplicateLock {
        /// Account holding the colliding entry.
        account: Address,
        /// Kind half of the key.
        kind: LockKind,
        /// End half of the key.
        end: Timestamp,
    },

    /// The account has no lock entries at all.
    #[error("no lock data for {0}")]
    NoLocks(Address),

    /// No entry matches the `(kind, end)` key.
    #[error("no {kind} lock ending at {end} for {account}")]
    LockNotFound {
        /// Account that was searched.
        account: Address,
        /// Kind half of the key.
        kind: LockKind,
        /// End half of the key.
        end: Timestamp,
    },

    /// Transfers are globally paused.
    #[error("transfers are paused")]
    TransferPaused,

    /// Bulk ownership transfer has been permanently disabled.
    #[error("owner transfer has been finished")]
    OwnershipTransferDisabled,

    /// The source address is exempt from ownership transfer.
    #[error("{0} is a protected address")]
    ProtectedAddress(Address),
}

/// Stable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    InsufficientFunds,
    InsufficientAllowance,
    InvalidPercentage,
    LockNotInFuture,
    CapacityExceeded,
    NotFound,
    TransferPaused,
    OwnershipTransferDisabled,
    ProtectedAddress,
}

impl TokenError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Validation(_)
            | TokenError::InvalidAddress(_)
            | TokenError::Overflow(_)
            | TokenError::DuplicateLock { .. } => ErrorKind::Validation,
            TokenError::Unauthorized { .. } => ErrorKind::Unauthorized,
            TokenError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TokenError::InsufficientAllowance { .. } => ErrorKind::InsufficientAllowance,
            TokenError::InvalidPercentage(_) => ErrorKind::InvalidPercentage,
            TokenError::LockNotInFuture { .. } => ErrorKind::LockNotInFuture,
            TokenError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            TokenError::NoLocks(_) | TokenError::LockNotFound { .. } => ErrorKind::NotFound,
            TokenError::TransferPaused => ErrorKind::TransferPaused,
            TokenError::OwnershipTransferDisabled => ErrorKind::OwnershipTransferDisabled,
            TokenError::ProtectedAddress(_) => ErrorKind::ProtectedAddress,
        }
    }
}

impl ErrorKind {
    /// JSON-RPC application error code. Application codes live in the
    /// `-32000..=-32099` server range.
    pub fn rpc_code(self) -> i32 {
        match self {
            ErrorKind::Validation => -32010,
            ErrorKind::Unauthorized => -32011,
            ErrorKind::InsufficientFunds => -32012,
            ErrorKind::InsufficientAllowance => -32013,
            ErrorKind::InvalidPercentage => -32014,
            ErrorKind::LockNotInFuture => -32015,
            ErrorKind::CapacityExceeded => -32016,
            ErrorKind::NotFound => -32017,
            ErrorKind::TransferPaused => -32018,
            ErrorKind::OwnershipTransferDisabled => -32019,
            ErrorKind::ProtectedAddress => -32020,
        }
    }
}
