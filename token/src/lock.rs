//! # Lock Book
//!
//! Per-account transfer restrictions. An account can carry up to
//! [`MAX_LOCKS_PER_ACCOUNT`] time-bound lock entries, plus a total-lock
//! override and a free-text tag. The book answers one question for the
//! ledger: how much of a given balance is restricted at a given instant?
//!
//! ## Evaluation
//!
//! 1. If the override is set, the whole balance is restricted.
//! 2. Otherwise sum the amounts of every entry with `start <= now <= end`.
//! 3. Cap the sum at the balance.
//!
//! Entries are never deleted when their window closes. Expiry is a property
//! of the evaluation instant, so the same book gives different answers at
//! different times and nothing is cached.
//!
//! ## Keys
//!
//! An entry is addressed by `(kind, end)`. The book refuses to store two
//! entries with the same key on one account, which keeps removal and
//! amount updates unambiguous.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{MAX_LOCKS_PER_ACCOUNT, PERCENT_DENOMINATOR};
use crate::error::TokenError;
use crate::types::{Address, Amount, LockKind, Timestamp};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single time-bound restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLock {
    pub kind: LockKind,
    /// First instant (inclusive) at which the lock is active.
    pub start: Timestamp,
    /// Last instant (inclusive) at which the lock is active.
    pub end: Timestamp,
    /// Restricted amount while active.
    #[serde(with = "crate::types::amount_string")]
    pub amount: Amount,
}

impl TimeLock {
    /// Whether the lock restricts funds at `now`. Both bounds are inclusive.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.start <= now && now <= self.end
    }

    fn matches(&self, kind: LockKind, end: Timestamp) -> bool {
        self.kind == kind && self.end == end
    }
}

/// How the locked amount of a new entry is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAmount {
    /// `floor(base * percent / 100)`. `base` is captured when the lock is
    /// created and never re-evaluated.
    Percentage { base: Amount, percent: u32 },
    /// An exact amount.
    Absolute(Amount),
}

impl LockAmount {
    /// Resolves to a concrete amount.
    ///
    /// # Errors
    ///
    /// [`TokenError::InvalidPercentage`] unless `0 < percent <= 100`.
    pub fn resolve(self) -> Result<Amount, TokenError> {
        match self {
            LockAmount::Percentage { base, percent } => {
                if percent == 0 || percent > PERCENT_DENOMINATOR {
                    return Err(TokenError::InvalidPercentage(percent));
                }
                // Split on the denominator so the product never exceeds `base`.
                let percent = Amount::from(percent);
                let denominator = Amount::from(PERCENT_DENOMINATOR);
                Ok(base / denominator * percent + base % denominator * percent / denominator)
            }
            LockAmount::Absolute(amount) => Ok(amount),
        }
    }
}

/// A lock waiting to be added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub kind: LockKind,
    pub start: Timestamp,
    pub end: Timestamp,
    pub amount: LockAmount,
}

impl LockRequest {
    pub fn new(kind: LockKind, start: Timestamp, end: Timestamp, amount: LockAmount) -> Self {
        Self {
            kind,
            start,
            end,
            amount,
        }
    }
}

/// Account-level lock metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct AccountFlags {
    total_locked: bool,
    tag: String,
}

/// Diagnostic view of one account's lock data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub total_locked: bool,
    pub tag: String,
    pub locks: Vec<TimeLock>,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{userInfo:{{totalLocked:{},tag:{}}},locks:[",
            self.total_locked, self.tag
        )?;
        for (i, lock) in self.locks.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(
                f,
                "{{lockType:{},startTime:{},endTime:{},lockedBalance:{}}}",
                lock.kind.code(),
                lock.start,
                lock.end,
                lock.amount
            )?;
        }
        f.write_str("]}")
    }
}

// ---------------------------------------------------------------------------
// LockBook
// ---------------------------------------------------------------------------

/// Owns every account's lock entries, override flags and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockBook {
    /// Entries per account, in insertion order.
    locks: HashMap<Address, Vec<TimeLock>>,
    /// Override flag and tag per account.
    flags: HashMap<Address, AccountFlags>,
    /// Maximum entries per account.
    capacity: usize,
}

impl LockBook {
    /// An empty book with the standard capacity bound.
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOCKS_PER_ACCOUNT)
    }

    /// An empty book with a custom capacity bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            locks: HashMap::new(),
            flags: HashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries for `account` in insertion order. Empty if none.
    pub fn locks(&self, account: &Address) -> &[TimeLock] {
        self.locks.get(account).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lock_count(&self, account: &Address) -> usize {
        self.locks(account).len()
    }

    // -- Validation -----------------------------------------------------------

    /// Validates a request against the current book and resolves its amount.
    ///
    /// Checks, in order: percentage range, future end, key uniqueness.
    /// Capacity is checked separately by [`ensure_room`](Self::ensure_room)
    /// so that batches can reserve space for all their entries at once.
    pub fn prepare(
        &self,
        account: &Address,
        request: LockRequest,
        now: Timestamp,
    ) -> Result<TimeLock, TokenError> {
        let amount = request.amount.resolve()?;
        if request.end <= now {
            return Err(TokenError::LockNotInFuture {
                end: request.end,
                now,
            });
        }
        if self
            .locks(account)
            .iter()
            .any(|l| l.matches(request.kind, request.end))
        {
            return Err(TokenError::DuplicateLock {
                account: account.clone(),
                kind: request.kind,
                end: request.end,
            });
        }
        Ok(TimeLock {
            kind: request.kind,
            start: request.start,
            end: request.end,
            amount,
        })
    }

    /// Fails with [`TokenError::CapacityExceeded`] unless `additional` more
    /// entries fit on `account`.
    pub fn ensure_room(&self, account: &Address, additional: usize) -> Result<(), TokenError> {
        let current = self.lock_count(account);
        if current.saturating_add(additional) > self.capacity {
            return Err(TokenError::CapacityExceeded {
                account: account.clone(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Validates everything [`add_lock`](Self::add_lock) would check without
    /// storing anything. Returns the entry that would be stored.
    pub fn check_add(
        &self,
        account: &Address,
        request: LockRequest,
        now: Timestamp,
    ) -> Result<TimeLock, TokenError> {
        let lock = self.prepare(account, request, now)?;
        self.ensure_room(account, 1)?;
        Ok(lock)
    }

    // -- Mutation -------------------------------------------------------------

    /// Appends a lock entry. Returns the locked amount.
    ///
    /// # Errors
    ///
    /// [`TokenError::InvalidPercentage`], [`TokenError::LockNotInFuture`],
    /// [`TokenError::DuplicateLock`] or [`TokenError::CapacityExceeded`].
    /// Nothing is stored on error.
    pub fn add_lock(
        &mut self,
        account: &Address,
        request: LockRequest,
        now: Timestamp,
    ) -> Result<Amount, TokenError> {
        let lock = self.check_add(account, request, now)?;
        let amount = lock.amount;
        self.insert(account, lock);
        Ok(amount)
    }

    /// Appends several entries atomically: either all are stored or none.
    ///
    /// Keys must be unique among the batch as well as against existing
    /// entries, and the account must have room for the whole batch.
    pub fn add_locks(
        &mut self,
        account: &Address,
        requests: &[LockRequest],
        now: Timestamp,
    ) -> Result<Vec<Amount>, TokenError> {
        let mut prepared: Vec<TimeLock> = Vec::with_capacity(requests.len());
        for request in requests {
            let lock = self.prepare(account, *request, now)?;
            if prepared.iter().any(|p| p.matches(lock.kind, lock.end)) {
                return Err(TokenError::DuplicateLock {
                    account: account.clone(),
                    kind: lock.kind,
                    end: lock.end,
                });
            }
            prepared.push(lock);
        }
        self.ensure_room(account, prepared.len())?;

        let amounts = prepared.iter().map(|l| l.amount).collect();
        for lock in prepared {
            self.insert(account, lock);
        }
        Ok(amounts)
    }

    /// Stores an already validated entry.
    pub(crate) fn insert(&mut self, account: &Address, lock: TimeLock) {
        tracing::debug!(
            account = %account,
            kind = %lock.kind,
            start = lock.start,
            end = lock.end,
            amount = %lock.amount,
            "lock added"
        );
        self.locks.entry(account.clone()).or_default().push(lock);
    }

    /// Removes the entry matching `(kind, end)`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// [`TokenError::NoLocks`] if the account has no entries, and
    /// [`TokenError::LockNotFound`] if none match. Zero matches is a failure,
    /// never a silent no-op.
    pub fn remove_lock(
        &mut self,
        kind: LockKind,
        account: &Address,
        end: Timestamp,
    ) -> Result<usize, TokenError> {
        let entries = match self.locks.get_mut(account) {
            Some(entries) if !entries.is_empty() => entries,
            _ => return Err(TokenError::NoLocks(account.clone())),
        };

        let before = entries.len();
        entries.retain(|l| !l.matches(kind, end));
        let removed = before - entries.len();
        if removed == 0 {
            return Err(TokenError::LockNotFound {
                account: account.clone(),
                kind,
                end,
            });
        }
        if entries.is_empty() {
            self.locks.remove(account);
        }

        tracing::debug!(account = %account, kind = %kind, end, removed, "lock removed");
        Ok(removed)
    }

    /// Overwrites the amount of the entry matching `(kind, end)`. Returns the
    /// previous amount.
    pub fn set_lock_amount(
        &mut self,
        kind: LockKind,
        account: &Address,
        end: Timestamp,
        amount: Amount,
    ) -> Result<Amount, TokenError> {
        let entries = match self.locks.get_mut(account) {
            Some(entries) if !entries.is_empty() => entries,
            _ => return Err(TokenError::NoLocks(account.clone())),
        };
        let lock = entries
            .iter_mut()
            .find(|l| l.matches(kind, end))
            .ok_or_else(|| TokenError::LockNotFound {
                account: account.clone(),
                kind,
                end,
            })?;

        let previous = std::mem::replace(&mut lock.amount, amount);
        tracing::debug!(account = %account, kind = %kind, end, %previous, new = %amount, "lock amount updated");
        Ok(previous)
    }

    /// Sets or clears the total-lock override.
    pub fn set_total_lock(&mut self, account: &Address, locked: bool) {
        self.flags.entry(account.clone()).or_default().total_locked = locked;
        tracing::debug!(account = %account, locked, "total lock override changed");
    }

    pub fn is_total_locked(&self, account: &Address) -> bool {
        self.flags
            .get(account)
            .map(|f| f.total_locked)
            .unwrap_or(false)
    }

    pub fn set_tag(&mut self, account: &Address, tag: impl Into<String>) {
        self.flags.entry(account.clone()).or_default().tag = tag.into();
    }

    /// The account's tag, or `""` if never set.
    pub fn tag(&self, account: &Address) -> &str {
        self.flags.get(account).map(|f| f.tag.as_str()).unwrap_or("")
    }

    // -- Evaluation -----------------------------------------------------------

    /// Restricted part of `balance` at `now`. Never exceeds `balance`.
    pub fn locked_balance_at(&self, account: &Address, now: Timestamp, balance: Amount) -> Amount {
        if self.is_total_locked(account) {
            return balance;
        }
        let locked = self
            .locks(account)
            .iter()
            .filter(|l| l.is_active_at(now))
            .fold(0u128, |acc, l| acc.saturating_add(l.amount));
        locked.min(balance)
    }

    /// Spendable part of `balance` at `now`.
    pub fn available_balance(&self, account: &Address, now: Timestamp, balance: Amount) -> Amount {
        balance - self.locked_balance_at(account, now, balance)
    }

    /// Diagnostic snapshot of one account.
    pub fn lock_state(&self, account: &Address) -> LockState {
        LockState {
            total_locked: self.is_total_locked(account),
            tag: self.tag(account).to_string(),
            locks: self.locks(account).to_vec(),
        }
    }
}

impl Default for LockBook {
    fn default() -> Self {
        Self::new()
    }
}
