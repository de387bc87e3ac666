//! # Token Service
//!
//! The public operation surface. Each method takes a [`CallContext`] from
//! the host, runs the access check it needs, validates everything against
//! the [`AccountLedger`] and [`LockBook`], mutates, and only then hands the
//! resulting events to the [`EventSink`].
//!
//! All persisted state lives in [`TokenState`], which serializes to JSON.
//! The service adds the event sink on top, so a snapshot can be restored
//! into a service wired to a different sink.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::access::AccessGuard;
use crate::clock::CallContext;
use crate::config::TokenConfig;
use crate::error::TokenError;
use crate::events::{EventSink, TokenEvent};
use crate::ledger::AccountLedger;
use crate::lock::{LockAmount, LockBook, LockRequest, LockState};
use crate::types::{Address, Amount, LockKind, Timestamp};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Name, symbol and precision. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// One percentage schedule for [`TokenService::add_lock_normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSchedule {
    pub start: Timestamp,
    pub end: Timestamp,
    pub percent: u32,
}

impl LockSchedule {
    /// Zips parallel start/end/percentage arrays.
    ///
    /// # Errors
    ///
    /// [`TokenError::Validation`] if the arrays differ in length.
    pub fn zip(starts: &[Timestamp], ends: &[Timestamp], percents: &[u32]) -> Result<Vec<Self>, TokenError> {
        if starts.len() != ends.len() || starts.len() != percents.len() {
            return Err(TokenError::Validation(format!(
                "schedule arrays differ in length: {} starts, {} ends, {} percentages",
                starts.len(),
                ends.len(),
                percents.len()
            )));
        }
        Ok(starts
            .iter()
            .zip(ends)
            .zip(percents)
            .map(|((&start, &end), &percent)| LockSchedule { start, end, percent })
            .collect())
    }
}

/// Everything the service persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub metadata: TokenMetadata,
    pub guard: AccessGuard,
    pub ledger: AccountLedger,
    pub locks: LockBook,
    /// Addresses exempt from [`TokenService::transfer_owner`].
    pub protected: HashSet<Address>,
    /// Only this address may call [`TokenService::transfer_reward`].
    pub grant_address: Address,
    /// Cleared for good by [`TokenService::finish_transfer_owner`].
    pub owner_transfer_enabled: bool,
}

// ---------------------------------------------------------------------------
// TokenService
// ---------------------------------------------------------------------------

/// Ledger + locks + roles, behind a single operation surface.
pub struct TokenService {
    state: TokenState,
    sink: Box<dyn EventSink>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Constructs a token from `config`.
    ///
    /// The full supply is minted to the owner, then each allocation is
    /// moved from the owner to its recipient and the recipient is marked
    /// protected. The owner keeps whatever is left.
    ///
    /// # Errors
    ///
    /// [`TokenError::Validation`] if the config is inconsistent.
    pub fn new(config: TokenConfig, sink: Box<dyn EventSink>) -> Result<Self, TokenError> {
        config.validate()?;
        let supply = config.total_supply()?;
        let scale = config.scale()?;

        let mut ledger = AccountLedger::new();
        let mut events = vec![ledger.mint(&config.owner, supply)?];
        let mut protected = HashSet::new();
        let locks = LockBook::new();
        for allocation in &config.allocations {
            let amount = Amount::from(allocation.amount)
                .checked_mul(scale)
                .ok_or(TokenError::Overflow("scaling allocation"))?;
            events.push(ledger.transfer_unpaused(&locks, &config.owner, &allocation.recipient, amount, 0)?);
            protected.insert(allocation.recipient.clone());
        }

        tracing::info!(
            name = %config.name,
            symbol = %config.symbol,
            supply = %supply,
            allocations = config.allocations.len(),
            "token constructed"
        );

        let service = Self {
            state: TokenState {
                metadata: TokenMetadata {
                    name: config.name,
                    symbol: config.symbol,
                    decimals: config.decimals,
                },
                guard: AccessGuard::new(config.owner.clone(), config.manager),
                ledger,
                locks,
                protected,
                grant_address: config.owner,
                owner_transfer_enabled: true,
            },
            sink,
        };
        service.emit(events);
        Ok(service)
    }

    /// Wraps previously persisted state.
    pub fn restore(state: TokenState, sink: Box<dyn EventSink>) -> Self {
        Self { state, sink }
    }

    /// Persistable state.
    pub fn state(&self) -> &TokenState {
        &self.state
    }

    pub fn into_state(self) -> TokenState {
        self.state
    }

    fn emit(&self, events: impl IntoIterator<Item = TokenEvent>) {
        for event in events {
            self.sink.record(&event);
        }
    }

    // -- Metadata -------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.state.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.state.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.state.metadata.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.state.ledger.total_supply()
    }

    pub fn owner(&self) -> &Address {
        self.state.guard.owner()
    }

    pub fn manager(&self) -> &Address {
        self.state.guard.manager()
    }

    // -- Balance queries ------------------------------------------------------

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.ledger.balance_of(account)
    }

    /// Spendable balance at `now`.
    pub fn available_balance_of(&self, account: &Address, now: Timestamp) -> Amount {
        self.state
            .ledger
            .available_balance(&self.state.locks, account, now)
    }

    /// Restricted balance at `now`.
    pub fn locked_balance_of(&self, account: &Address, now: Timestamp) -> Amount {
        self.state
            .locks
            .locked_balance_at(account, now, self.balance_of(account))
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.ledger.allowance(owner, spender)
    }

    // -- Transfers ------------------------------------------------------------

    pub fn transfer(&mut self, ctx: &CallContext, to: &Address, amount: Amount) -> Result<bool, TokenError> {
        let event = self
            .state
            .ledger
            .transfer(&self.state.locks, &ctx.caller, to, amount, ctx.now)?;
        self.emit([event]);
        Ok(true)
    }

    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, TokenError> {
        let events = self.state.ledger.transfer_from(
            &self.state.locks,
            &ctx.caller,
            from,
            to,
            amount,
            ctx.now,
        )?;
        self.emit(events);
        Ok(true)
    }

    pub fn approve(&mut self, ctx: &CallContext, spender: &Address, amount: Amount) -> Result<bool, TokenError> {
        let event = self.state.ledger.approve(&ctx.caller, spender, amount);
        self.emit([event]);
        Ok(true)
    }

    pub fn increase_allowance(
        &mut self,
        ctx: &CallContext,
        spender: &Address,
        delta: Amount,
    ) -> Result<bool, TokenError> {
        let event = self
            .state
            .ledger
            .increase_allowance(&ctx.caller, spender, delta)?;
        self.emit([event]);
        Ok(true)
    }

    pub fn decrease_allowance(
        &mut self,
        ctx: &CallContext,
        spender: &Address,
        delta: Amount,
    ) -> Result<bool, TokenError> {
        let event = self
            .state
            .ledger
            .decrease_allowance(&ctx.caller, spender, delta);
        self.emit([event]);
        Ok(true)
    }

    /// Owner-only burn from the caller's spendable balance.
    pub fn burn(&mut self, ctx: &CallContext, amount: Amount) -> Result<bool, TokenError> {
        let event = self.state.ledger.burn(
            &self.state.guard,
            &self.state.locks,
            &ctx.caller,
            amount,
            ctx.now,
        )?;
        self.emit([event]);
        Ok(true)
    }

    /// Owner moves funds between arbitrary accounts.
    ///
    /// Requires the owner capability, an enabled owner-transfer flag and an
    /// unprotected source. Ignores the pause flag but still respects the
    /// source's locks.
    pub fn transfer_owner(
        &mut self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, TokenError> {
        if !self.state.owner_transfer_enabled {
            return Err(TokenError::OwnershipTransferDisabled);
        }
        self.state.guard.require_owner(&ctx.caller)?;
        if self.state.protected.contains(from) {
            return Err(TokenError::ProtectedAddress(from.clone()));
        }
        let event = self
            .state
            .ledger
            .transfer_unpaused(&self.state.locks, from, to, amount, ctx.now)?;
        self.emit([event]);
        Ok(true)
    }

    /// Permanently disables [`transfer_owner`](Self::transfer_owner).
    pub fn finish_transfer_owner(&mut self, ctx: &CallContext) -> Result<bool, TokenError> {
        self.state.guard.require_owner(&ctx.caller)?;
        self.state.owner_transfer_enabled = false;
        tracing::info!("owner transfer permanently disabled");
        Ok(true)
    }

    pub fn is_owner_transfer_available(&self) -> bool {
        self.state.owner_transfer_enabled
    }

    /// Grant from the privileged-grant address: moves `amount` to `to` and
    /// vests it with a `RewardVesting` lock until `lock_end`.
    pub fn transfer_reward(
        &mut self,
        ctx: &CallContext,
        to: &Address,
        amount: Amount,
        lock_end: Timestamp,
    ) -> Result<bool, TokenError> {
        if ctx.caller != self.state.grant_address {
            tracing::warn!(caller = %ctx.caller, "reward grant from non-grant address");
            return Err(TokenError::Unauthorized {
                caller: ctx.caller.clone(),
                required: "the privileged-grant address",
            });
        }
        self.transfer_with_lock(ctx, to, amount, LockKind::RewardVesting, lock_end, false)
    }

    /// Owner or manager moves `amount` to `to` under a `Normal` lock until
    /// `lock_end`.
    pub fn transfer_locked(
        &mut self,
        ctx: &CallContext,
        to: &Address,
        amount: Amount,
        lock_end: Timestamp,
    ) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.transfer_with_lock(ctx, to, amount, LockKind::Normal, lock_end, true)
    }

    fn transfer_with_lock(
        &mut self,
        ctx: &CallContext,
        to: &Address,
        amount: Amount,
        kind: LockKind,
        lock_end: Timestamp,
        honour_pause: bool,
    ) -> Result<bool, TokenError> {
        let state = &mut self.state;
        if honour_pause {
            state.ledger.ensure_not_paused()?;
        }
        state
            .ledger
            .ensure_available(&state.locks, &ctx.caller, amount, ctx.now)?;
        let request = LockRequest::new(kind, ctx.now, lock_end, LockAmount::Absolute(amount));
        let lock = state.locks.check_add(to, request, ctx.now)?;

        let event = state
            .ledger
            .transfer_unpaused(&state.locks, &ctx.caller, to, amount, ctx.now)?;
        state.locks.insert(to, lock);
        self.emit([event]);
        Ok(true)
    }

    pub fn set_privileged_grant_address(&mut self, ctx: &CallContext, address: Address) -> Result<(), TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        tracing::info!(address = %address, "privileged grant address changed");
        self.state.grant_address = address;
        Ok(())
    }

    pub fn privileged_grant_address(&self) -> &Address {
        &self.state.grant_address
    }

    // -- Transfer pause -------------------------------------------------------

    pub fn stop_transfer(&mut self, ctx: &CallContext) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.ledger.set_paused(true);
        Ok(true)
    }

    pub fn start_transfer(&mut self, ctx: &CallContext) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.ledger.set_paused(false);
        Ok(true)
    }

    pub fn is_transfer_paused(&self) -> bool {
        self.state.ledger.is_paused()
    }

    // -- Protected addresses --------------------------------------------------

    pub fn set_protected_address(
        &mut self,
        ctx: &CallContext,
        address: &Address,
        protected: bool,
    ) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        if protected {
            self.state.protected.insert(address.clone());
        } else {
            self.state.protected.remove(address);
        }
        tracing::info!(address = %address, protected, "protected address updated");
        Ok(true)
    }

    pub fn is_protected_address(&self, address: &Address) -> bool {
        self.state.protected.contains(address)
    }

    // -- Locks ----------------------------------------------------------------

    /// Adds percentage locks on `target`. The base is `target`'s balance at
    /// this call and is frozen into each entry. All schedules are validated
    /// before any is stored.
    pub fn add_lock_normal(
        &mut self,
        ctx: &CallContext,
        target: &Address,
        schedules: &[LockSchedule],
    ) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        let base = self.balance_of(target);
        let requests: Vec<LockRequest> = schedules
            .iter()
            .map(|s| {
                LockRequest::new(
                    LockKind::Normal,
                    s.start,
                    s.end,
                    LockAmount::Percentage {
                        base,
                        percent: s.percent,
                    },
                )
            })
            .collect();
        self.state.locks.add_locks(target, &requests, ctx.now)?;
        Ok(true)
    }

    /// The caller stakes `amount` of their own spendable balance until `end`.
    pub fn add_lock_stake(&mut self, ctx: &CallContext, end: Timestamp, amount: Amount) -> Result<bool, TokenError> {
        self.state
            .ledger
            .ensure_available(&self.state.locks, &ctx.caller, amount, ctx.now)?;
        let request = LockRequest::new(
            LockKind::Stake,
            ctx.now,
            end,
            LockAmount::Absolute(amount),
        );
        self.state.locks.add_lock(&ctx.caller, request, ctx.now)?;
        Ok(true)
    }

    /// Removes the caller's stake ending at `end`.
    pub fn remove_lock_stake(&mut self, ctx: &CallContext, end: Timestamp) -> Result<bool, TokenError> {
        self.state
            .locks
            .remove_lock(LockKind::Stake, &ctx.caller, end)?;
        Ok(true)
    }

    /// Administrative removal of `target`'s `(kind, end)` entry.
    pub fn remove_lock(
        &mut self,
        ctx: &CallContext,
        kind: LockKind,
        target: &Address,
        end: Timestamp,
    ) -> Result<usize, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.locks.remove_lock(kind, target, end)
    }

    pub fn set_lock_amount(
        &mut self,
        ctx: &CallContext,
        kind: LockKind,
        target: &Address,
        end: Timestamp,
        amount: Amount,
    ) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.locks.set_lock_amount(kind, target, end, amount)?;
        Ok(true)
    }

    /// Sets the total-lock override on `target`.
    pub fn lock(&mut self, ctx: &CallContext, target: &Address) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.locks.set_total_lock(target, true);
        Ok(true)
    }

    /// Clears the total-lock override on `target`.
    pub fn unlock(&mut self, ctx: &CallContext, target: &Address) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.locks.set_total_lock(target, false);
        Ok(true)
    }

    pub fn is_total_locked(&self, account: &Address) -> bool {
        self.state.locks.is_total_locked(account)
    }

    pub fn set_tag(&mut self, ctx: &CallContext, target: &Address, tag: impl Into<String>) -> Result<bool, TokenError> {
        self.state.guard.require_owner_or_manager(&ctx.caller)?;
        self.state.locks.set_tag(target, tag);
        Ok(true)
    }

    pub fn tag(&self, account: &Address) -> &str {
        self.state.locks.tag(account)
    }

    pub fn lock_state(&self, account: &Address) -> LockState {
        self.state.locks.lock_state(account)
    }
}
