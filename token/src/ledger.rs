//! # Account Ledger
//!
//! Balances, allowances and total supply. Every debit is checked against the
//! *available* balance (balance minus active locks), which the ledger asks
//! the [`LockBook`] for at the operation's instant.
//!
//! Each operation validates first and mutates last. New balances are
//! computed with checked arithmetic before any of them is written, so an
//! error leaves the ledger exactly as it was. Successful operations return
//! the [`TokenEvent`]s they produced; recording them is the caller's job.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::access::AccessGuard;
use crate::error::TokenError;
use crate::events::TokenEvent;
use crate::lock::LockBook;
use crate::types::{Address, Amount, Timestamp};

/// Owns balances, allowances, the total supply and the global pause flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    /// Balance per address. Absent means zero.
    #[serde(with = "amount_map")]
    balances: HashMap<Address, Amount>,
    /// `owner -> (spender -> allowance)`.
    allowances: HashMap<Address, AllowanceMap>,
    #[serde(with = "crate::types::amount_string")]
    total_supply: Amount,
    /// When set, `transfer` and `transfer_from` fail.
    paused: bool,
}

/// Allowances granted by one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct AllowanceMap(#[serde(with = "amount_map")] HashMap<Address, Amount>);

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Queries --------------------------------------------------------------

    /// Total balance of `account`, 0 if never seen.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// What `spender` may still move out of `owner`, 0 if unset.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.0.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Balance minus the part restricted at `now`.
    pub fn available_balance(&self, locks: &LockBook, account: &Address, now: Timestamp) -> Amount {
        locks.available_balance(account, now, self.balance_of(account))
    }

    /// Sum of every balance. Equals [`total_supply`](Self::total_supply) in
    /// every reachable state.
    pub fn sum_of_balances(&self) -> Amount {
        self.balances
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(*b))
    }

    /// Number of addresses with a balance record.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    // -- Checks ---------------------------------------------------------------

    pub fn ensure_not_paused(&self) -> Result<(), TokenError> {
        if self.paused {
            return Err(TokenError::TransferPaused);
        }
        Ok(())
    }

    /// Fails with [`TokenError::InsufficientFunds`] unless `amount` is
    /// spendable from `account` at `now`.
    pub fn ensure_available(
        &self,
        locks: &LockBook,
        account: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), TokenError> {
        let available = self.available_balance(locks, account, now);
        if amount > available {
            return Err(TokenError::InsufficientFunds {
                account: account.clone(),
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    fn ensure_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<Amount, TokenError> {
        let allowance = self.allowance(owner, spender);
        if amount > allowance {
            return Err(TokenError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowance,
                requested: amount,
            });
        }
        Ok(allowance)
    }

    // -- Mutations ------------------------------------------------------------

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        tracing::info!(paused, "transfer pause flag changed");
    }

    /// Creates supply. Only used while constructing the token.
    pub(crate) fn mint(&mut self, to: &Address, amount: Amount) -> Result<TokenEvent, TokenError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow("minting supply"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow("crediting minted supply"))?;
        self.total_supply = supply;
        self.balances.insert(to.clone(), balance);
        Ok(TokenEvent::Transfer {
            from: None,
            to: to.clone(),
            amount,
        })
    }

    /// Overwrites the allowance `spender` has over `owner`'s funds.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) -> TokenEvent {
        self.write_allowance(owner, spender, amount);
        tracing::debug!(owner = %owner, spender = %spender, amount = %amount, "allowance set");
        TokenEvent::Approval {
            owner: owner.clone(),
            spender: spender.clone(),
            amount,
        }
    }

    /// Raises an allowance by `delta`.
    ///
    /// # Errors
    ///
    /// [`TokenError::Overflow`] if the result does not fit.
    pub fn increase_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        delta: Amount,
    ) -> Result<TokenEvent, TokenError> {
        let updated = self
            .allowance(owner, spender)
            .checked_add(delta)
            .ok_or(TokenError::Overflow("increasing allowance"))?;
        Ok(self.approve(owner, spender, updated))
    }

    /// Lowers an allowance by `delta`, stopping at zero.
    pub fn decrease_allowance(&mut self, owner: &Address, spender: &Address, delta: Amount) -> TokenEvent {
        let updated = self.allowance(owner, spender).saturating_sub(delta);
        self.approve(owner, spender, updated)
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// [`TokenError::TransferPaused`] or [`TokenError::InsufficientFunds`].
    pub fn transfer(
        &mut self,
        locks: &LockBook,
        from: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<TokenEvent, TokenError> {
        self.ensure_not_paused()?;
        self.ensure_available(locks, from, amount, now)?;
        self.apply_move(from, to, amount)
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance. Returns the allowance update followed by the transfer.
    ///
    /// # Errors
    ///
    /// [`TokenError::TransferPaused`], [`TokenError::InsufficientAllowance`]
    /// or [`TokenError::InsufficientFunds`].
    pub fn transfer_from(
        &mut self,
        locks: &LockBook,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Vec<TokenEvent>, TokenError> {
        self.ensure_not_paused()?;
        let allowance = self.ensure_allowance(from, spender, amount)?;
        self.ensure_available(locks, from, amount, now)?;
        let (new_from, new_to) = self.plan_move(from, to, amount)?;

        let remaining = allowance - amount;
        self.write_allowance(from, spender, remaining);
        let transfer = self.commit_move(from, to, amount, new_from, new_to);
        Ok(vec![
            TokenEvent::Approval {
                owner: from.clone(),
                spender: spender.clone(),
                amount: remaining,
            },
            transfer,
        ])
    }

    /// Moves spendable funds regardless of the pause flag. Used by the
    /// privileged transfer paths.
    pub fn transfer_unpaused(
        &mut self,
        locks: &LockBook,
        from: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<TokenEvent, TokenError> {
        self.ensure_available(locks, from, amount, now)?;
        self.apply_move(from, to, amount)
    }

    /// Destroys `amount` of the caller's spendable balance. Owner only.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] or [`TokenError::InsufficientFunds`].
    pub fn burn(
        &mut self,
        guard: &AccessGuard,
        locks: &LockBook,
        caller: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<TokenEvent, TokenError> {
        guard.require_owner(caller)?;
        self.ensure_available(locks, caller, amount, now)?;

        let balance = self.balance_of(caller) - amount;
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(TokenError::Overflow("reducing supply"))?;
        self.balances.insert(caller.clone(), balance);
        self.total_supply = supply;

        tracing::debug!(account = %caller, amount = %amount, supply = %supply, "burned");
        Ok(TokenEvent::Burn { amount })
    }

    // -- Internals ------------------------------------------------------------

    /// Computes post-move balances without writing them.
    fn plan_move(&self, from: &Address, to: &Address, amount: Amount) -> Result<(Amount, Amount), TokenError> {
        let from_balance = self.balance_of(from);
        let new_from = from_balance
            .checked_sub(amount)
            .ok_or_else(|| TokenError::InsufficientFunds {
                account: from.clone(),
                available: from_balance,
                requested: amount,
            })?;
        if from == to {
            return Ok((from_balance, from_balance));
        }
        let new_to = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow("crediting recipient"))?;
        Ok((new_from, new_to))
    }

    fn commit_move(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        new_from: Amount,
        new_to: Amount,
    ) -> TokenEvent {
        self.balances.insert(from.clone(), new_from);
        self.balances.insert(to.clone(), new_to);
        tracing::debug!(from = %from, to = %to, amount = %amount, "transferred");
        TokenEvent::Transfer {
            from: Some(from.clone()),
            to: to.clone(),
            amount,
        }
    }

    fn apply_move(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<TokenEvent, TokenError> {
        let (new_from, new_to) = self.plan_move(from, to, amount)?;
        Ok(self.commit_move(from, to, amount, new_from, new_to))
    }

    fn write_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .0
            .insert(spender.clone(), amount);
    }
}

/// `HashMap<Address, Amount>` with amounts as decimal strings.
mod amount_map {
    use std::collections::HashMap;

    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::{parse_amount, Address, Amount};

    pub fn serialize<S: Serializer>(map: &HashMap<Address, Amount>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (address, amount) in map {
            out.serialize_entry(address, &amount.to_string())?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<Address, Amount>, D::Error> {
        let raw = HashMap::<Address, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(address, amount)| {
                parse_amount(&amount)
                    .map(|a| (address, a))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockAmount, LockRequest};
    use crate::types::LockKind;

    const NOW: Timestamp = 1_700_000_000;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn funded(account: &Address, amount: Amount) -> AccountLedger {
        let mut ledger = AccountLedger::new();
        ledger.mint(account, amount).unwrap();
        ledger
    }

    #[test]
    fn unknown_accounts_read_as_zero() {
        let ledger = AccountLedger::new();
        assert_eq!(ledger.balance_of(&addr("nobody")), 0);
        assert_eq!(ledger.allowance(&addr("a"), &addr("b")), 0);
    }

    #[test]
    fn scenario_a_spend_everything_then_fail() {
        let locks = LockBook::new();
        let (a, b) = (addr("a"), addr("b"));
        let mut ledger = funded(&a, 1000);

        ledger.transfer(&locks, &a, &b, 1000, NOW).unwrap();
        assert_eq!(ledger.balance_of(&a), 0);
        assert_eq!(ledger.balance_of(&b), 1000);

        let err = ledger.transfer(&locks, &a, &b, 1, NOW).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientFunds { available: 0, requested: 1, .. }));
    }

    #[test]
    fn self_and_zero_transfers_are_permitted() {
        let locks = LockBook::new();
        let a = addr("a");
        let mut ledger = funded(&a, 10);

        ledger.transfer(&locks, &a, &a, 10, NOW).unwrap();
        assert_eq!(ledger.balance_of(&a), 10);
        ledger.transfer(&locks, &a, &addr("b"), 0, NOW).unwrap();
        assert_eq!(ledger.balance_of(&a), 10);
        assert_eq!(ledger.sum_of_balances(), ledger.total_supply());
    }

    #[test]
    fn locked_funds_cannot_move() {
        let mut locks = LockBook::new();
        let a = addr("a");
        let mut ledger = funded(&a, 1000);
        locks
            .add_lock(
                &a,
                LockRequest::new(LockKind::Normal, NOW - 1, NOW + 100, LockAmount::Absolute(600)),
                NOW,
            )
            .unwrap();

        let err = ledger.transfer(&locks, &a, &addr("b"), 401, NOW).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientFunds { available: 400, .. }));
        assert_eq!(ledger.balance_of(&a), 1000);

        ledger.transfer(&locks, &a, &addr("b"), 400, NOW).unwrap();
        // After expiry the remainder is free again.
        ledger.transfer(&locks, &a, &addr("b"), 600, NOW + 101).unwrap();
        assert_eq!(ledger.balance_of(&a), 0);
    }

    #[test]
    fn pause_blocks_transfers_but_not_approvals() {
        let locks = LockBook::new();
        let (a, b) = (addr("a"), addr("b"));
        let mut ledger = funded(&a, 100);
        ledger.set_paused(true);

        assert_eq!(ledger.transfer(&locks, &a, &b, 1, NOW), Err(TokenError::TransferPaused));
        ledger.approve(&a, &b, 50);
        assert_eq!(
            ledger.transfer_from(&locks, &b, &a, &b, 1, NOW),
            Err(TokenError::TransferPaused)
        );
        assert_eq!(ledger.allowance(&a, &b), 50);

        // Privileged path ignores the flag.
        ledger.transfer_unpaused(&locks, &a, &b, 5, NOW).unwrap();
        assert_eq!(ledger.balance_of(&b), 5);
    }

    #[test]
    fn scenario_d_allowance_consumed() {
        let locks = LockBook::new();
        let (a, b, c) = (addr("a"), addr("b"), addr("c"));
        let mut ledger = funded(&a, 1000);

        ledger.approve(&a, &b, 300);
        let events = ledger.transfer_from(&locks, &b, &a, &c, 300, NOW).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(ledger.allowance(&a, &b), 0);
        assert_eq!(ledger.balance_of(&c), 300);

        let err = ledger.transfer_from(&locks, &b, &a, &c, 1, NOW).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { allowance: 0, requested: 1, .. }));
    }

    #[test]
    fn transfer_from_checks_funds_without_touching_allowance() {
        let locks = LockBook::new();
        let (a, b) = (addr("a"), addr("b"));
        let mut ledger = funded(&a, 10);
        ledger.approve(&a, &b, 100);

        let err = ledger.transfer_from(&locks, &b, &a, &b, 50, NOW).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientFunds { .. }));
        assert_eq!(ledger.allowance(&a, &b), 100);
        assert_eq!(ledger.balance_of(&a), 10);
    }

    #[test]
    fn approve_overwrites() {
        let mut ledger = AccountLedger::new();
        let (a, b) = (addr("a"), addr("b"));
        ledger.approve(&a, &b, 300);
        ledger.approve(&a, &b, 20);
        assert_eq!(ledger.allowance(&a, &b), 20);
    }

    #[test]
    fn allowance_deltas_floor_at_zero() {
        let mut ledger = AccountLedger::new();
        let (a, b) = (addr("a"), addr("b"));
        ledger.increase_allowance(&a, &b, 30).unwrap();
        ledger.increase_allowance(&a, &b, 20).unwrap();
        assert_eq!(ledger.allowance(&a, &b), 50);

        ledger.decrease_allowance(&a, &b, 80);
        assert_eq!(ledger.allowance(&a, &b), 0);

        ledger.approve(&a, &b, u128::MAX);
        assert!(matches!(
            ledger.increase_allowance(&a, &b, 1),
            Err(TokenError::Overflow(_))
        ));
    }

    #[test]
    fn burn_requires_owner_and_reduces_supply() {
        let locks = LockBook::new();
        let owner = addr("owner");
        let guard = AccessGuard::new(owner.clone(), addr("manager"));
        let mut ledger = funded(&owner, 1000);
        ledger.mint(&addr("m"), 10).unwrap();

        let err = ledger.burn(&guard, &locks, &addr("manager"), 1, NOW).unwrap_err();
        assert!(matches!(err, TokenError::Unauthorized { .. }));

        let event = ledger.burn(&guard, &locks, &owner, 250, NOW).unwrap();
        assert_eq!(event, TokenEvent::Burn { amount: 250 });
        assert_eq!(ledger.balance_of(&owner), 750);
        assert_eq!(ledger.total_supply(), 760);
        assert_eq!(ledger.sum_of_balances(), ledger.total_supply());

        assert!(matches!(
            ledger.burn(&guard, &locks, &owner, 751, NOW),
            Err(TokenError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn recipient_overflow_leaves_state_untouched() {
        let locks = LockBook::new();
        let (a, b) = (addr("a"), addr("b"));
        let mut ledger = AccountLedger::new();
        ledger.balances.insert(a.clone(), 10);
        ledger.balances.insert(b.clone(), u128::MAX);

        let err = ledger.transfer(&locks, &a, &b, 1, NOW).unwrap_err();
        assert!(matches!(err, TokenError::Overflow(_)));
        assert_eq!(ledger.balance_of(&a), 10);
        assert_eq!(ledger.balance_of(&b), u128::MAX);
    }

    #[test]
    fn ledger_snapshot_uses_string_amounts() {
        let mut ledger = funded(&addr("a"), 5);
        ledger.approve(&addr("a"), &addr("b"), 3);

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["balances"]["a"], "5");
        assert_eq!(json["allowances"]["a"]["b"], "3");
        assert_eq!(json["total_supply"], "5");

        let back: AccountLedger = serde_json::from_value(json).unwrap();
        assert_eq!(back, ledger);
    }
}
