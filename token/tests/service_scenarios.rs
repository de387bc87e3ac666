//! End-to-end tests for the token service.
//!
//! Every test builds its own service from a small genesis config and drives
//! it through the public operation surface only, the way a host would. The
//! supply invariant is re-checked after each scenario.

use hena_token::config::TokenConfig;
use hena_token::error::{ErrorKind, TokenError};
use hena_token::events::{RecordingSink, TokenEvent};
use hena_token::service::{LockSchedule, TokenService, TokenState};
use hena_token::types::{Address, Amount, LockKind, Timestamp};
use hena_token::CallContext;

const T0: Timestamp = 1_700_000_000;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn addr(s: &str) -> Address {
    Address::new(s).expect("valid address")
}

fn at(caller: &str, now: Timestamp) -> CallContext {
    CallContext::new(addr(caller), now)
}

fn ctx(caller: &str) -> CallContext {
    at(caller, T0)
}

/// 1_000_000 whole units, no decimals. `reserve` gets a protected
/// allocation of 100_000.
fn service() -> (TokenService, RecordingSink) {
    let mut cfg = TokenConfig::new("Hena", "HENA", addr("owner"), addr("manager"));
    cfg.decimals = 0;
    cfg.initial_supply = 1_000_000;
    let cfg = cfg.with_allocation(addr("reserve"), 100_000);
    let sink = RecordingSink::new();
    let svc = TokenService::new(cfg, Box::new(sink.clone())).expect("genesis");
    sink.drain();
    (svc, sink)
}

/// Funds `who` from the owner.
fn fund(svc: &mut TokenService, who: &str, amount: Amount) {
    svc.transfer(&ctx("owner"), &addr(who), amount).expect("funding transfer");
}

fn assert_supply_conserved(svc: &TokenService) {
    assert_eq!(svc.state().ledger.sum_of_balances(), svc.total_supply());
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn genesis_scales_supply_by_decimals() {
    let cfg = TokenConfig::new("Hena", "HENA", addr("owner"), addr("manager"))
        .with_allocation(addr("team"), 10);
    let svc = TokenService::new(cfg, Box::new(RecordingSink::new())).unwrap();

    assert_eq!(svc.decimals(), 8);
    assert_eq!(svc.total_supply(), 1_000_000_000u128 * 100_000_000);
    assert_eq!(svc.balance_of(&addr("team")), 10 * 100_000_000);
    assert_eq!(
        svc.balance_of(&addr("owner")),
        svc.total_supply() - 10 * 100_000_000
    );
    assert_supply_conserved(&svc);
}

#[test]
fn genesis_rejects_over_allocation() {
    let mut cfg = TokenConfig::new("Hena", "HENA", addr("owner"), addr("manager"));
    cfg.initial_supply = 5;
    let cfg = cfg.with_allocation(addr("a"), 3).with_allocation(addr("b"), 3);
    let err = TokenService::new(cfg, Box::new(RecordingSink::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn genesis_records_mint_then_allocations() {
    let mut cfg = TokenConfig::new("Hena", "HENA", addr("owner"), addr("manager"));
    cfg.decimals = 0;
    cfg.initial_supply = 100;
    let cfg = cfg.with_allocation(addr("team"), 40);
    let sink = RecordingSink::new();
    TokenService::new(cfg, Box::new(sink.clone())).unwrap();

    assert_eq!(
        sink.events(),
        vec![
            TokenEvent::Transfer {
                from: None,
                to: addr("owner"),
                amount: 100
            },
            TokenEvent::Transfer {
                from: Some(addr("owner")),
                to: addr("team"),
                amount: 40
            },
        ]
    );
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_exact_balance_then_one_more() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);

    assert!(svc.transfer(&ctx("alice"), &addr("bob"), 1000).unwrap());
    let err = svc.transfer(&ctx("alice"), &addr("bob"), 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(svc.balance_of(&addr("bob")), 1000);
    assert_supply_conserved(&svc);
}

#[test]
fn scenario_b_percentage_lock_expires() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);

    let schedules = LockSchedule::zip(&[T0 - 10], &[T0 + 100], &[50]).unwrap();
    svc.add_lock_normal(&ctx("manager"), &addr("alice"), &schedules)
        .unwrap();

    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 500);
    assert_eq!(svc.locked_balance_of(&addr("alice"), T0), 500);
    assert_eq!(svc.available_balance_of(&addr("alice"), T0 + 100), 500);
    assert_eq!(svc.available_balance_of(&addr("alice"), T0 + 101), 1000);

    let err = svc
        .transfer(&at("alice", T0), &addr("bob"), 501)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    svc.transfer(&at("alice", T0 + 101), &addr("bob"), 1000)
        .unwrap();
}

#[test]
fn scenario_c_total_lock_override() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 500);

    svc.lock(&ctx("owner"), &addr("alice")).unwrap();
    assert!(svc.is_total_locked(&addr("alice")));
    for t in [0, T0, T0 + 1_000_000] {
        assert_eq!(svc.available_balance_of(&addr("alice"), t), 0);
    }

    svc.unlock(&ctx("manager"), &addr("alice")).unwrap();
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 500);
}

#[test]
fn scenario_d_allowance_spent_down() {
    let (mut svc, sink) = service();
    fund(&mut svc, "alice", 1000);
    sink.drain();

    svc.approve(&ctx("alice"), &addr("bob"), 300).unwrap();
    svc.transfer_from(&ctx("bob"), &addr("alice"), &addr("carol"), 300)
        .unwrap();
    let err = svc
        .transfer_from(&ctx("bob"), &addr("alice"), &addr("carol"), 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientAllowance);

    assert_eq!(svc.balance_of(&addr("carol")), 300);
    assert_eq!(svc.allowance(&addr("alice"), &addr("bob")), 0);

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], TokenEvent::Approval { amount: 300, .. }));
    assert!(matches!(events[1], TokenEvent::Approval { amount: 0, .. }));
    assert!(matches!(events[2], TokenEvent::Transfer { amount: 300, .. }));
}

#[test]
fn scenario_e_capacity_bound() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);

    let ends: Vec<Timestamp> = (1..=100).map(|i| T0 + i).collect();
    let starts = vec![T0; 100];
    let pcts = vec![1; 100];
    let schedules = LockSchedule::zip(&starts, &ends, &pcts).unwrap();
    svc.add_lock_normal(&ctx("owner"), &addr("alice"), &schedules)
        .unwrap();
    assert_eq!(svc.lock_state(&addr("alice")).locks.len(), 100);

    let extra = LockSchedule::zip(&[T0], &[T0 + 500], &[1]).unwrap();
    let err = svc
        .add_lock_normal(&ctx("owner"), &addr("alice"), &extra)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert_eq!(svc.lock_state(&addr("alice")).locks.len(), 100);
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

#[test]
fn percentage_basis_is_frozen_at_creation() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    let schedules = LockSchedule::zip(&[T0], &[T0 + 100], &[50]).unwrap();
    svc.add_lock_normal(&ctx("owner"), &addr("alice"), &schedules)
        .unwrap();

    // Doubling the balance does not double the locked amount.
    fund(&mut svc, "alice", 1000);
    assert_eq!(svc.locked_balance_of(&addr("alice"), T0), 500);
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 1500);
}

#[test]
fn batch_with_bad_percentage_stores_nothing() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    let schedules = LockSchedule::zip(&[T0, T0], &[T0 + 10, T0 + 20], &[50, 101]).unwrap();
    let err = svc
        .add_lock_normal(&ctx("owner"), &addr("alice"), &schedules)
        .unwrap_err();
    assert_eq!(err, TokenError::InvalidPercentage(101));
    assert!(svc.lock_state(&addr("alice")).locks.is_empty());
}

#[test]
fn stake_round_trip() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);

    svc.add_lock_stake(&ctx("alice"), T0 + 60, 400).unwrap();
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 600);

    let err = svc.add_lock_stake(&ctx("alice"), T0 + 90, 601).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    svc.remove_lock_stake(&ctx("alice"), T0 + 60).unwrap();
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 1000);

    let err = svc.remove_lock_stake(&ctx("alice"), T0 + 60).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn stake_removal_ignores_other_kinds() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    let schedules = LockSchedule::zip(&[T0], &[T0 + 60], &[10]).unwrap();
    svc.add_lock_normal(&ctx("owner"), &addr("alice"), &schedules)
        .unwrap();

    let err = svc.remove_lock_stake(&ctx("alice"), T0 + 60).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(svc.lock_state(&addr("alice")).locks.len(), 1);
}

#[test]
fn locks_on_a_near_max_supply_resolve_exactly() {
    let mut cfg = TokenConfig::new("Hena", "HENA", addr("owner"), addr("manager"));
    cfg.decimals = 20;
    cfg.initial_supply = 1_000_000_000_000_000_000;
    let mut svc = TokenService::new(cfg, Box::new(RecordingSink::new())).unwrap();
    let supply: Amount = 10u128.pow(38);
    assert_eq!(svc.balance_of(&addr("owner")), supply);

    svc.add_lock_stake(&ctx("owner"), T0 + 10, supply / 10).unwrap();
    let schedules = LockSchedule::zip(&[T0], &[T0 + 60], &[50]).unwrap();
    svc.add_lock_normal(&ctx("manager"), &addr("owner"), &schedules)
        .unwrap();

    let locks = svc.lock_state(&addr("owner")).locks;
    assert_eq!(locks.len(), 2);
    assert_eq!(svc.locked_balance_of(&addr("owner"), T0), supply / 10 + supply / 2);
    assert_eq!(svc.available_balance_of(&addr("owner"), T0), supply / 10 * 4);
    assert_supply_conserved(&svc);
}

#[test]
fn admin_lock_management_is_gated() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    let schedules = LockSchedule::zip(&[T0], &[T0 + 60], &[10]).unwrap();

    let denied = [
        svc.add_lock_normal(&ctx("alice"), &addr("alice"), &schedules)
            .map(|_| ()),
        svc.lock(&ctx("alice"), &addr("alice")).map(|_| ()),
        svc.set_tag(&ctx("alice"), &addr("alice"), "vip").map(|_| ()),
        svc.stop_transfer(&ctx("alice")).map(|_| ()),
        svc.set_privileged_grant_address(&ctx("alice"), addr("alice")),
        svc.set_protected_address(&ctx("alice"), &addr("bob"), true)
            .map(|_| ()),
    ];
    for result in denied {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    svc.add_lock_normal(&ctx("manager"), &addr("alice"), &schedules)
        .unwrap();
    svc.set_lock_amount(&ctx("manager"), LockKind::Normal, &addr("alice"), T0 + 60, 700)
        .unwrap();
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 300);
    assert_eq!(
        svc.remove_lock(&ctx("owner"), LockKind::Normal, &addr("alice"), T0 + 60)
            .unwrap(),
        1
    );
}

#[test]
fn tags_and_lock_state_diagnostics() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    svc.set_tag(&ctx("manager"), &addr("alice"), "advisor").unwrap();
    svc.add_lock_stake(&ctx("alice"), T0 + 5, 10).unwrap();

    assert_eq!(svc.tag(&addr("alice")), "advisor");
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 990);
    assert_eq!(
        svc.lock_state(&addr("alice")).to_string(),
        format!(
            "{{userInfo:{{totalLocked:false,tag:advisor}},locks:[{{lockType:2,startTime:{},endTime:{},lockedBalance:10}}]}}",
            T0,
            T0 + 5
        )
    );
}

// ---------------------------------------------------------------------------
// Pause, burn, owner transfer, grants
// ---------------------------------------------------------------------------

#[test]
fn pause_blocks_transfers_only() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 100);
    svc.stop_transfer(&ctx("manager")).unwrap();
    assert!(svc.is_transfer_paused());

    let err = svc.transfer(&ctx("alice"), &addr("bob"), 1).unwrap_err();
    assert_eq!(err, TokenError::TransferPaused);
    svc.approve(&ctx("alice"), &addr("bob"), 10).unwrap();
    let err = svc
        .transfer_from(&ctx("bob"), &addr("alice"), &addr("bob"), 1)
        .unwrap_err();
    assert_eq!(err, TokenError::TransferPaused);

    // Owner sweep is not subject to the pause.
    svc.transfer_owner(&ctx("owner"), &addr("alice"), &addr("bob"), 50)
        .unwrap();

    svc.start_transfer(&ctx("owner")).unwrap();
    svc.transfer(&ctx("alice"), &addr("bob"), 50).unwrap();
    assert_eq!(svc.balance_of(&addr("bob")), 100);
}

#[test]
fn burn_reduces_supply_in_lockstep() {
    let (mut svc, sink) = service();
    let supply = svc.total_supply();

    let err = svc.burn(&ctx("manager"), 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    svc.burn(&ctx("owner"), 1234).unwrap();
    assert_eq!(svc.total_supply(), supply - 1234);
    assert_supply_conserved(&svc);
    assert_eq!(sink.events(), vec![TokenEvent::Burn { amount: 1234 }]);
}

#[test]
fn owner_transfer_respects_protection_and_finish() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 100);

    let err = svc
        .transfer_owner(&ctx("owner"), &addr("reserve"), &addr("owner"), 1)
        .unwrap_err();
    assert_eq!(err, TokenError::ProtectedAddress(addr("reserve")));

    let err = svc
        .transfer_owner(&ctx("manager"), &addr("alice"), &addr("owner"), 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    svc.set_protected_address(&ctx("manager"), &addr("reserve"), false)
        .unwrap();
    svc.transfer_owner(&ctx("owner"), &addr("reserve"), &addr("owner"), 1)
        .unwrap();

    assert!(svc.is_owner_transfer_available());
    svc.finish_transfer_owner(&ctx("owner")).unwrap();
    assert!(!svc.is_owner_transfer_available());
    let err = svc
        .transfer_owner(&ctx("owner"), &addr("alice"), &addr("owner"), 1)
        .unwrap_err();
    assert_eq!(err, TokenError::OwnershipTransferDisabled);
    assert_supply_conserved(&svc);
}

#[test]
fn owner_transfer_respects_locks() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 100);
    svc.lock(&ctx("owner"), &addr("alice")).unwrap();
    let err = svc
        .transfer_owner(&ctx("owner"), &addr("alice"), &addr("owner"), 1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
}

#[test]
fn reward_grant_vests_on_recipient() {
    let (mut svc, _) = service();
    svc.set_privileged_grant_address(&ctx("manager"), addr("rewards"))
        .unwrap();
    fund(&mut svc, "rewards", 10_000);

    let err = svc
        .transfer_reward(&ctx("owner"), &addr("alice"), 100, T0 + 30)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    svc.transfer_reward(&ctx("rewards"), &addr("alice"), 100, T0 + 30)
        .unwrap();
    assert_eq!(svc.balance_of(&addr("alice")), 100);
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 0);
    assert_eq!(svc.available_balance_of(&addr("alice"), T0 + 31), 100);
    assert_eq!(
        svc.lock_state(&addr("alice")).locks[0].kind,
        LockKind::RewardVesting
    );

    // Same (kind, end) again is a duplicate; nothing moves.
    let err = svc
        .transfer_reward(&ctx("rewards"), &addr("alice"), 100, T0 + 30)
        .unwrap_err();
    assert!(matches!(err, TokenError::DuplicateLock { .. }));
    assert_eq!(svc.balance_of(&addr("alice")), 100);
}

#[test]
fn locked_transfer_is_gated_and_pausable() {
    let (mut svc, _) = service();
    let err = svc
        .transfer_locked(&ctx("manager"), &addr("alice"), 1, T0 + 30)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    fund(&mut svc, "manager", 500);

    svc.transfer_locked(&ctx("manager"), &addr("alice"), 200, T0 + 30)
        .unwrap();
    assert_eq!(svc.available_balance_of(&addr("alice"), T0), 0);

    svc.stop_transfer(&ctx("owner")).unwrap();
    let err = svc
        .transfer_locked(&ctx("manager"), &addr("bob"), 200, T0 + 30)
        .unwrap_err();
    assert_eq!(err, TokenError::TransferPaused);

    let err = svc
        .transfer_locked(&ctx("alice"), &addr("bob"), 1, T0 + 30)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn overlapping_locks_never_exceed_balance() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    let schedules =
        LockSchedule::zip(&[T0, T0, T0], &[T0 + 10, T0 + 20, T0 + 30], &[80, 80, 80]).unwrap();
    svc.add_lock_normal(&ctx("owner"), &addr("alice"), &schedules)
        .unwrap();

    for t in [T0 - 1, T0, T0 + 10, T0 + 25, T0 + 31] {
        let locked = svc.locked_balance_of(&addr("alice"), t);
        let available = svc.available_balance_of(&addr("alice"), t);
        assert!(locked <= svc.balance_of(&addr("alice")));
        assert_eq!(locked + available, svc.balance_of(&addr("alice")));
    }
}

#[test]
fn failed_calls_leave_state_and_events_untouched() {
    let (mut svc, sink) = service();
    fund(&mut svc, "alice", 100);
    sink.drain();
    let before = svc.state().clone();

    let _ = svc.transfer(&ctx("alice"), &addr("bob"), 101);
    let _ = svc.transfer_from(&ctx("bob"), &addr("alice"), &addr("bob"), 1);
    let _ = svc.burn(&ctx("alice"), 1);
    let _ = svc.add_lock_stake(&ctx("alice"), T0, 10);
    let _ = svc.transfer_owner(&ctx("owner"), &addr("alice"), &addr("bob"), 101);

    assert_eq!(svc.state(), &before);
    assert!(sink.is_empty());
}

#[test]
fn state_survives_json_snapshot() {
    let (mut svc, _) = service();
    fund(&mut svc, "alice", 1000);
    svc.approve(&ctx("alice"), &addr("bob"), 5).unwrap();
    svc.add_lock_stake(&ctx("alice"), T0 + 60, 400).unwrap();
    svc.set_tag(&ctx("owner"), &addr("alice"), "early").unwrap();
    svc.finish_transfer_owner(&ctx("owner")).unwrap();

    let json = serde_json::to_string(svc.state()).unwrap();
    let state: TokenState = serde_json::from_str(&json).unwrap();
    let restored = TokenService::restore(state, Box::new(RecordingSink::new()));

    assert_eq!(restored.state(), svc.state());
    assert_eq!(restored.available_balance_of(&addr("alice"), T0), 600);
    assert_eq!(restored.allowance(&addr("alice"), &addr("bob")), 5);
    assert!(restored.is_protected_address(&addr("reserve")));
    assert!(!restored.is_owner_transfer_available());
}
