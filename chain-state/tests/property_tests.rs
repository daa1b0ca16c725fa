//! Property-based tests for chain state invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Deterministic replay: Same log → same balances and tip
//! - Conservation: Transfers move value, only rewards create it
//! - Rejection: Failed transfers leave the table untouched
//! - Linkage: Every block names its predecessor

use chain_state::{
    types::{Account, Tx},
    BlockEnvelope, Genesis, MemoryLog, State,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

const ACCOUNTS: [&str; 4] = ["andrej", "babayaga", "caesar", "dora"];

/// Strategy for account names from a small fixed set
fn account_strategy() -> impl Strategy<Value = Account> {
    prop::sample::select(ACCOUNTS.to_vec()).prop_map(|name| Account::new(name))
}

/// Strategy for transfers and rewards of moderate size
fn tx_strategy() -> impl Strategy<Value = Tx> {
    (
        account_strategy(),
        account_strategy(),
        0u64..400_000,
        prop::bool::weighted(0.2),
    )
        .prop_map(|(from, to, value, reward)| {
            if reward {
                Tx::reward(to, value)
            } else {
                Tx::new(from, to, value, "")
            }
        })
}

/// Strategy for a run: batches of transactions, one block per batch
fn run_strategy() -> impl Strategy<Value = Vec<Vec<Tx>>> {
    prop::collection::vec(prop::collection::vec(tx_strategy(), 0..8), 1..6)
}

fn genesis() -> Genesis {
    let mut balances = BTreeMap::new();
    balances.insert(Account::new("andrej"), 1_000_000);
    balances.insert(Account::new("babayaga"), 10_000);
    Genesis::new(balances)
}

/// Submit every tx (ignoring rejections), persisting after each batch
fn run_batches(state: &mut State, batches: &[Vec<Tx>]) {
    for batch in batches {
        for tx in batch {
            let _ = state.add_tx(tx.clone());
        }
        state.persist().unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: Replaying the same log always yields the same state
    #[test]
    fn prop_deterministic_replay(batches in run_strategy()) {
        let log = MemoryLog::new();
        let mut state = State::from_log(genesis(), log.clone(), true).unwrap();
        run_batches(&mut state, &batches);

        let live_balances = state.balances().clone();
        let live_tip = state.latest_block_hash();
        let live_number = state.latest_block().unwrap().header.number;
        state.close().unwrap();

        for _ in 0..3 {
            let replayed = State::from_log(genesis(), MemoryLog::with_lines(log.lines()), true).unwrap();
            prop_assert_eq!(replayed.balances(), &live_balances);
            prop_assert_eq!(replayed.latest_block_hash(), live_tip);
            prop_assert_eq!(replayed.latest_block().unwrap().header.number, live_number);
        }
    }

    /// Property: Total supply = genesis + accepted rewards
    #[test]
    fn prop_supply_changes_only_by_rewards(txs in prop::collection::vec(tx_strategy(), 0..40)) {
        let mut state = State::from_log(genesis(), MemoryLog::new(), true).unwrap();
        let mut expected: u64 = genesis().balances.values().sum();

        for tx in txs {
            let reward = tx.is_reward();
            let value = tx.value;
            if state.add_tx(tx).is_ok() && reward {
                expected += value;
            }
        }

        prop_assert_eq!(state.balances().values().sum::<u64>(), expected);
    }

    /// Property: A successful transfer moves exactly `value`
    #[test]
    fn prop_transfer_conserves_pair(from in account_strategy(), to in account_strategy(), value in 0u64..20_000) {
        prop_assume!(from != to);
        let mut state = State::from_log(genesis(), MemoryLog::new(), true).unwrap();

        let from_before = state.balance(&from);
        let to_before = state.balance(&to);

        match state.add_tx(Tx::new(from.clone(), to.clone(), value, "")) {
            Ok(()) => {
                prop_assert_eq!(state.balance(&from), from_before - value);
                prop_assert_eq!(state.balance(&to), to_before + value);
            }
            Err(_) => prop_assert!(value > from_before),
        }
    }

    /// Property: Overdrafts are rejected and change nothing
    #[test]
    fn prop_overdraft_rejected(from in account_strategy(), to in account_strategy(), extra in 1u64..1_000) {
        let mut state = State::from_log(genesis(), MemoryLog::new(), true).unwrap();
        let before = state.balances().clone();
        let value = state.balance(&from) + extra;

        let result = state.add_tx(Tx::new(from, to, value, ""));
        prop_assert!(result.is_err());
        prop_assert_eq!(state.balances(), &before);
        prop_assert!(state.pending_txs().is_empty());
    }

    /// Property: Rewards touch only the recipient
    #[test]
    fn prop_reward_credits_only_recipient(to in account_strategy(), value in 0u64..1_000_000) {
        let mut state = State::from_log(genesis(), MemoryLog::new(), true).unwrap();
        let mut expected = state.balances().clone();
        *expected.entry(to.clone()).or_insert(0) += value;

        state.add_tx(Tx::reward(to, value)).unwrap();
        prop_assert_eq!(state.balances(), &expected);
    }

    /// Property: Persisted blocks form an unbroken chain
    #[test]
    fn prop_log_is_hash_linked(batches in run_strategy()) {
        let log = MemoryLog::new();
        let mut state = State::from_log(genesis(), log.clone(), true).unwrap();
        run_batches(&mut state, &batches);

        let envelopes: Vec<BlockEnvelope> = log
            .lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        prop_assert_eq!(envelopes.len(), batches.len());

        for (i, env) in envelopes.iter().enumerate() {
            prop_assert_eq!(env.value.header.number, i as u64);
            prop_assert_eq!(env.value.hash(), env.key);
            if i == 0 {
                prop_assert!(env.value.header.parent.is_zero());
            } else {
                prop_assert_eq!(env.value.header.parent, envelopes[i - 1].key);
            }
        }
    }
}
