//! End-to-end flows through the batching ledger: accrual from a block,
//! payout selection, coinbase validation, settlement and rollback.

use snb_ledger::{AccrualDelta, BatchBlock, BatchingLedger, LedgerError, NodeReward};
use snb_network::NetworkConfig;
use snb_rewards::{Address, BatchPayment, Contributor, ServiceNodeInfo, ServiceNodeKey, ServiceNodeSnapshot};
use snb_storage::PaidPayment;

const NODE: ServiceNodeKey = ServiceNodeKey([7; 32]);

/// Fakechain parameters with every height a payout slot.
fn config() -> NetworkConfig {
    let mut config = NetworkConfig::fakechain();
    config.batching_interval = 1;
    config.min_batch_payment = 1000;
    config
}

fn addr(s: &str) -> Address {
    Address::from(s)
}

fn snapshot() -> ServiceNodeSnapshot {
    let mut snapshot = ServiceNodeSnapshot::new();
    snapshot.insert(
        NODE,
        ServiceNodeInfo {
            operator: addr("B"),
            fee: 0,
            contributors: vec![
                Contributor {
                    address: addr("B"),
                    amount: 200,
                },
                Contributor {
                    address: addr("C"),
                    amount: 300,
                },
            ],
        },
    );
    snapshot
}

fn block_101() -> BatchBlock {
    BatchBlock {
        height: 101,
        hf_version: 19,
        rewards: vec![NodeReward {
            service_node: NODE,
            amount: 500,
        }],
    }
}

/// Ledger at height 100 owing A 1000 and B 500.
fn seeded_ledger() -> BatchingLedger {
    let mut ledger = BatchingLedger::in_memory(config()).expect("ledger should open");
    ledger.update_height(100).unwrap();
    ledger
        .add_sn_payments(&[AccrualDelta::credit("A", 1000), AccrualDelta::credit("B", 500)], 100)
        .unwrap();
    ledger
}

fn balances(ledger: &BatchingLedger) -> Vec<(String, u64)> {
    ledger
        .inspect()
        .accruals()
        .unwrap()
        .into_iter()
        .map(|(a, amount)| (a.as_str().to_string(), amount))
        .collect()
}

fn owned(rows: &[(&str, u64)]) -> Vec<(String, u64)> {
    rows.iter().map(|(a, n)| (a.to_string(), *n)).collect()
}

// ---------------------------------------------------------------------------
// Accrue, pay, roll back
// ---------------------------------------------------------------------------

#[test]
fn block_accrues_split_to_contributors() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();

    assert_eq!(ledger.current_height().unwrap(), 101);
    assert_eq!(
        balances(&ledger),
        owned(&[("A", 1000), ("B", 700), ("C", 300)])
    );
}

#[test]
fn threshold_selects_only_a() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();

    assert_eq!(
        ledger.get_sn_payments(101).unwrap(),
        vec![BatchPayment::new("A", 1000)]
    );
}

#[test]
fn due_payouts_are_fixed_before_the_block_accrues() {
    let mut ledger = seeded_ledger();
    let coinbase = ledger.get_sn_payments(101).unwrap();
    assert_eq!(coinbase, vec![BatchPayment::new("A", 1000)]);

    // The block's own reward lifts B to 1100; that must not change what 101 pays.
    let mut solo_b = ServiceNodeSnapshot::new();
    solo_b.insert(
        NODE,
        ServiceNodeInfo {
            operator: addr("B"),
            fee: 0,
            contributors: vec![Contributor {
                address: addr("B"),
                amount: 100,
            }],
        },
    );
    let block = BatchBlock {
        height: 101,
        hf_version: 19,
        rewards: vec![NodeReward {
            service_node: NODE,
            amount: 600,
        }],
    };
    ledger.add_block(&block, &solo_b).unwrap();
    assert_eq!(balances(&ledger), owned(&[("A", 1000), ("B", 1100)]));

    let expected = ledger.get_sn_payments(101).unwrap();
    assert_eq!(expected, coinbase);
    assert!(ledger
        .validate_batch_payment(&coinbase, &expected, 101, true)
        .unwrap());
    assert_eq!(balances(&ledger), owned(&[("B", 1100)]));
}

#[test]
fn validate_and_save_pays_a_out() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();

    let expected = ledger.get_sn_payments(101).unwrap();
    let coinbase = vec![BatchPayment::new("A", 1000)];
    assert!(ledger
        .validate_batch_payment(&coinbase, &expected, 101, true)
        .unwrap());

    assert_eq!(balances(&ledger), owned(&[("B", 700), ("C", 300)]));
    assert_eq!(ledger.inspect().balance_of(&addr("A")).unwrap(), None);
    assert_eq!(
        ledger.get_paid_payments(101).unwrap(),
        vec![PaidPayment {
            address: addr("A"),
            amount: 1000,
            height_paid: 101,
        }]
    );
}

#[test]
fn pop_restores_state_before_block() {
    let mut ledger = seeded_ledger();
    let before = ledger.inspect().snapshot().unwrap();

    ledger.add_block(&block_101(), &snapshot()).unwrap();
    let expected = ledger.get_sn_payments(101).unwrap();
    assert!(ledger
        .validate_batch_payment(&expected.clone(), &expected, 101, true)
        .unwrap());

    ledger.pop_block(&block_101()).unwrap();

    assert_eq!(ledger.current_height().unwrap(), 100);
    assert_eq!(balances(&ledger), owned(&[("A", 1000), ("B", 500)]));
    assert!(ledger.get_paid_payments(101).unwrap().is_empty());
    assert_eq!(ledger.get_block_payments(101).unwrap(), None);
    assert_eq!(ledger.inspect().snapshot().unwrap(), before);
}

#[test]
fn block_can_be_replayed_after_pop() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();
    let first = ledger.inspect().snapshot().unwrap();

    ledger.pop_block(&block_101()).unwrap();
    ledger.add_block(&block_101(), &snapshot()).unwrap();
    assert_eq!(ledger.inspect().snapshot().unwrap(), first);
}

#[test]
fn popping_the_fork_block_brings_back_wiped_balances() {
    let mut ledger = BatchingLedger::in_memory(config()).unwrap();
    ledger.add_sn_payments(&[AccrualDelta::credit("A", 5)], 0).unwrap();
    let before = ledger.inspect().snapshot().unwrap();

    let fork = BatchBlock {
        height: 1,
        hf_version: 19,
        rewards: vec![],
    };
    ledger.add_block(&fork, &snapshot()).unwrap();
    assert!(balances(&ledger).is_empty());

    ledger.pop_block(&fork).unwrap();
    assert_eq!(balances(&ledger), owned(&[("A", 5)]));
    assert_eq!(ledger.current_height().unwrap(), 0);
    assert_eq!(ledger.inspect().snapshot().unwrap(), before);
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn short_coinbase_is_rejected_without_side_effects() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();
    let before = ledger.inspect().snapshot().unwrap();

    let expected = ledger.get_sn_payments(101).unwrap();
    let ok = ledger
        .validate_batch_payment(&[BatchPayment::new("A", 999)], &expected, 101, true)
        .unwrap();
    assert!(!ok);
    assert_eq!(ledger.inspect().snapshot().unwrap(), before);
}

#[test]
fn block_is_not_applied_twice() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();
    let err = ledger.add_block(&block_101(), &snapshot()).unwrap_err();
    assert!(matches!(err, LedgerError::Desync { expected: 102, got: 101 }));
    assert_eq!(ledger.current_height().unwrap(), 101);
}

#[test]
fn payout_cannot_be_saved_twice() {
    let mut ledger = seeded_ledger();
    ledger.add_block(&block_101(), &snapshot()).unwrap();
    let expected = ledger.get_sn_payments(101).unwrap();
    ledger.save_payments(101, &expected).unwrap();

    let err = ledger.save_payments(101, &expected).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyPaid(101)));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn ledger_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batching.redb");

    let before_pop = {
        let mut ledger = BatchingLedger::open(&path, config()).unwrap();
        ledger.update_height(100).unwrap();
        ledger
            .add_sn_payments(&[AccrualDelta::credit("A", 1000), AccrualDelta::credit("B", 500)], 100)
            .unwrap();
        let before = ledger.inspect().snapshot().unwrap();
        ledger.add_block(&block_101(), &snapshot()).unwrap();
        let due = ledger.get_sn_payments(101).unwrap();
        ledger.save_payments(101, &due).unwrap();
        before
    };

    let mut ledger = BatchingLedger::open(&path, config()).unwrap();
    assert_eq!(ledger.current_height().unwrap(), 101);
    assert_eq!(balances(&ledger), owned(&[("B", 700), ("C", 300)]));

    ledger.pop_block(&block_101()).unwrap();
    assert_eq!(ledger.inspect().snapshot().unwrap(), before_pop);
}
