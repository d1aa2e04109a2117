use serde::{Deserialize, Serialize};
use thiserror::Error;

use snb_network::NetworkError;
use snb_rewards::{Address, BatchPayment, RewardsError, ServiceNodeKey};
use snb_storage::StorageError;

/// Errors that can occur while mutating or querying the batching ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger desync: expected block height {expected}, got {got}")]
    Desync { expected: u64, got: u64 },

    #[error("height underflow: cannot decrement below 0")]
    HeightUnderflow,

    #[error("balance underflow for {address}: balance {balance}, delta {delta}")]
    BalanceUnderflow {
        address: Address,
        balance: u64,
        delta: i128,
    },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("payout to {address} exceeds accrued balance: owed {owed}, paid {paid}")]
    Reconciliation {
        address: Address,
        owed: u64,
        paid: u64,
    },

    #[error("payments already recorded for height {0}")]
    AlreadyPaid(u64),

    #[error("service node {0} not in snapshot")]
    MissingServiceNode(ServiceNodeKey),

    #[error("hard fork mismatch at height {height}: schedule says {expected}, block says {got}")]
    HardForkMismatch { height: u64, expected: u8, got: u8 },

    #[error("block at height {height} does not match the block that was added there")]
    JournalMismatch { height: u64 },

    #[error("reward error: {0}")]
    Rewards(#[from] RewardsError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("network config error: {0}")]
    Config(#[from] NetworkError),

    #[error("snapshot encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// A signed change to one address's accrued balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualDelta {
    pub address: Address,
    pub amount: i128,
}

impl AccrualDelta {
    pub fn credit(address: impl Into<Address>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount: i128::from(amount),
        }
    }

    pub fn debit(address: impl Into<Address>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount: -i128::from(amount),
        }
    }
}

impl From<&BatchPayment> for AccrualDelta {
    fn from(payment: &BatchPayment) -> Self {
        Self::credit(payment.address.clone(), payment.amount)
    }
}

/// One service-node reward distributed by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReward {
    pub service_node: ServiceNodeKey,
    pub amount: u64,
}

/// The slice of a block the ledger consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchBlock {
    pub height: u64,
    pub hf_version: u8,
    /// Every service-node reward the block distributes, in block order.
    pub rewards: Vec<NodeReward>,
}

impl BatchBlock {
    /// Sum of all reward amounts. Widened so it cannot overflow.
    pub fn reward_total(&self) -> u128 {
        self.rewards.iter().map(|r| u128::from(r.amount)).sum()
    }

    /// Rewards as kept in the accrual journal, to recognise the block on pop.
    pub fn journal_rewards(&self) -> Vec<(ServiceNodeKey, u64)> {
        self.rewards
            .iter()
            .map(|r| (r.service_node, r.amount))
            .collect()
    }
}

/// Why a block's coinbase payouts were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentMismatch {
    #[error("address {0} appears more than once")]
    Duplicate(Address),

    #[error("expected payout to {0} is missing")]
    Missing(Address),

    #[error("unexpected payout to {0}")]
    Unexpected(Address),

    #[error("payout to {address} is {actual}, expected {expected}")]
    Amount {
        address: Address,
        actual: u64,
        expected: u64,
    },
}
