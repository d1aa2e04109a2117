use serde::{Deserialize, Serialize};

use snb_rewards::{Address, BatchPayment, ServiceNodeKey};

/// One confirmed coinbase payout, kept so a popped block can restore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidPayment {
    pub address: Address,
    pub amount: u64,
    /// Height of the block whose coinbase carried the payout.
    pub height_paid: u64,
}

impl PaidPayment {
    pub fn from_payment(payment: &BatchPayment, height_paid: u64) -> Self {
        Self {
            address: payment.address.clone(),
            amount: payment.amount,
            height_paid,
        }
    }
}

/// Undo record for one applied block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualJournal {
    pub hf_version: u8,
    /// Every service-node reward of the block, in block order.
    pub rewards: Vec<(ServiceNodeKey, u64)>,
    /// Aggregated credits the block applied, in address order.
    pub credits: Vec<BatchPayment>,
}

/// Every row of the batching tables, as wiped by a ledger reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableContents {
    pub height: u64,
    pub accrued: Vec<(Address, u64)>,
    pub payment_records: Vec<(u64, Vec<BatchPayment>)>,
    pub paid_records: Vec<(u64, Vec<PaidPayment>)>,
    pub journals: Vec<(u64, AccrualJournal)>,
}

/// Errors produced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage backend error: {0}")]
    Backend(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("record encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
