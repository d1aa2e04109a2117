//! Read-only inspection of persisted ledger state.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use snb_rewards::{Address, BatchPayment};
use snb_storage::{AccrualJournal, PaidPayment, TableContents};

use crate::ledger::BatchingLedger;
use crate::types::LedgerResult;

/// Everything the ledger persists, taken from one consistent read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub height: u64,
    pub accrued: Vec<(Address, u64)>,
    pub payment_records: Vec<(u64, Vec<BatchPayment>)>,
    pub paid_records: Vec<(u64, Vec<PaidPayment>)>,
    pub journals: Vec<(u64, AccrualJournal)>,
    /// Rows wiped at the batching fork, keyed by fork height.
    pub resets: Vec<(u64, TableContents)>,
}

impl LedgerSnapshot {
    /// Deterministic digest of the whole snapshot.
    pub fn state_root(&self) -> LedgerResult<[u8; 32]> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn state_root_hex(&self) -> LedgerResult<String> {
        Ok(hex::encode(self.state_root()?))
    }
}

/// Borrowing view over a [`BatchingLedger`] for tools and tests.
pub struct LedgerInspector<'a> {
    ledger: &'a BatchingLedger,
}

impl<'a> LedgerInspector<'a> {
    pub fn new(ledger: &'a BatchingLedger) -> Self {
        Self { ledger }
    }

    /// Number of addresses with a nonzero accrued balance.
    pub fn accrual_count(&self) -> LedgerResult<u64> {
        Ok(self.ledger.store().begin_read()?.accrued_count()?)
    }

    pub fn balance_of(&self, address: &Address) -> LedgerResult<Option<u64>> {
        Ok(self.ledger.store().begin_read()?.accrued(address)?)
    }

    /// Every accrued balance in address order.
    pub fn accruals(&self) -> LedgerResult<Vec<(Address, u64)>> {
        Ok(self.ledger.store().begin_read()?.all_accrued()?)
    }

    pub fn total_owed(&self) -> LedgerResult<u128> {
        Ok(self
            .accruals()?
            .iter()
            .map(|(_, amount)| u128::from(*amount))
            .sum())
    }

    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        let view = self.ledger.store().begin_read()?;
        Ok(LedgerSnapshot {
            height: view.height()?,
            accrued: view.all_accrued()?,
            payment_records: view.all_payment_records()?,
            paid_records: view.all_paid_records()?,
            journals: view.all_journals()?,
            resets: view.all_reset_undos()?,
        })
    }
}
