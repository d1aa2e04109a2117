//! Accrued balances: what each address is owed but has not yet been paid.

use std::collections::BTreeMap;

use snb_rewards::{Address, BatchPayment};
use snb_storage::{PaidPayment, WriteBatch};

use crate::ledger::BatchingLedger;
use crate::types::{AccrualDelta, LedgerError, LedgerResult};

impl BatchingLedger {
    /// Apply signed balance changes in one transaction.
    ///
    /// Deltas for the same address are summed first. If any resulting balance
    /// would go negative or overflow, nothing is written.
    pub fn add_sn_payments(&mut self, deltas: &[AccrualDelta], block_height: u64) -> LedgerResult<()> {
        let wb = self.store().begin_write()?;
        apply_deltas(&wb, deltas)?;
        wb.commit()?;
        tracing::debug!(block_height, deltas = deltas.len(), "accrual deltas applied");
        Ok(())
    }

    /// Payouts recorded as due at `height`, if the block was added.
    pub fn get_block_payments(&self, height: u64) -> LedgerResult<Option<Vec<BatchPayment>>> {
        Ok(self.store().begin_read()?.payment_record(height)?)
    }

    /// Remove the payment record at `height`. Returns whether one existed.
    pub fn delete_block_payments(&mut self, height: u64) -> LedgerResult<bool> {
        let wb = self.store().begin_write()?;
        let existed = wb.delete_payment_record(height)?;
        wb.commit()?;
        Ok(existed)
    }

    /// Payouts confirmed in the coinbase of the block at `height`.
    pub fn get_paid_payments(&self, height: u64) -> LedgerResult<Vec<PaidPayment>> {
        Ok(self
            .store()
            .begin_read()?
            .paid_record(height)?
            .unwrap_or_default())
    }
}

/// Sum deltas per address, check every new balance, then write them.
/// Balances that land on zero are removed rather than stored.
pub(crate) fn apply_deltas(wb: &WriteBatch, deltas: &[AccrualDelta]) -> LedgerResult<()> {
    let mut summed: BTreeMap<&Address, i128> = BTreeMap::new();
    for delta in deltas {
        let entry = summed.entry(&delta.address).or_insert(0);
        *entry = entry.checked_add(delta.amount).ok_or(LedgerError::Overflow)?;
    }

    let mut updates = Vec::with_capacity(summed.len());
    for (address, delta) in summed {
        if delta == 0 {
            continue;
        }
        let balance = wb.accrued(address)?.unwrap_or(0);
        let next = i128::from(balance)
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        if next < 0 {
            return Err(LedgerError::BalanceUnderflow {
                address: address.clone(),
                balance,
                delta,
            });
        }
        let next = u64::try_from(next).map_err(|_| LedgerError::Overflow)?;
        updates.push((address, next));
    }

    for (address, balance) in updates {
        if balance == 0 {
            wb.delete_accrued(address)?;
        } else {
            wb.put_accrued(address, balance)?;
        }
    }
    Ok(())
}

/// Fold payments into one entry per address, in address order.
pub(crate) fn aggregate(payments: &[BatchPayment]) -> LedgerResult<BTreeMap<Address, u64>> {
    let mut totals: BTreeMap<Address, u64> = BTreeMap::new();
    for payment in payments {
        let entry = totals.entry(payment.address.clone()).or_insert(0);
        *entry = entry.checked_add(payment.amount).ok_or(LedgerError::Overflow)?;
    }
    Ok(totals)
}
