//! Coinbase payout validation and settlement.

use std::collections::BTreeMap;

use snb_rewards::{Address, BatchPayment};
use snb_storage::PaidPayment;

use crate::accrual::aggregate;
use crate::ledger::BatchingLedger;
use crate::types::{LedgerError, LedgerResult, PaymentMismatch};

/// Compare the payouts a block carries against the payouts that are due.
///
/// Order does not matter; each address may appear once per side.
pub fn compare_payments(actual: &[BatchPayment], expected: &[BatchPayment]) -> Result<(), PaymentMismatch> {
    let actual_map = fold_unique(actual)?;
    let expected_map = fold_unique(expected)?;

    if let Some(extra) = actual_map.keys().find(|a| !expected_map.contains_key(*a)) {
        return Err(PaymentMismatch::Unexpected((*extra).clone()));
    }
    for (address, &want) in &expected_map {
        match actual_map.get(address) {
            None => return Err(PaymentMismatch::Missing((*address).clone())),
            Some(&got) if got != want => {
                return Err(PaymentMismatch::Amount {
                    address: (*address).clone(),
                    actual: got,
                    expected: want,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn fold_unique(payments: &[BatchPayment]) -> Result<BTreeMap<&Address, u64>, PaymentMismatch> {
    let mut map = BTreeMap::new();
    for payment in payments {
        if map.insert(&payment.address, payment.amount).is_some() {
            return Err(PaymentMismatch::Duplicate(payment.address.clone()));
        }
    }
    Ok(map)
}

impl BatchingLedger {
    /// Check a block's coinbase payouts against the expected batch payments.
    ///
    /// A mismatch is `Ok(false)`, not an error. When they match and
    /// `save_payment` is set the payouts are settled via
    /// [`save_payments`](Self::save_payments).
    pub fn validate_batch_payment(
        &mut self,
        actual: &[BatchPayment],
        expected: &[BatchPayment],
        block_height: u64,
        save_payment: bool,
    ) -> LedgerResult<bool> {
        if let Err(mismatch) = compare_payments(actual, expected) {
            tracing::warn!(block_height, reason = %mismatch, "batch payment mismatch");
            return Ok(false);
        }
        if save_payment {
            self.save_payments(block_height, expected)?;
        }
        Ok(true)
    }

    /// Deduct confirmed payouts from accrued balances and record them as paid
    /// at `block_height`.
    pub fn save_payments(&mut self, block_height: u64, paid: &[BatchPayment]) -> LedgerResult<()> {
        let wb = self.store().begin_write()?;
        if wb.paid_record(block_height)?.is_some() {
            return Err(LedgerError::AlreadyPaid(block_height));
        }

        let totals = aggregate(paid)?;
        let mut settled = Vec::with_capacity(totals.len());
        for (address, amount) in totals {
            let owed = wb.accrued(&address)?.unwrap_or(0);
            if owed < amount {
                return Err(LedgerError::Reconciliation {
                    address,
                    owed,
                    paid: amount,
                });
            }
            let remaining = owed - amount;
            if remaining == 0 {
                wb.delete_accrued(&address)?;
            } else {
                wb.put_accrued(&address, remaining)?;
            }
            settled.push(PaidPayment {
                address,
                amount,
                height_paid: block_height,
            });
        }

        if !settled.is_empty() {
            wb.put_paid_record(block_height, &settled)?;
        }
        wb.commit()?;
        tracing::info!(block_height, payouts = settled.len(), "batch payments saved");
        Ok(())
    }
}
