//! Payout scheduling: which accrued balances are due at a given height.
//!
//! Each address owns one payout slot per batching interval, derived from a
//! hash of the address, so payouts spread evenly across the interval instead
//! of landing in the same block.

use sha2::{Digest, Sha256};

use snb_network::NetworkConfig;
use snb_rewards::{Address, BatchPayment};

use crate::ledger::BatchingLedger;
use crate::types::LedgerResult;

/// Offset within the batching interval at which `address` gets paid.
pub fn payout_offset(address: &Address, interval: u64) -> u64 {
    if interval <= 1 {
        return 0;
    }
    let digest = Sha256::digest(address.as_str().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix) % interval
}

/// Selects due payouts from accrued balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutScheduler {
    pub interval: u64,
    pub min_payment: u64,
}

impl PayoutScheduler {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            interval: config.batching_interval.max(1),
            min_payment: config.min_batch_payment,
        }
    }

    /// Whether `height` is the payout slot of `address`.
    pub fn is_payout_height(&self, address: &Address, height: u64) -> bool {
        payout_offset(address, self.interval) == height % self.interval
    }

    /// First payout slot of `address` strictly after `current`.
    pub fn next_payout_height(&self, address: &Address, current: u64) -> Option<u64> {
        let offset = payout_offset(address, self.interval);
        let base = current - current % self.interval;
        let candidate = base.checked_add(offset)?;
        if candidate > current {
            Some(candidate)
        } else {
            candidate.checked_add(self.interval)
        }
    }

    /// Every balance at or above the minimum whose slot is `height`, paid in
    /// full. `accruals` must be in address order; the output keeps it.
    pub fn select_due(&self, accruals: &[(Address, u64)], height: u64) -> Vec<BatchPayment> {
        accruals
            .iter()
            .filter(|(address, amount)| {
                *amount >= self.min_payment && self.is_payout_height(address, height)
            })
            .map(|(address, amount)| BatchPayment {
                address: address.clone(),
                amount: *amount,
            })
            .collect()
    }
}

impl BatchingLedger {
    /// Payouts the coinbase of the block at `block_height` must carry.
    ///
    /// Returns the record stored when that block was added, or otherwise the
    /// projection over the current balances. Empty means nothing is due. The
    /// fork block itself pays nothing since adding it wipes the ledger.
    pub fn get_sn_payments(&self, block_height: u64) -> LedgerResult<Vec<BatchPayment>> {
        let view = self.store().begin_read()?;
        if let Some(record) = view.payment_record(block_height)? {
            return Ok(record);
        }
        if !self.config().is_batching_height(block_height)
            || self.config().batching_fork_height() == Some(block_height)
        {
            return Ok(Vec::new());
        }
        let due = self.scheduler().select_due(&view.all_accrued()?, block_height);
        tracing::debug!(block_height, due = due.len(), "projected batch payments");
        Ok(due)
    }
}
