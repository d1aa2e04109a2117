//! Block application and rollback.

use snb_rewards::{calculate_rewards, BatchPayment, ServiceNodeSnapshot, BATCHING_HF_VERSION};
use snb_storage::{AccrualJournal, WriteBatch};

use crate::accrual::{aggregate, apply_deltas};
use crate::height::{advance, retreat};
use crate::ledger::BatchingLedger;
use crate::types::{AccrualDelta, BatchBlock, LedgerError, LedgerResult};

impl BatchingLedger {
    /// Record the payouts due at the height of `block`, then accrue its
    /// service-node rewards.
    ///
    /// Payouts are selected from balances as they stood before the block, so
    /// the record matches what [`get_sn_payments`](Self::get_sn_payments)
    /// returned while the block was being built. The block must directly
    /// follow the tracked height. Everything happens in one transaction: on
    /// error the ledger is unchanged.
    pub fn add_block(&mut self, block: &BatchBlock, snapshot: &ServiceNodeSnapshot) -> LedgerResult<()> {
        self.check_hard_fork(block)?;
        let wb = self.store().begin_write()?;

        if block.hf_version < BATCHING_HF_VERSION {
            wb.put_height(block.height)?;
            wb.commit()?;
            tracing::trace!(height = block.height, "pre-batching block, height only");
            return Ok(());
        }

        if self.config().batching_fork_height() == Some(block.height) {
            let wiped = wb.contents()?;
            wb.clear()?;
            wb.put_reset_undo(block.height, &wiped)?;
            wb.put_height(block.height.saturating_sub(1))?;
            tracing::info!(
                height = block.height,
                wiped = wiped.accrued.len(),
                "batching fork reached, ledger reset"
            );
        }

        let height = wb.height()?;
        if height.checked_add(1) != Some(block.height) {
            tracing::warn!(tracked = height, block = block.height, "add_block desync");
            return Err(LedgerError::Desync {
                expected: height.saturating_add(1),
                got: block.height,
            });
        }

        let due = self
            .scheduler()
            .select_due(&wb.all_accrued()?, block.height);
        wb.put_payment_record(block.height, &due)?;

        let credits = block_credits(block, snapshot)?;
        let deltas: Vec<AccrualDelta> = credits.iter().map(AccrualDelta::from).collect();
        apply_deltas(&wb, &deltas)?;
        let credited = credits.len();
        wb.put_journal(
            block.height,
            &AccrualJournal {
                hf_version: block.hf_version,
                rewards: block.journal_rewards(),
                credits,
            },
        )?;

        advance(&wb)?;
        wb.commit()?;

        tracing::info!(
            height = block.height,
            hf_version = block.hf_version,
            credited,
            due = due.len(),
            "batching block added"
        );
        Ok(())
    }

    /// Undo `block`, which must be the last block added, restoring the ledger
    /// exactly as it was before [`add_block`](Self::add_block) ran.
    pub fn pop_block(&mut self, block: &BatchBlock) -> LedgerResult<()> {
        self.check_hard_fork(block)?;
        let wb = self.store().begin_write()?;

        let height = wb.height()?;
        if height != block.height {
            tracing::warn!(tracked = height, block = block.height, "pop_block desync");
            return Err(LedgerError::Desync {
                expected: height,
                got: block.height,
            });
        }

        if block.hf_version < BATCHING_HF_VERSION {
            retreat(&wb)?;
            wb.commit()?;
            return Ok(());
        }

        let restored = restore_paid(&wb, block.height)?;
        wb.delete_payment_record(block.height)?;
        let reverted = revert_journal(&wb, block)?;
        retreat(&wb)?;
        if let Some(wiped) = wb.reset_undo(block.height)? {
            wb.clear()?;
            wb.restore(&wiped)?;
            tracing::info!(height = block.height, "batching fork reset undone");
        }
        wb.commit()?;

        tracing::info!(
            height = block.height,
            restored,
            reverted,
            "batching block popped"
        );
        Ok(())
    }

    fn check_hard_fork(&self, block: &BatchBlock) -> LedgerResult<()> {
        let expected = self.config().hf_version_at(block.height).unwrap_or(0);
        let batching = expected >= BATCHING_HF_VERSION || block.hf_version >= BATCHING_HF_VERSION;
        if batching && expected != block.hf_version {
            return Err(LedgerError::HardForkMismatch {
                height: block.height,
                expected,
                got: block.hf_version,
            });
        }
        Ok(())
    }
}

/// Split every reward of `block` among its node's operator and contributors
/// and fold the result into one credit per address, in address order.
pub fn block_credits(block: &BatchBlock, snapshot: &ServiceNodeSnapshot) -> LedgerResult<Vec<BatchPayment>> {
    let mut split = Vec::new();
    for reward in &block.rewards {
        let node = snapshot
            .get(&reward.service_node)
            .ok_or(LedgerError::MissingServiceNode(reward.service_node))?;
        split.extend(calculate_rewards(block.hf_version, reward.amount, node)?);
    }
    Ok(aggregate(&split)?
        .into_iter()
        .filter(|(_, amount)| *amount > 0)
        .map(|(address, amount)| BatchPayment { address, amount })
        .collect())
}

/// Credit back any payouts confirmed at `height` and drop the record.
fn restore_paid(wb: &WriteBatch, height: u64) -> LedgerResult<usize> {
    let Some(paid) = wb.paid_record(height)? else {
        return Ok(0);
    };
    let deltas: Vec<AccrualDelta> = paid
        .iter()
        .map(|p| AccrualDelta::credit(p.address.clone(), p.amount))
        .collect();
    apply_deltas(wb, &deltas)?;
    wb.delete_paid_record(height)?;
    Ok(paid.len())
}

/// Debit the credits journaled when `block` was added and drop the journal.
/// The journal must have been written by this same block.
fn revert_journal(wb: &WriteBatch, block: &BatchBlock) -> LedgerResult<usize> {
    let journal = match wb.journal(block.height)? {
        Some(journal)
            if journal.hf_version == block.hf_version
                && journal.rewards == block.journal_rewards() =>
        {
            journal
        }
        _ => {
            return Err(LedgerError::JournalMismatch {
                height: block.height,
            })
        }
    };
    let deltas: Vec<AccrualDelta> = journal
        .credits
        .iter()
        .map(|c| AccrualDelta::debit(c.address.clone(), c.amount))
        .collect();
    apply_deltas(wb, &deltas)?;
    wb.delete_journal(block.height)?;
    Ok(journal.credits.len())
}
