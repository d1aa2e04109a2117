//! Height tracking: the last block whose effects the ledger has applied.

use snb_storage::WriteBatch;

use crate::ledger::BatchingLedger;
use crate::types::{LedgerError, LedgerResult};

impl BatchingLedger {
    /// Height of the last fully applied block; 0 for a fresh ledger.
    pub fn current_height(&self) -> LedgerResult<u64> {
        Ok(self.store().begin_read()?.height()?)
    }

    /// Overwrite the tracked height. Used on init and resync.
    pub fn update_height(&mut self, new_height: u64) -> LedgerResult<()> {
        let wb = self.store().begin_write()?;
        let old = wb.height()?;
        wb.put_height(new_height)?;
        wb.commit()?;
        tracing::info!(old, new = new_height, "batching height updated");
        Ok(())
    }

    pub fn increment_height(&mut self) -> LedgerResult<u64> {
        let wb = self.store().begin_write()?;
        let height = advance(&wb)?;
        wb.commit()?;
        Ok(height)
    }

    /// Fails with [`LedgerError::HeightUnderflow`] at height 0.
    pub fn decrement_height(&mut self) -> LedgerResult<u64> {
        let wb = self.store().begin_write()?;
        let height = retreat(&wb)?;
        wb.commit()?;
        Ok(height)
    }
}

/// Add one to the height inside `wb`, returning the new height.
pub(crate) fn advance(wb: &WriteBatch) -> LedgerResult<u64> {
    let height = wb.height()?.checked_add(1).ok_or(LedgerError::Overflow)?;
    wb.put_height(height)?;
    Ok(height)
}

/// Subtract one from the height inside `wb`, returning the new height.
pub(crate) fn retreat(wb: &WriteBatch) -> LedgerResult<u64> {
    let height = wb
        .height()?
        .checked_sub(1)
        .ok_or(LedgerError::HeightUnderflow)?;
    wb.put_height(height)?;
    Ok(height)
}
