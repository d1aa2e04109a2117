use std::path::Path;

use snb_network::NetworkConfig;
use snb_storage::Store;

use crate::inspect::LedgerInspector;
use crate::scheduler::PayoutScheduler;
use crate::types::LedgerResult;

/// Persistent ledger of service-node rewards owed but not yet paid out.
///
/// Every mutating operation runs inside one redb write transaction and takes
/// `&mut self`; queries take `&self` and read the last committed state.
pub struct BatchingLedger {
    store: Store,
    config: NetworkConfig,
}

impl BatchingLedger {
    /// Open (or create) the ledger database at `path` for the given network.
    pub fn open(path: &Path, config: NetworkConfig) -> LedgerResult<Self> {
        config.validate()?;
        let store = Store::open(path)?;
        let ledger = Self { store, config };
        tracing::info!(
            path = %path.display(),
            network = %ledger.config.network,
            height = ledger.current_height()?,
            "batching ledger opened"
        );
        Ok(ledger)
    }

    /// A ledger backed by memory only.
    pub fn in_memory(config: NetworkConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self {
            store: Store::in_memory()?,
            config,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Read-only access to persisted rows.
    pub fn inspect(&self) -> LedgerInspector<'_> {
        LedgerInspector::new(self)
    }

    /// Drop every accrual, record and journal and reset the height to 0.
    pub fn clear_database(&mut self) -> LedgerResult<()> {
        let wb = self.store.begin_write()?;
        wb.clear()?;
        wb.commit()?;
        tracing::info!(network = %self.config.network, "batching database cleared");
        Ok(())
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn scheduler(&self) -> PayoutScheduler {
        PayoutScheduler::from_config(&self.config)
    }
}
