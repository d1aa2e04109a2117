//! redb-backed persistent storage for the batching ledger.
//!
//! Six logical tables:
//! - `batch_meta`: the tracked height
//! - `batched_payments_accrued`: owed balance per address
//! - `batch_payment_records`: payouts proposed at a height
//! - `batched_payments_paid`: payouts confirmed in a block's coinbase
//! - `batch_accrual_journal`: credits applied at a height, for rollback
//! - `batch_reset_undo`: rows wiped when the batching fork block reset them

use std::path::Path;

use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadTransaction, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use snb_rewards::{Address, BatchPayment};

use crate::types::{AccrualJournal, PaidPayment, StorageResult, TableContents};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("batch_meta");
const ACCRUED_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("batched_payments_accrued");
const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("batch_payment_records");
const PAID_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("batched_payments_paid");
const JOURNAL_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("batch_accrual_journal");
const RESET_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("batch_reset_undo");

const HEIGHT_KEY: &str = "height";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) a database file at `path` and ensure every table exists.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let db = Database::create(path)?;
        tracing::debug!(path = %path.display(), "batching database opened");
        Self::with_database(db)
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::with_database(db)
    }

    fn with_database(db: Database) -> StorageResult<Self> {
        let tx = db.begin_write()?;
        create_tables(&tx)?;
        tx.commit()?;
        Ok(Self { db })
    }

    /// Begin an atomic write. Nothing is visible to readers until
    /// [`WriteBatch::commit`]; dropping the batch discards every write.
    pub fn begin_write(&self) -> StorageResult<WriteBatch> {
        Ok(WriteBatch {
            tx: self.db.begin_write()?,
        })
    }

    /// Begin a consistent read-only view of the last committed state.
    pub fn begin_read(&self) -> StorageResult<ReadView> {
        Ok(ReadView {
            tx: self.db.begin_read()?,
        })
    }
}

fn create_tables(tx: &WriteTransaction) -> StorageResult<()> {
    tx.open_table(META_TABLE)?;
    tx.open_table(ACCRUED_TABLE)?;
    tx.open_table(RECORDS_TABLE)?;
    tx.open_table(PAID_TABLE)?;
    tx.open_table(JOURNAL_TABLE)?;
    tx.open_table(RESET_TABLE)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Table readers shared by read views and write batches
// ---------------------------------------------------------------------------

fn read_u64(table: &impl ReadableTable<&'static str, u64>, key: &str) -> StorageResult<Option<u64>> {
    Ok(table.get(key)?.map(|guard| guard.value()))
}

fn read_all_u64(table: &impl ReadableTable<&'static str, u64>) -> StorageResult<Vec<(Address, u64)>> {
    let mut rows = Vec::new();
    for item in table.iter()? {
        let (key, value) = item?;
        rows.push((Address::from(key.value()), value.value()));
    }
    Ok(rows)
}

fn read_blob<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    height: u64,
) -> StorageResult<Option<T>> {
    match table.get(height)? {
        Some(guard) => Ok(Some(bincode::deserialize(guard.value())?)),
        None => Ok(None),
    }
}

fn read_all_blobs<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> StorageResult<Vec<(u64, T)>> {
    let mut rows = Vec::new();
    for item in table.iter()? {
        let (key, value) = item?;
        rows.push((key.value(), bincode::deserialize(value.value())?));
    }
    Ok(rows)
}

macro_rules! table_reads {
    ($ty:ty) => {
        impl $ty {
            /// Last fully applied block height; 0 on a fresh database.
            pub fn height(&self) -> StorageResult<u64> {
                let table = self.tx.open_table(META_TABLE)?;
                Ok(read_u64(&table, HEIGHT_KEY)?.unwrap_or(0))
            }

            /// Owed balance of `address`, `None` when nothing is owed.
            pub fn accrued(&self, address: &Address) -> StorageResult<Option<u64>> {
                let table = self.tx.open_table(ACCRUED_TABLE)?;
                read_u64(&table, address.as_str())
            }

            /// Every owed balance, ordered by address.
            pub fn all_accrued(&self) -> StorageResult<Vec<(Address, u64)>> {
                let table = self.tx.open_table(ACCRUED_TABLE)?;
                read_all_u64(&table)
            }

            pub fn accrued_count(&self) -> StorageResult<u64> {
                let table = self.tx.open_table(ACCRUED_TABLE)?;
                Ok(table.len()?)
            }

            pub fn payment_record(&self, height: u64) -> StorageResult<Option<Vec<BatchPayment>>> {
                let table = self.tx.open_table(RECORDS_TABLE)?;
                read_blob(&table, height)
            }

            pub fn all_payment_records(&self) -> StorageResult<Vec<(u64, Vec<BatchPayment>)>> {
                let table = self.tx.open_table(RECORDS_TABLE)?;
                read_all_blobs(&table)
            }

            pub fn paid_record(&self, height: u64) -> StorageResult<Option<Vec<PaidPayment>>> {
                let table = self.tx.open_table(PAID_TABLE)?;
                read_blob(&table, height)
            }

            pub fn all_paid_records(&self) -> StorageResult<Vec<(u64, Vec<PaidPayment>)>> {
                let table = self.tx.open_table(PAID_TABLE)?;
                read_all_blobs(&table)
            }

            pub fn journal(&self, height: u64) -> StorageResult<Option<AccrualJournal>> {
                let table = self.tx.open_table(JOURNAL_TABLE)?;
                read_blob(&table, height)
            }

            pub fn all_journals(&self) -> StorageResult<Vec<(u64, AccrualJournal)>> {
                let table = self.tx.open_table(JOURNAL_TABLE)?;
                read_all_blobs(&table)
            }

            /// Rows wiped by the reset at `height`, if one happened there.
            pub fn reset_undo(&self, height: u64) -> StorageResult<Option<TableContents>> {
                let table = self.tx.open_table(RESET_TABLE)?;
                read_blob(&table, height)
            }

            pub fn all_reset_undos(&self) -> StorageResult<Vec<(u64, TableContents)>> {
                let table = self.tx.open_table(RESET_TABLE)?;
                read_all_blobs(&table)
            }

            /// Height and every row except reset undo records.
            pub fn contents(&self) -> StorageResult<TableContents> {
                Ok(TableContents {
                    height: self.height()?,
                    accrued: self.all_accrued()?,
                    payment_records: self.all_payment_records()?,
                    paid_records: self.all_paid_records()?,
                    journals: self.all_journals()?,
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// ReadView: a redb read transaction
// ---------------------------------------------------------------------------

pub struct ReadView {
    tx: ReadTransaction,
}

table_reads!(ReadView);

// ---------------------------------------------------------------------------
// WriteBatch: a redb write transaction for atomic multi-table writes
// ---------------------------------------------------------------------------

pub struct WriteBatch {
    tx: WriteTransaction,
}

table_reads!(WriteBatch);

impl WriteBatch {
    pub fn put_height(&self, height: u64) -> StorageResult<()> {
        let mut table = self.tx.open_table(META_TABLE)?;
        table.insert(HEIGHT_KEY, height)?;
        Ok(())
    }

    pub fn put_accrued(&self, address: &Address, amount: u64) -> StorageResult<()> {
        let mut table = self.tx.open_table(ACCRUED_TABLE)?;
        table.insert(address.as_str(), amount)?;
        Ok(())
    }

    pub fn delete_accrued(&self, address: &Address) -> StorageResult<bool> {
        let mut table = self.tx.open_table(ACCRUED_TABLE)?;
        let existed = table.remove(address.as_str())?.is_some();
        Ok(existed)
    }

    pub fn put_payment_record(&self, height: u64, payments: &[BatchPayment]) -> StorageResult<()> {
        self.put_blob(RECORDS_TABLE, height, &payments)
    }

    pub fn delete_payment_record(&self, height: u64) -> StorageResult<bool> {
        self.delete_blob(RECORDS_TABLE, height)
    }

    pub fn put_paid_record(&self, height: u64, paid: &[PaidPayment]) -> StorageResult<()> {
        self.put_blob(PAID_TABLE, height, &paid)
    }

    pub fn delete_paid_record(&self, height: u64) -> StorageResult<bool> {
        self.delete_blob(PAID_TABLE, height)
    }

    pub fn put_journal(&self, height: u64, journal: &AccrualJournal) -> StorageResult<()> {
        self.put_blob(JOURNAL_TABLE, height, journal)
    }

    pub fn delete_journal(&self, height: u64) -> StorageResult<bool> {
        self.delete_blob(JOURNAL_TABLE, height)
    }

    pub fn put_reset_undo(&self, height: u64, wiped: &TableContents) -> StorageResult<()> {
        self.put_blob(RESET_TABLE, height, wiped)
    }

    /// Write back every row of `contents` and its height. Existing rows with
    /// the same keys are overwritten; other rows are left alone.
    pub fn restore(&self, contents: &TableContents) -> StorageResult<()> {
        self.put_height(contents.height)?;
        for (address, amount) in &contents.accrued {
            self.put_accrued(address, *amount)?;
        }
        for (height, record) in &contents.payment_records {
            self.put_payment_record(*height, record)?;
        }
        for (height, paid) in &contents.paid_records {
            self.put_paid_record(*height, paid)?;
        }
        for (height, journal) in &contents.journals {
            self.put_journal(*height, journal)?;
        }
        Ok(())
    }

    /// Drop every row of every table, height included.
    pub fn clear(&self) -> StorageResult<()> {
        self.tx.delete_table(META_TABLE)?;
        self.tx.delete_table(ACCRUED_TABLE)?;
        self.tx.delete_table(RECORDS_TABLE)?;
        self.tx.delete_table(PAID_TABLE)?;
        self.tx.delete_table(JOURNAL_TABLE)?;
        self.tx.delete_table(RESET_TABLE)?;
        create_tables(&self.tx)
    }

    /// Commit the write batch atomically.
    pub fn commit(self) -> StorageResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    /// Discard every write made through this batch.
    pub fn abort(self) -> StorageResult<()> {
        self.tx.abort()?;
        Ok(())
    }

    fn put_blob<T: Serialize + ?Sized>(
        &self,
        definition: TableDefinition<'static, u64, &'static [u8]>,
        height: u64,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = bincode::serialize(value)?;
        let mut table = self.tx.open_table(definition)?;
        table.insert(height, bytes.as_slice())?;
        Ok(())
    }

    fn delete_blob(
        &self,
        definition: TableDefinition<'static, u64, &'static [u8]>,
        height: u64,
    ) -> StorageResult<bool> {
        let mut table = self.tx.open_table(definition)?;
        let existed = table.remove(height)?.is_some();
        Ok(existed)
    }
}
