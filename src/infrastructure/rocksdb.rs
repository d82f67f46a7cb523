use crate::domain::event::RecordedEvent;
use crate::domain::loan::{Loan, LoanId};
use crate::domain::ports::{LedgerMeta, LedgerStore, LedgerWrite};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Column Family for storing loans keyed by id.
pub const CF_LOANS: &str = "loans";
/// Column Family for the append-only event log keyed by sequence.
pub const CF_EVENTS: &str = "events";
/// Column Family holding the single ledger metadata record.
pub const CF_META: &str = "meta";

const META_KEY: &[u8] = b"ledger";

/// A persistent ledger using RocksDB.
///
/// Loans, events and metadata live in separate Column Families. Every
/// [`LedgerWrite`] is applied through a single `WriteBatch`, so a crash never
/// leaves a loan updated without its event or the bumped counters.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
/// Clones also share the commit lock, which makes the stale-write check and
/// the batch write one step.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_LOANS, CF_EVENTS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LendingError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn meta(&self) -> Result<Option<LedgerMeta>> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, META_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let cf = self.cf(CF_LOANS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn loans(&self) -> Result<Vec<Loan>> {
        let cf = self.cf(CF_LOANS)?;
        let mut loans = Vec::new();
        // Big-endian keys iterate in numeric id order.
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            loans.push(serde_json::from_slice(&value)?);
        }
        Ok(loans)
    }

    async fn events_since(&self, from: u64) -> Result<Vec<RecordedEvent>> {
        let cf = self.cf(CF_EVENTS)?;
        let start = from.to_be_bytes();
        let mut events = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (_key, value) = item?;
            events.push(serde_json::from_slice(&value)?);
        }
        Ok(events)
    }

    async fn commit(&self, write: LedgerWrite) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let found = self.meta().await?.map(|meta| meta.next_sequence);
        if found != write.expected_sequence {
            debug!(expected = ?write.expected_sequence, ?found, "rejecting stale write");
            return Err(LendingError::WriteConflict {
                expected: write.expected_sequence,
                found,
            });
        }

        let mut batch = WriteBatch::default();

        if let Some(loan) = &write.loan {
            debug!(loan_id = loan.id, status = %loan.status, "storing loan");
            batch.put_cf(
                self.cf(CF_LOANS)?,
                loan.id.to_be_bytes(),
                serde_json::to_vec(loan)?,
            );
        }
        if let Some(event) = &write.event {
            batch.put_cf(
                self.cf(CF_EVENTS)?,
                event.sequence.to_be_bytes(),
                serde_json::to_vec(event)?,
            );
        }
        batch.put_cf(self.cf(CF_META)?, META_KEY, serde_json::to_vec(&write.meta)?);

        self.db.write(&batch)?;
        Ok(())
    }
}
