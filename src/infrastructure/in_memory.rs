use crate::domain::event::RecordedEvent;
use crate::domain::loan::{Loan, LoanId};
use crate::domain::ports::{LedgerMeta, LedgerStore, LedgerWrite};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct LedgerState {
    meta: Option<LedgerMeta>,
    loans: BTreeMap<LoanId, Loan>,
    events: Vec<RecordedEvent>,
}

/// A thread-safe in-memory ledger.
///
/// Uses `Arc<RwLock<..>>` so clones share the same state. Loans are kept in a
/// `BTreeMap` keyed by id, which matches creation order since ids only grow.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn meta(&self) -> Result<Option<LedgerMeta>> {
        let state = self.state.read().await;
        Ok(state.meta.clone())
    }

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        let state = self.state.read().await;
        Ok(state.loans.get(&id).cloned())
    }

    async fn loans(&self) -> Result<Vec<Loan>> {
        let state = self.state.read().await;
        Ok(state.loans.values().cloned().collect())
    }

    async fn events_since(&self, from: u64) -> Result<Vec<RecordedEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|recorded| recorded.sequence >= from)
            .cloned()
            .collect())
    }

    async fn commit(&self, write: LedgerWrite) -> Result<()> {
        let mut state = self.state.write().await;
        let found = state.meta.as_ref().map(|meta| meta.next_sequence);
        if found != write.expected_sequence {
            debug!(expected = ?write.expected_sequence, ?found, "rejecting stale write");
            return Err(LendingError::WriteConflict {
                expected: write.expected_sequence,
                found,
            });
        }
        if let Some(loan) = write.loan {
            debug!(loan_id = loan.id, status = %loan.status, "storing loan");
            state.loans.insert(loan.id, loan);
        }
        if let Some(event) = write.event {
            state.events.push(event);
        }
        state.meta = Some(write.meta);
        Ok(())
    }
}
