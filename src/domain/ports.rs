use super::event::RecordedEvent;
use super::identity::Identity;
use super::loan::{FIRST_LOAN_ID, Loan, LoanId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Ledger-wide state that is not attached to a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMeta {
    pub owner: Identity,
    pub next_loan_id: LoanId,
    pub next_sequence: u64,
    pub deployer: Identity,
    pub deployed_at: i64,
    pub network: String,
}

impl LedgerMeta {
    pub fn genesis(deployer: Identity, network: impl Into<String>, deployed_at: i64) -> Self {
        Self {
            owner: deployer.clone(),
            next_loan_id: FIRST_LOAN_ID,
            next_sequence: 1,
            deployer,
            deployed_at,
            network: network.into(),
        }
    }
}

/// Everything a single operation changes, applied by the store as one unit.
///
/// `expected_sequence` is the `next_sequence` of the metadata the write was
/// validated against, or `None` for the write that creates the ledger. The
/// store refuses the write with `WriteConflict` if its current metadata no
/// longer matches.
#[derive(Debug, Clone)]
pub struct LedgerWrite {
    pub expected_sequence: Option<u64>,
    pub meta: LedgerMeta,
    pub loan: Option<Loan>,
    pub event: Option<RecordedEvent>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn meta(&self) -> Result<Option<LedgerMeta>>;
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>>;
    /// All loans ordered by id, which is also creation order.
    async fn loans(&self) -> Result<Vec<Loan>>;
    /// Recorded events with `sequence >= from`, in emission order.
    async fn events_since(&self, from: u64) -> Result<Vec<RecordedEvent>>;
    /// Atomically applies `write`: either all of it becomes visible or none of it.
    ///
    /// Implementations check `write.expected_sequence` against the stored
    /// metadata inside the same critical section that applies the write.
    async fn commit(&self, write: LedgerWrite) -> Result<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type LedgerStoreFactory = Box<dyn Fn() -> LedgerStoreBox + Send + Sync>;

/// Source of the current unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub type ClockBox = Box<dyn Clock>;

/// Synchronous hook invoked after each successful commit, in emission order.
///
/// Listeners observe; they cannot reach back into the ledger.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RecordedEvent);
}

pub type EventListenerBox = Box<dyn EventListener>;

impl EventListener for tokio::sync::mpsc::UnboundedSender<RecordedEvent> {
    fn on_event(&self, event: &RecordedEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(event.clone());
    }
}
