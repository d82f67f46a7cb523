use super::identity::Identity;
use super::loan::LoanId;
use super::money::{Amount, InterestRate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain events emitted by the engine, one per successful operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoanEvent {
    LoanRequested {
        id: LoanId,
        borrower: Identity,
        amount: Amount,
        interest_rate: InterestRate,
        duration: u64,
    },
    LoanFunded {
        id: LoanId,
        lender: Identity,
        amount: Amount,
    },
    LoanRepaid {
        id: LoanId,
        borrower: Identity,
        total_amount: Decimal,
    },
    OwnerChanged {
        old_owner: Identity,
        new_owner: Identity,
    },
}

impl LoanEvent {
    /// The event name as subscribers know it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoanRequested { .. } => "LoanRequested",
            Self::LoanFunded { .. } => "LoanFunded",
            Self::LoanRepaid { .. } => "LoanRepaid",
            Self::OwnerChanged { .. } => "OwnerChanged",
        }
    }

    /// The loan this event concerns, if any.
    pub fn loan_id(&self) -> Option<LoanId> {
        match self {
            Self::LoanRequested { id, .. }
            | Self::LoanFunded { id, .. }
            | Self::LoanRepaid { id, .. } => Some(*id),
            Self::OwnerChanged { .. } => None,
        }
    }
}

/// An event together with its position in the ledger's event log.
///
/// Sequence numbers start at 1 and have no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub timestamp: i64,
    pub event: LoanEvent,
}
