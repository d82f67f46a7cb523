use crate::domain::loan::{LoanId, LoanStatus};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LendingError {
    #[error("Principal must be a positive whole number of base units, got {0}")]
    InvalidAmount(Decimal),
    #[error("Duration must be greater than zero")]
    InvalidDuration,
    #[error("Loan {0} not found")]
    NotFound(LoanId),
    #[error("Loan {id} is {actual}, expected {expected}")]
    InvalidState {
        id: LoanId,
        expected: LoanStatus,
        actual: LoanStatus,
    },
    #[error("Supplied amount {supplied} does not match required {required}")]
    AmountMismatch { required: Decimal, supplied: Decimal },
    #[error("Borrower may not fund their own loan {0}")]
    SelfFundingForbidden(LoanId),
    #[error("Only the borrower may repay loan {0}")]
    NotBorrower(LoanId),
    #[error("Caller is not the current owner")]
    Unauthorized,
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Arithmetic overflow computing amount due for loan {0}")]
    ArithmeticOverflow(LoanId),
    #[error("No ledger has been deployed in this store")]
    NotDeployed,
    #[error("A ledger is already deployed in this store")]
    AlreadyDeployed,
    #[error("Stale ledger write: expected sequence {expected:?}, found {found:?}")]
    WriteConflict {
        expected: Option<u64>,
        found: Option<u64>,
    },
    #[error("Event log gap: expected sequence {expected}, found {found}")]
    EventGap { expected: u64, found: u64 },
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl LendingError {
    /// True for errors caused by the caller's input or the ledger's state,
    /// as opposed to storage or I/O failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidDuration
                | Self::NotFound(_)
                | Self::InvalidState { .. }
                | Self::AmountMismatch { .. }
                | Self::SelfFundingForbidden(_)
                | Self::NotBorrower(_)
                | Self::Unauthorized
                | Self::InvalidIdentity(_)
                | Self::ArithmeticOverflow(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;
