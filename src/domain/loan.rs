use super::identity::Identity;
use super::money::{Amount, InterestRate, total_due};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type LoanId = u64;

/// The first id handed out by a freshly deployed ledger.
pub const FIRST_LOAN_ID: LoanId = 1;

/// Lifecycle of a single loan: `Requested -> Funded -> Repaid`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Requested,
    Funded,
    Repaid,
}

impl LoanStatus {
    pub fn is_terminal(&self) -> bool {
        *self == LoanStatus::Repaid
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Funded => "funded",
            LoanStatus::Repaid => "repaid",
        };
        f.write_str(label)
    }
}

/// A loan as recorded in the ledger.
///
/// Terms (`principal`, `interest_rate`, `duration`) are fixed at creation.
/// Only `lender`, `funded_at` and `status` change afterwards, and only
/// through [`Loan::fund`] and [`Loan::repay`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: Identity,
    pub lender: Option<Identity>,
    pub principal: Amount,
    pub interest_rate: InterestRate,
    /// Seconds the loan stays open for repayment once funded.
    pub duration: u64,
    /// Unix timestamp (seconds) at which the loan was funded.
    pub funded_at: Option<i64>,
    pub status: LoanStatus,
}

impl Loan {
    pub fn new(
        id: LoanId,
        borrower: Identity,
        principal: Amount,
        interest_rate: InterestRate,
        duration: u64,
    ) -> Self {
        Self {
            id,
            borrower,
            lender: None,
            principal,
            interest_rate,
            duration,
            funded_at: None,
            status: LoanStatus::Requested,
        }
    }

    /// Principal plus truncated interest, or `None` if the computation overflows.
    pub fn total_due(&self) -> Option<Decimal> {
        total_due(self.principal, self.interest_rate)
    }

    /// End of the repayment window, once funded.
    pub fn due_at(&self) -> Option<i64> {
        let funded_at = self.funded_at?;
        let duration = i64::try_from(self.duration).ok()?;
        funded_at.checked_add(duration)
    }

    /// Whether a funded loan has passed its repayment window.
    ///
    /// Informational only: an overdue loan stays `Funded` and can still be repaid.
    pub fn is_overdue(&self, now: i64) -> bool {
        self.status == LoanStatus::Funded && self.due_at().is_some_and(|due| now > due)
    }

    /// Moves the loan to `Funded`. Callers validate preconditions first.
    pub fn fund(&mut self, lender: Identity, now: i64) {
        self.lender = Some(lender);
        self.funded_at = Some(now);
        self.status = LoanStatus::Funded;
    }

    /// Moves the loan to its terminal `Repaid` state.
    pub fn repay(&mut self) {
        self.status = LoanStatus::Repaid;
    }
}
