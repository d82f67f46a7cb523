use crate::domain::identity::Identity;
use crate::domain::loan::LoanId;
use crate::domain::money::InterestRate;
use rust_decimal::Decimal;

/// One invocation of an engine operation, with the acting identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RequestLoan {
        borrower: Identity,
        principal: Decimal,
        interest_rate: InterestRate,
        duration: u64,
    },
    FundLoan {
        lender: Identity,
        loan_id: LoanId,
        amount: Decimal,
    },
    RepayLoan {
        borrower: Identity,
        loan_id: LoanId,
        amount: Decimal,
    },
    TransferOwnership {
        caller: Identity,
        new_owner: Identity,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RequestLoan { .. } => "request_loan",
            Command::FundLoan { .. } => "fund_loan",
            Command::RepayLoan { .. } => "repay_loan",
            Command::TransferOwnership { .. } => "transfer_ownership",
        }
    }

    pub fn caller(&self) -> &Identity {
        match self {
            Command::RequestLoan { borrower, .. } | Command::RepayLoan { borrower, .. } => borrower,
            Command::FundLoan { lender, .. } => lender,
            Command::TransferOwnership { caller, .. } => caller,
        }
    }
}
