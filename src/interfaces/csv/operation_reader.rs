use crate::application::command::Command;
use crate::domain::identity::Identity;
use crate::domain::loan::LoanId;
use crate::domain::money::InterestRate;
use crate::error::{LendingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Request,
    Fund,
    Repay,
    TransferOwnership,
}

/// One row of an operations file: `op, caller, loan, amount, rate, duration, new_owner`.
///
/// Columns an operation does not use are left empty.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OperationType,
    pub caller: String,
    pub loan: Option<LoanId>,
    /// Parsed from the literal text so base-unit amounts beyond `u64` stay exact.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    /// Signed so a negative value reaches the same checks as any other bad term.
    pub rate: Option<i64>,
    pub duration: Option<i64>,
    pub new_owner: Option<String>,
}

impl OperationRecord {
    pub fn into_command(self) -> Result<Command> {
        let caller = Identity::parse(self.caller)?;
        let command = match self.op {
            OperationType::Request => Command::RequestLoan {
                borrower: caller,
                principal: required(self.amount, "amount")?,
                interest_rate: interest_rate(required(self.rate, "rate")?)?,
                duration: u64::try_from(required(self.duration, "duration")?)
                    .map_err(|_| LendingError::InvalidDuration)?,
            },
            OperationType::Fund => Command::FundLoan {
                lender: caller,
                loan_id: required(self.loan, "loan")?,
                amount: required(self.amount, "amount")?,
            },
            OperationType::Repay => Command::RepayLoan {
                borrower: caller,
                loan_id: required(self.loan, "loan")?,
                amount: required(self.amount, "amount")?,
            },
            OperationType::TransferOwnership => Command::TransferOwnership {
                caller,
                new_owner: Identity::parse(self.new_owner.unwrap_or_default())?,
            },
        };
        Ok(command)
    }
}

fn interest_rate(percent: i64) -> Result<InterestRate> {
    u32::try_from(percent).map(InterestRate::new).map_err(|_| {
        LendingError::InvalidOperation(format!("interest rate {}% is out of range", percent))
    })
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| LendingError::InvalidOperation(format!("missing {} column", column)))
}

/// Reads engine commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// and yields one `Result<Command>` per row so a bad row never stops the stream.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads rows and converts them into commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|result| result.map_err(LendingError::from)?.into_command())
    }
}
