use crate::domain::loan::Loan;
use crate::error::Result;
use std::io::Write;

/// Writes loans as CSV with the header
/// `id,borrower,lender,principal,interest_rate,duration,funded_at,status`.
pub struct LoanWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LoanWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_loans(&mut self, loans: impl IntoIterator<Item = Loan>) -> Result<()> {
        for loan in loans {
            self.writer.serialize(loan)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Identity;
    use crate::domain::money::{Amount, InterestRate};
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_requested_and_funded_loans() {
        let alice = Identity::parse("alice").unwrap();
        let requested = Loan::new(
            1,
            alice.clone(),
            Amount::new(dec!(1000)).unwrap(),
            InterestRate::new(10),
            3600,
        );
        let mut funded = Loan::new(
            2,
            alice,
            Amount::new(dec!(250)).unwrap(),
            InterestRate::ZERO,
            60,
        );
        funded.fund(Identity::parse("bob").unwrap(), 1_700_000_000);

        let mut buffer = Vec::new();
        LoanWriter::new(&mut buffer)
            .write_loans(vec![requested, funded])
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "id,borrower,lender,principal,interest_rate,duration,funded_at,status",
                "1,alice,,1000,10,3600,,requested",
                "2,alice,bob,250,0,60,1700000000,funded",
            ]
        );
    }

    #[test]
    fn test_write_no_loans() {
        let mut buffer = Vec::new();
        LoanWriter::new(&mut buffer).write_loans(Vec::new()).unwrap();
        assert!(buffer.is_empty());
    }
}
