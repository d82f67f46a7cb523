use super::RULE;
use crate::domain::event::{LoanEvent, RecordedEvent};
use crate::domain::ports::EventListener;
use crate::error::{LendingError, Result};
use std::io::Write;
use std::sync::Mutex;
use tracing::warn;

/// Renders recorded events as human-readable blocks.
///
/// Events must arrive in sequence order. A sequence number that was already
/// printed is skipped; a jump past the expected number is reported as a gap.
pub struct EventPrinter<W: Write> {
    writer: W,
    next_sequence: u64,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self::starting_at(writer, 1)
    }

    pub fn starting_at(writer: W, next_sequence: u64) -> Self {
        Self {
            writer,
            next_sequence,
        }
    }

    /// Prints `recorded`, returning `false` if it was a duplicate and skipped.
    pub fn print(&mut self, recorded: &RecordedEvent) -> Result<bool> {
        if recorded.sequence < self.next_sequence {
            return Ok(false);
        }
        if recorded.sequence > self.next_sequence {
            return Err(LendingError::EventGap {
                expected: self.next_sequence,
                found: recorded.sequence,
            });
        }

        self.render(&recorded.event)?;
        writeln!(self.writer, "{}", RULE)?;
        self.writer.flush()?;
        self.next_sequence += 1;
        Ok(true)
    }

    fn render(&mut self, event: &LoanEvent) -> std::io::Result<()> {
        let w = &mut self.writer;
        match event {
            LoanEvent::LoanRequested {
                id,
                borrower,
                amount,
                interest_rate,
                duration,
            } => {
                writeln!(w, "Loan Requested:")?;
                writeln!(w, "ID: {}", id)?;
                writeln!(w, "Borrower: {}", borrower)?;
                writeln!(w, "Amount: {}", amount)?;
                writeln!(w, "Interest Rate: {}%", interest_rate)?;
                writeln!(w, "Duration: {} sec", duration)
            }
            LoanEvent::LoanFunded { id, lender, amount } => {
                writeln!(w, "Loan Funded:")?;
                writeln!(w, "ID: {}", id)?;
                writeln!(w, "Lender: {}", lender)?;
                writeln!(w, "Amount: {}", amount)
            }
            LoanEvent::LoanRepaid {
                id,
                borrower,
                total_amount,
            } => {
                writeln!(w, "Loan Repaid:")?;
                writeln!(w, "ID: {}", id)?;
                writeln!(w, "Borrower: {}", borrower)?;
                writeln!(w, "Total Repaid: {}", total_amount)
            }
            LoanEvent::OwnerChanged {
                old_owner,
                new_owner,
            } => {
                writeln!(w, "Owner Changed:")?;
                writeln!(w, "Old Owner: {}", old_owner)?;
                writeln!(w, "New Owner: {}", new_owner)
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Adapts an [`EventPrinter`] into an engine listener for live output.
pub struct PrintingListener<W: Write + Send> {
    printer: Mutex<EventPrinter<W>>,
}

impl<W: Write + Send> PrintingListener<W> {
    pub fn new(printer: EventPrinter<W>) -> Self {
        Self {
            printer: Mutex::new(printer),
        }
    }
}

impl<W: Write + Send> EventListener for PrintingListener<W> {
    fn on_event(&self, event: &RecordedEvent) {
        let mut printer = match self.printer.lock() {
            Ok(printer) => printer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = printer.print(event) {
            warn!(sequence = event.sequence, error = %e, "failed to print event");
        }
    }
}
