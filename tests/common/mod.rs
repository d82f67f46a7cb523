#![allow(dead_code)]

use microlend::application::engine::LendingEngine;
use microlend::domain::identity::Identity;
use microlend::infrastructure::clock::FixedClock;
use microlend::infrastructure::in_memory::InMemoryLedgerStore;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const OWNER: &str = "owner";

pub fn id(name: &str) -> Identity {
    Identity::parse(name).unwrap()
}

pub async fn engine_with_clock(clock: FixedClock) -> LendingEngine {
    LendingEngine::deploy(
        Box::new(InMemoryLedgerStore::new()),
        Box::new(clock),
        id(OWNER),
        "localhost",
    )
    .await
    .unwrap()
}

pub async fn engine() -> LendingEngine {
    engine_with_clock(FixedClock::new(1_700_000_000)).await
}

/// Writes `loans` full request/fund/repay cycles, each with its own borrower
/// and lender and a principal of `100 * n`.
pub fn generate_csv(path: &Path, loans: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record([
        "op", "caller", "loan", "amount", "rate", "duration", "new_owner",
    ])?;

    for n in 1..=loans {
        let borrower = format!("borrower-{}", n);
        let lender = format!("lender-{}", n);
        let principal = 100 * n;
        let due = principal + principal * 5 / 100;
        let loan = n.to_string();

        wtr.write_record(["request", &borrower, "", &principal.to_string(), "5", "86400", ""])?;
        wtr.write_record(["fund", &lender, &loan, &principal.to_string(), "", "", ""])?;
        wtr.write_record(["repay", &borrower, &loan, &due.to_string(), "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
