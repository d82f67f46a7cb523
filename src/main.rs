use clap::Parser;
use microlend::application::engine::LendingEngine;
use microlend::domain::identity::Identity;
use microlend::domain::ports::{ClockBox, LedgerStoreBox};
use microlend::infrastructure::clock::SystemClock;
use microlend::infrastructure::in_memory::InMemoryLedgerStore;
use microlend::interfaces::cli::{Cli, Commands, StorageArgs};
use microlend::interfaces::console::deployment::{write_deployment_report, write_log_banner};
use microlend::interfaces::console::event_printer::{EventPrinter, PrintingListener};
use microlend::interfaces::csv::loan_writer::LoanWriter;
use microlend::interfaces::csv::operation_reader::OperationReader;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity; logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            deployer,
            network,
            storage,
        } => {
            let (store, address) = open_store(&storage)?;
            let deployer = Identity::parse(deployer).into_diagnostic()?;
            let engine = LendingEngine::deploy(store, clock(), deployer, network)
                .await
                .into_diagnostic()?;

            let meta = engine.deployment().await.into_diagnostic()?;
            let stdout = io::stdout();
            write_deployment_report(&mut stdout.lock(), &meta, &address).into_diagnostic()?;
        }
        Commands::Run {
            input,
            deployer,
            network,
            storage,
            watch,
        } => {
            let (store, _address) = open_store(&storage)?;
            let deployer = Identity::parse(deployer).into_diagnostic()?;
            let mut engine = LendingEngine::open(store, clock(), deployer, network)
                .await
                .into_diagnostic()?;

            if watch {
                let next = engine.deployment().await.into_diagnostic()?.next_sequence;
                engine.subscribe(PrintingListener::new(EventPrinter::starting_at(
                    io::stderr(),
                    next,
                )));
            }

            let file = File::open(input).into_diagnostic()?;
            let reader = OperationReader::new(file);
            for command in reader.commands() {
                match command {
                    Ok(command) => match engine.execute(command).await {
                        Ok(_) => {}
                        Err(e) if e.is_rejection() => {
                            eprintln!("Error processing operation: {}", e);
                        }
                        // Storage failures leave the ledger in an unknown state; stop here.
                        Err(e) => return Err(e).into_diagnostic(),
                    },
                    Err(e) => {
                        eprintln!("Error reading operation: {}", e);
                    }
                }
            }

            let loans = engine.into_results().await.into_diagnostic()?;

            let stdout = io::stdout();
            let mut writer = LoanWriter::new(stdout.lock());
            writer.write_loans(loans).into_diagnostic()?;
        }
        Commands::Log { storage, from } => {
            let (store, address) = open_store(&storage)?;
            let engine = LendingEngine::attach(store, clock())
                .await
                .into_diagnostic()?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            let meta = engine.deployment().await.into_diagnostic()?;
            write_log_banner(&mut out, &meta, &address).into_diagnostic()?;

            let mut printer = EventPrinter::starting_at(out, from.max(1));
            for recorded in engine.events_since(from).await.into_diagnostic()? {
                printer.print(&recorded).into_diagnostic()?;
            }
        }
    }

    Ok(())
}

fn clock() -> ClockBox {
    Box::new(SystemClock)
}

/// Picks the storage backend and returns it with the address reported to the user.
fn open_store(storage: &StorageArgs) -> Result<(LedgerStoreBox, String)> {
    match &storage.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            use microlend::infrastructure::rocksdb::RocksDBStore;

            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            Ok((Box::new(store), db_path.display().to_string()))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok((Box::new(InMemoryLedgerStore::new()), "memory".to_string()))
        }
        None => Ok((Box::new(InMemoryLedgerStore::new()), "memory".to_string())),
    }
}
