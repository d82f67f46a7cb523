//! Human-readable console output for the deployment report and the event log.

pub mod deployment;
pub mod event_printer;

/// Name under which the ledger is deployed and reported.
pub const CONTRACT_NAME: &str = "MicrofinanceLendingPlatform";

pub const RULE: &str = "--------------------------------------------";
