//! Domain model of the lending ledger: identities, money, loans, events and
//! the ports the engine uses to reach storage and time.

pub mod event;
pub mod identity;
pub mod loan;
pub mod money;
pub mod ports;
