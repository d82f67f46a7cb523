//! Application layer containing the loan lifecycle orchestration.
//!
//! This module defines the `LendingEngine`, the single entry point through which
//! loans are requested, funded and repaid and ownership is transferred. All
//! operations are serialized behind one lock so each call applies atomically.

pub mod command;
pub mod engine;
