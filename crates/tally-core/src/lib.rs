//! Core types, reconciliation engine and mutation coordinator for the Tally
//! production ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::LedgerStore`]; everything above them
//! goes through [`ledger::Ledger`].

pub mod entry;
pub mod error;
pub mod job;
pub mod ledger;
pub mod memory;
pub mod reconcile;
pub mod store;

pub use error::{Error, Result};
pub use ledger::{CapacityPolicy, Ledger};
