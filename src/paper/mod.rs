//! Paper-trading simulator: free/locked balances persisted through
//! [`crate::storage::Storage`], never an in-memory-only ledger.

pub mod executor;

pub use executor::{PaperConfig, PaperExecutor, RejectReason};
