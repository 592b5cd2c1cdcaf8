//! Read-only, dry-run cross-venue arbitrage scanner for binary prediction
//! markets on Kalshi and Polymarket.
//!
//! This crate never places real orders. It samples top-of-book prices from
//! both venues, evaluates hedge cost against a fee buffer, records signals
//! and snapshots to SQLite, and optionally simulates execution against a
//! paper-trading ledger.

pub mod config;
pub mod control_plane;
pub mod cursor;
pub mod daemon;
pub mod evaluator;
pub mod mapping;
pub mod models;
pub mod normalize;
pub mod paper;
pub mod storage;
pub mod venues;

pub use config::Config;
pub use models::{
    Market, MarketMapping, MarketSnapshot, OrderBookTop, PaperBalances, PaperTrade, ScanCursor,
    Signal, SignalKind, Venue,
};
