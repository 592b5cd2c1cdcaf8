//! Venue client capability contract. Grounded on
//! `arb_scanner/sources/base.py::MarketDataProvider`: two independent venue
//! clients satisfy the same trait rather than sharing a base class.

pub mod kalshi;
pub mod polymarket;

use crate::models::MarketSnapshot;
use async_trait::async_trait;

/// A venue-agnostic source of market snapshots.
#[async_trait]
pub trait VenueClient {
    fn name(&self) -> &'static str;

    /// Fetches and normalizes a batch of snapshots. Drop reasons are logged
    /// internally with counters; this call itself only fails on a fetch-level
    /// error that prevented *any* progress for the batch.
    async fn fetch_snapshots(&self) -> anyhow::Result<Vec<MarketSnapshot>>;
}

pub use kalshi::KalshiClient;
pub use polymarket::PolymarketClient;
