//! Loads the curated cross-venue mapping list and resolves any missing
//! Polymarket token ids at startup.

use crate::models::MarketMapping;
use crate::venues::polymarket::PolymarketClient;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Reads the mapping file. Grounded on `arb_scanner/mappings.py::load_manual_mappings`.
pub fn load_mappings(path: &Path) -> Result<Vec<MarketMapping>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading mapping file at {}", path.display()))?;
    let mappings: Vec<MarketMapping> =
        serde_json::from_str(&raw).with_context(|| "parsing mapping file as JSON")?;
    Ok(mappings)
}

/// Fills in any missing Polymarket token ids via a one-shot Gamma lookup.
/// Fatal (mirrors the Python original's `SystemExit(2)`) if any mapping's
/// slug cannot be resolved to a token pair — running with an unresolvable
/// mapping would silently drop that leg of the universe forever.
pub async fn resolve_polymarket_tokens(
    mappings: &mut [MarketMapping],
    client: &PolymarketClient,
) -> Result<()> {
    for m in mappings.iter_mut() {
        if m.polymarket_yes_token_id.is_some() && m.polymarket_no_token_id.is_some() {
            continue;
        }
        let resolved = client
            .resolve_slug_to_tokens(&m.polymarket_slug)
            .await
            .with_context(|| format!("resolving tokens for slug {}", m.polymarket_slug))?;
        match resolved {
            Some((yes, no)) => {
                m.polymarket_yes_token_id = Some(yes);
                m.polymarket_no_token_id = Some(no);
            }
            None => {
                bail!(
                    "could not resolve Polymarket tokens for mapping {} -> {}",
                    m.kalshi_ticker,
                    m.polymarket_slug
                );
            }
        }
    }
    Ok(())
}
