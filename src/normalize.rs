//! Venue-agnostic price/shape normalization. Pure functions, no I/O — the
//! responsibility named in spec §4.1.

use crate::models::Market;

/// Why a raw payload failed to become a `MarketSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingPrices,
    MissingTokens,
    NotBinary,
    FetchError,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingPrices => "missing_prices",
            DropReason::MissingTokens => "missing_tokens",
            DropReason::NotBinary => "not_binary",
            DropReason::FetchError => "fetch_error",
        }
    }
}

/// Normalizes a raw venue price to a `[0, 1]` probability. Values reported
/// as integers greater than 1 are assumed to be cents and divided by 100;
/// everything else is clamped defensively.
pub fn normalize_price(raw: f64) -> f64 {
    let v = if raw > 1.0 { raw / 100.0 } else { raw };
    v.clamp(0.0, 1.0)
}

/// Derives ask-side prices from a bid-only book: `yes_ask = 1 - no_bid`,
/// `no_ask = 1 - yes_bid`. Used by venues whose public book only exposes
/// bids; not on the Kalshi hot path in this implementation (see
/// DESIGN.md, Open Question #1).
pub fn derive_asks_from_bids(
    yes_bid: Option<f64>,
    no_bid: Option<f64>,
) -> (Option<f64>, Option<f64>) {
    let yes_ask = no_bid.map(|b| (1.0 - b).clamp(0.0, 1.0));
    let no_ask = yes_bid.map(|b| (1.0 - b).clamp(0.0, 1.0));
    (yes_ask, no_ask)
}

/// Binary gate: a market must reach the evaluator only if it is binary.
pub fn check_binary(market: &Market) -> Result<(), DropReason> {
    if market.is_binary() {
        Ok(())
    } else {
        Err(DropReason::NotBinary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_price_divides_cents() {
        assert!((normalize_price(63.0) - 0.63).abs() < 1e-9);
    }

    #[test]
    fn normalize_price_passes_through_fractions() {
        assert!((normalize_price(0.63) - 0.63).abs() < 1e-9);
    }

    #[test]
    fn normalize_price_clamps() {
        assert_eq!(normalize_price(-5.0), 0.0);
    }

    #[test]
    fn derive_asks_from_bids_complements() {
        let (yes_ask, no_ask) = derive_asks_from_bids(Some(0.40), Some(0.55));
        assert!((yes_ask.unwrap() - 0.45).abs() < 1e-9);
        assert!((no_ask.unwrap() - 0.60).abs() < 1e-9);
    }

    #[test]
    fn derive_asks_from_bids_propagates_absence() {
        let (yes_ask, no_ask) = derive_asks_from_bids(None, Some(0.55));
        assert!(yes_ask.is_some());
        assert!(no_ask.is_none());
    }
}
