//! Immutable value types shared across the scanner. Nothing here performs
//! I/O; construct once, never mutate.

use serde::{Deserialize, Serialize};

/// Which exchange a market lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Venue {
    Kalshi,
    Polymarket,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Kalshi => "Kalshi",
            Venue::Polymarket => "Polymarket",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary market on a single venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub venue: Venue,
    pub market_id: String,
    pub question: String,
    pub outcomes: (String, String),
}

impl Market {
    /// True iff `outcomes` is exactly `{yes, no}` case-insensitive, in either order.
    pub fn is_binary(&self) -> bool {
        let a = self.outcomes.0.to_lowercase();
        let b = self.outcomes.1.to_lowercase();
        let set: std::collections::BTreeSet<&str> = [a.as_str(), b.as_str()].into_iter().collect();
        set.len() == 2 && set.contains("yes") && set.contains("no")
    }

    /// Lowercased, whitespace-collapsed question text, used for the
    /// same-venue / self-test pairing fallback.
    pub fn normalized_question(&self) -> String {
        normalize_question(&self.question)
    }
}

pub fn normalize_question(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Top-of-book ask-side prices and sizes for a binary market. Prices are
/// probabilities in `[0, 1]`; `None` means the side is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookTop {
    pub best_yes_price: Option<f64>,
    pub best_yes_size: f64,
    pub best_no_price: Option<f64>,
    pub best_no_size: f64,
}

impl OrderBookTop {
    pub fn two_sided(&self) -> bool {
        self.best_yes_price.is_some() && self.best_no_price.is_some()
    }

    pub fn one_sided(&self) -> bool {
        self.best_yes_price.is_some() != self.best_no_price.is_some()
    }
}

/// A single point-in-time observation of a market's top-of-book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market: Market,
    pub book: OrderBookTop,
    pub ts: i64,
}

/// A curated cross-venue equivalence, loaded from a JSON file at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMapping {
    pub kalshi_ticker: String,
    pub polymarket_slug: String,
    #[serde(default)]
    pub polymarket_yes_token_id: Option<String>,
    #[serde(default)]
    pub polymarket_no_token_id: Option<String>,
}

/// Kind of pairing a signal was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    KalshiInternal,
    CrossVenue,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::KalshiInternal => "kalshi_internal",
            SignalKind::CrossVenue => "cross_venue",
        }
    }
}

/// Severity a computed edge was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Opportunity,
    NearMiss,
    Reject,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Opportunity => "opportunity",
            Classification::NearMiss => "near_miss",
            Classification::Reject => "reject",
        }
    }
}

/// An append-only record of a detected (or near-missed) arbitrage. Only
/// `Opportunity`- and `NearMiss`-classified signals are ever produced;
/// `classification` distinguishes them since only an `Opportunity` may be
/// paper-executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub ts: i64,
    pub kind: SignalKind,
    pub classification: Classification,
    pub a_venue: Venue,
    pub a_market_id: String,
    pub b_venue: Option<Venue>,
    pub b_market_id: Option<String>,
    pub sum_price: f64,
    pub raw_edge: f64,
    pub buf_edge: f64,
    pub exec_size: f64,
    pub details: String,
}

/// Which side of the hedge this leg buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Side {
    Yes,
    No,
}

/// One leg of a two-leg hedge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub venue: Venue,
    pub market_id: String,
    pub side: Side,
    pub price: f64,
    pub size_avail: f64,
}

/// A fully-specified hedge the paper executor is asked to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub kind: SignalKind,
    pub buf_edge: f64,
    pub sum_price: f64,
    pub size: f64,
    pub legs: (Leg, Leg),
    pub details: String,
}

/// Status of a simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
    Canceled,
}

/// A simulated two-leg hedge trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperTrade {
    pub trade_id: String,
    pub ts_open: i64,
    pub ts_close: Option<i64>,
    pub status: TradeStatus,
    pub kind: SignalKind,
    pub size: f64,
    pub sum_price: f64,
    pub buf_edge: f64,
    pub expected_profit: f64,
    pub legs: (Leg, Leg),
    pub details: String,
}

/// A single filled order making up one leg of a paper trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOrder {
    pub order_id: String,
    pub trade_id: String,
    pub ts: i64,
    pub venue: Venue,
    pub market_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub status: String,
    pub details: String,
}

/// Free/locked/realized balances for the paper ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaperBalances {
    pub free: f64,
    pub locked: f64,
    pub realized_pnl: f64,
}

/// Persisted position in the Kalshi universe iteration, surviving restarts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanCursor {
    pub cursor: usize,
    pub ts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(a: &str, b: &str) -> Market {
        Market {
            venue: Venue::Kalshi,
            market_id: "X".into(),
            question: "Q".into(),
            outcomes: (a.into(), b.into()),
        }
    }

    #[test]
    fn is_binary_accepts_case_insensitive_yes_no_either_order() {
        assert!(market("Yes", "No").is_binary());
        assert!(market("no", "yes").is_binary());
    }

    #[test]
    fn is_binary_rejects_other_outcomes() {
        assert!(!market("Over", "Under").is_binary());
        assert!(!market("Yes", "Yes").is_binary());
    }

    #[test]
    fn normalize_question_collapses_whitespace_and_case() {
        assert_eq!(normalize_question("  Will   It   RAIN? "), "will it rain?");
    }
}
