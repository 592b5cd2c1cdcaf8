//! Kalshi (Venue A) client. Grounded primarily on
//! `arb_scanner/sources/kalshi.py::KalshiProvider.fetch_market_snapshots`,
//! with pagination shape from `arb_scanner/kalshi_public.py::KalshiPublicClient`.
//!
//! Kalshi's market-list payload already carries top-of-book `yes_ask`/
//! `no_ask` fields, so this client never makes a second per-market
//! orderbook call — it reads prices straight off the list response
//! (Open Question #1, see DESIGN.md).

use crate::models::{Market, MarketSnapshot, OrderBookTop, Venue};
use crate::normalize::normalize_price;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
const PAGE_SLEEP: Duration = Duration::from_millis(200);

/// Prefixes blacklisted as multi-game/umbrella "MVE" markets — these do not
/// represent a single binary event and must be expanded into their legs.
const MVE_PREFIXES: [&str; 2] = ["KXMVE", "KXMVESPORTS"];
const MVE_SUBSTRING: &str = "MULTIGAMEEXTENDED";

#[derive(Debug, Clone, Deserialize)]
pub struct MveLeg {
    pub market_ticker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMarket {
    pub ticker: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub yes_ask: Option<f64>,
    #[serde(default)]
    pub no_ask: Option<f64>,
    #[serde(default)]
    pub yes_ask_qty: Option<f64>,
    #[serde(default)]
    pub no_ask_qty: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub mve_selected_legs: Option<Vec<MveLeg>>,
}

#[derive(Debug, Deserialize)]
struct MarketsPage {
    markets: Vec<RawMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

/// The selected universe for this scan cycle: the ticker list to iterate
/// (with MVE umbrellas already expanded into their legs) and a lookup back
/// to the raw payload for each ticker.
pub struct KalshiUniverse {
    pub tickers: Vec<String>,
    pub raw_by_ticker: HashMap<String, RawMarket>,
}

/// Per-iteration drop/keep counters, matching the Python original's stats
/// line verbatim (`total/ok/missing/noprices/liqskip/one_sided/two_sided`).
#[derive(Debug, Default, Clone, Copy)]
pub struct KalshiStats {
    pub total: usize,
    pub ok: usize,
    pub missing: usize,
    pub noprices: usize,
    pub liqskip: usize,
    pub one_sided: usize,
    pub two_sided: usize,
}

pub struct KalshiClient {
    http: reqwest::Client,
    base_url: String,
    pages: u32,
    limit: u32,
    min_liq: f64,
    require_two_sided: bool,
    min_after_blacklist: usize,
    min_active: usize,
    max_tickers: usize,
}

impl KalshiClient {
    pub fn new(cfg: &crate::config::Config) -> Self {
        KalshiClient {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(12))
                .connect_timeout(Duration::from_secs(3))
                .build()
                .expect("reqwest client"),
            base_url: BASE_URL.to_string(),
            pages: cfg.kalshi_pages,
            limit: cfg.kalshi_limit,
            min_liq: cfg.kalshi_min_liq,
            require_two_sided: cfg.kalshi_require_two_sided,
            min_after_blacklist: cfg.kalshi_min_after_blacklist,
            min_active: cfg.kalshi_min_active,
            max_tickers: cfg.kalshi_max_tickers,
        }
    }

    /// Paginates `/markets?status=open`, following `cursor` until the
    /// server stops returning one or `max_pages` is hit.
    async fn list_open_markets(&self) -> Result<Vec<RawMarket>> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..self.pages {
            let mut url = format!(
                "{}/markets?status=open&limit={}",
                self.base_url, self.limit
            );
            if let Some(c) = &cursor {
                url.push_str(&format!("&cursor={}", c));
            }
            let page: MarketsPage = self
                .http
                .get(&url)
                .send()
                .await
                .context("GET /markets")?
                .error_for_status()
                .context("GET /markets returned error status")?
                .json()
                .await
                .context("decoding /markets response")?;

            let next_cursor = page.cursor.clone();
            out.extend(page.markets);

            match next_cursor {
                Some(c) if !c.is_empty() => {
                    cursor = Some(c);
                    tokio::time::sleep(PAGE_SLEEP).await;
                }
                _ => break,
            }
        }
        Ok(out)
    }

    fn is_mve(ticker: &str) -> bool {
        MVE_PREFIXES.iter().any(|p| ticker.starts_with(p)) || ticker.contains(MVE_SUBSTRING)
    }

    fn active_key(m: &RawMarket) -> Option<f64> {
        m.volume_24h.or(m.volume).or(m.open_interest)
    }

    /// Blacklist filtering, active-market restriction, and MVE leg
    /// expansion, matching `KalshiProvider.fetch_market_snapshots`'s
    /// universe-selection pass.
    fn select_universe(&self, raw: Vec<RawMarket>) -> KalshiUniverse {
        let by_ticker: HashMap<String, RawMarket> =
            raw.iter().map(|m| (m.ticker.clone(), m.clone())).collect();

        let filtered: Vec<&RawMarket> =
            raw.iter().filter(|m| !Self::is_mve(&m.ticker)).collect();
        let candidates: Vec<&RawMarket> = if filtered.len() < self.min_after_blacklist {
            tracing::warn!(
                filtered = filtered.len(),
                min = self.min_after_blacklist,
                "blacklist filter too aggressive, reverting to unfiltered universe"
            );
            raw.iter().collect()
        } else {
            filtered
        };

        let mut active: Vec<&RawMarket> =
            candidates.iter().filter(|m| Self::active_key(m).is_some()).copied().collect();
        let selected: Vec<&RawMarket> = if active.len() >= self.min_active {
            active.sort_by(|a, b| {
                Self::active_key(b)
                    .partial_cmp(&Self::active_key(a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            active
        } else {
            candidates
        };

        let mut tickers = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for m in selected.into_iter().take(self.max_tickers) {
            if let Some(legs) = &m.mve_selected_legs {
                for leg in legs {
                    if seen.insert(leg.market_ticker.clone()) {
                        tickers.push(leg.market_ticker.clone());
                    }
                }
            } else if seen.insert(m.ticker.clone()) {
                tickers.push(m.ticker.clone());
            }
        }

        KalshiUniverse { tickers, raw_by_ticker: by_ticker }
    }

    /// Fetches and normalizes the current Kalshi universe.
    pub async fn fetch_universe(&self) -> Result<KalshiUniverse> {
        let raw = self.list_open_markets().await?;
        Ok(self.select_universe(raw))
    }

    /// Builds snapshots for a batch of tickers, a pure function over an
    /// already-fetched universe (no network calls — the list payload
    /// carries everything needed).
    pub fn snapshot_batch(
        &self,
        tickers: &[String],
        raw_by_ticker: &HashMap<String, RawMarket>,
        ts: i64,
    ) -> (Vec<MarketSnapshot>, KalshiStats) {
        let mut stats = KalshiStats::default();
        let mut out = Vec::new();

        for ticker in tickers {
            stats.total += 1;
            let raw = match raw_by_ticker.get(ticker) {
                Some(r) => r,
                None => {
                    stats.missing += 1;
                    continue;
                }
            };

            let (yes_ask, no_ask) = match (raw.yes_ask, raw.no_ask) {
                (Some(y), Some(n)) => (y, n),
                _ => {
                    stats.noprices += 1;
                    continue;
                }
            };

            let yes_price = normalize_price(yes_ask);
            let no_price = normalize_price(no_ask);
            let yes_size = raw.yes_ask_qty.unwrap_or(0.0);
            let no_size = raw.no_ask_qty.unwrap_or(0.0);

            if self.require_two_sided && (yes_size <= 0.0 || no_size <= 0.0) {
                stats.noprices += 1;
                continue;
            }
            if yes_size.min(no_size) < self.min_liq {
                stats.liqskip += 1;
                continue;
            }

            let book = OrderBookTop {
                best_yes_price: Some(yes_price),
                best_yes_size: yes_size,
                best_no_price: Some(no_price),
                best_no_size: no_size,
            };
            if book.two_sided() {
                stats.two_sided += 1;
            } else if book.one_sided() {
                stats.one_sided += 1;
            }
            stats.ok += 1;

            out.push(MarketSnapshot {
                market: Market {
                    venue: Venue::Kalshi,
                    market_id: ticker.clone(),
                    question: raw.title.clone().unwrap_or_else(|| ticker.clone()),
                    outcomes: ("Yes".to_string(), "No".to_string()),
                },
                book,
                ts,
            });
        }

        tracing::info!(
            total = stats.total,
            ok = stats.ok,
            missing = stats.missing,
            noprices = stats.noprices,
            liqskip = stats.liqskip,
            one_sided = stats.one_sided,
            two_sided = stats.two_sided,
            "KalshiClient stats"
        );

        (out, stats)
    }
}

#[async_trait]
impl super::VenueClient for KalshiClient {
    fn name(&self) -> &'static str {
        "Kalshi"
    }

    async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>> {
        let universe = self.fetch_universe().await?;
        let ts = crate::daemon::now_secs();
        let (snaps, _stats) = self.snapshot_batch(&universe.tickers, &universe.raw_by_ticker, ts);
        Ok(snaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(ticker: &str, yes_ask: Option<f64>, no_ask: Option<f64>) -> RawMarket {
        RawMarket {
            ticker: ticker.to_string(),
            title: None,
            yes_ask,
            no_ask,
            yes_ask_qty: Some(10.0),
            no_ask_qty: Some(10.0),
            volume_24h: Some(100.0),
            volume: None,
            open_interest: None,
            mve_selected_legs: None,
        }
    }

    #[test]
    fn mve_prefix_detection() {
        assert!(KalshiClient::is_mve("KXMVESPORTS-26"));
        assert!(KalshiClient::is_mve("FOO-MULTIGAMEEXTENDED-BAR"));
        assert!(!KalshiClient::is_mve("KXSB-26-NE"));
    }

    #[test]
    fn snapshot_batch_skips_missing_prices() {
        let client = KalshiClient::new(&crate::config::Config::from_env());
        let mut by_ticker = HashMap::new();
        by_ticker.insert("A".to_string(), market("A", None, Some(0.5)));
        let (snaps, stats) = client.snapshot_batch(&["A".to_string()], &by_ticker, 0);
        assert!(snaps.is_empty());
        assert_eq!(stats.noprices, 1);
    }

    #[test]
    fn snapshot_batch_normalizes_cents_to_probability() {
        let client = KalshiClient::new(&crate::config::Config::from_env());
        let mut by_ticker = HashMap::new();
        by_ticker.insert("A".to_string(), market("A", Some(63.0), Some(40.0)));
        let (snaps, stats) = client.snapshot_batch(&["A".to_string()], &by_ticker, 0);
        assert_eq!(stats.ok, 1);
        assert!((snaps[0].book.best_yes_price.unwrap() - 0.63).abs() < 1e-9);
    }
}
