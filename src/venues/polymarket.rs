//! Polymarket (Venue B) client. Grounded on
//! `arb_scanner/sources/polymarket.py::PolymarketProvider` (mapping
//! iteration, token cache) and `arb_scanner/polymarket_public.py`
//! (`_get_json` retry shape, Gamma token resolution). The retry-loop
//! structure follows the teacher's
//! `src/scrapers/polymarket_api.rs::execute_with_retry`/`RateLimiter`.
//!
//! Resolves Open Question #2: prefer the CLOB orderbook's best ask; fall
//! back to Gamma metadata price (size forced to 0) when the orderbook is
//! empty or inaccessible — a fallback the Python original does not have.

use crate::models::{Market, MarketMapping, MarketSnapshot, OrderBookTop, Venue};
use crate::normalize::normalize_price;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const CLOB_HOST: &str = "https://clob.polymarket.com";
const GAMMA_HOST: &str = "https://gamma-api.polymarket.com";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, Deserialize)]
struct BookLevel {
    #[serde(deserialize_with = "de_f64")]
    price: f64,
    #[serde(deserialize_with = "de_f64")]
    size: f64,
}

fn de_f64<'de, D>(d: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        S(String),
        F(f64),
    }
    match StrOrNum::deserialize(d)? {
        StrOrNum::S(s) => s.parse().map_err(serde::de::Error::custom),
        StrOrNum::F(f) => Ok(f),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OrderBookResponse {
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
struct GammaMarket {
    #[serde(rename = "clobTokenIds", default)]
    clob_token_ids: Option<serde_json::Value>,
    #[serde(rename = "outcomePrices", default)]
    outcome_prices: Option<serde_json::Value>,
}

fn parse_clob_token_ids(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => {
            items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
        }
        serde_json::Value::String(s) => {
            if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(s) {
                items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
            } else if s.contains(',') {
                s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
            } else {
                vec![s.clone()]
            }
        }
        _ => Vec::new(),
    }
}

fn parse_outcome_prices(value: &serde_json::Value) -> Vec<f64> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()).or_else(|| v.as_f64()))
            .collect(),
        serde_json::Value::String(s) => {
            if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(s) {
                items
                    .iter()
                    .filter_map(|v| {
                        v.as_str().and_then(|s| s.parse::<f64>().ok()).or_else(|| v.as_f64())
                    })
                    .collect()
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

pub struct PolymarketClient {
    http: reqwest::Client,
    clob_host: String,
    gamma_host: String,
    token_cache: Mutex<HashMap<String, (String, String)>>,
    debug: bool,
}

impl PolymarketClient {
    pub fn new(_cfg: &crate::config::Config) -> Self {
        PolymarketClient {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            clob_host: CLOB_HOST.to_string(),
            gamma_host: GAMMA_HOST.to_string(),
            token_cache: Mutex::new(HashMap::new()),
            debug: std::env::var("POLY_HTTP_DEBUG").is_ok(),
        }
    }

    fn log(&self, msg: &str) {
        if self.debug {
            tracing::debug!(target: "poly_http", "{}", msg);
        }
    }

    /// GET with 429-aware retry, following `polymarket_public.py::_get_json`'s
    /// backoff shape but expressed as the teacher's retry-loop idiom.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            let resp = self.http.get(url).send().await;
            match resp {
                Ok(r) if r.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= MAX_RETRIES {
                        anyhow::bail!("rate limited after {attempt} retries: {url}");
                    }
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Ok(r) => {
                    return r
                        .error_for_status()
                        .with_context(|| format!("GET {url} returned error status"))?
                        .json::<T>()
                        .await
                        .with_context(|| format!("decoding response from {url}"));
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(e).with_context(|| format!("GET {url} failed after retries"));
                    }
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBookResponse> {
        let url = url::Url::parse_with_params(
            &format!("{}/book", self.clob_host),
            &[("token_id", token_id)],
        )?;
        self.get_json(url.as_str()).await
    }

    async fn gamma_markets_by_slug(&self, slug: &str) -> Result<Vec<GammaMarket>> {
        let url = url::Url::parse_with_params(
            &format!("{}/markets", self.gamma_host),
            &[("slug", slug)],
        )?;
        // Gamma may return either a bare array or an error object; treat
        // decode failure as "no match" rather than propagating.
        match self.get_json::<Vec<GammaMarket>>(url.as_str()).await {
            Ok(v) => Ok(v),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Resolves a Polymarket slug to `(yes_token_id, no_token_id)` via Gamma,
    /// convention `clobTokenIds = [YES, NO]`.
    pub async fn resolve_slug_to_tokens(&self, slug: &str) -> Result<Option<(String, String)>> {
        let markets = self.gamma_markets_by_slug(slug).await?;
        let m = match markets.first() {
            Some(m) => m,
            None => return Ok(None),
        };
        let ids = match &m.clob_token_ids {
            Some(v) => parse_clob_token_ids(v),
            None => Vec::new(),
        };
        if ids.len() < 2 {
            return Ok(None);
        }
        Ok(Some((ids[0].clone(), ids[1].clone())))
    }

    async fn tokens_for(&self, mapping: &MarketMapping) -> Result<Option<(String, String)>> {
        if let (Some(y), Some(n)) =
            (&mapping.polymarket_yes_token_id, &mapping.polymarket_no_token_id)
        {
            return Ok(Some((y.clone(), n.clone())));
        }
        if let Some(cached) = self.token_cache.lock().get(&mapping.polymarket_slug).cloned() {
            return Ok(Some(cached));
        }
        let resolved = self.resolve_slug_to_tokens(&mapping.polymarket_slug).await?;
        if let Some(pair) = &resolved {
            self.token_cache.lock().insert(mapping.polymarket_slug.clone(), pair.clone());
        } else {
            self.log(&format!("could not resolve tokens for slug {}", mapping.polymarket_slug));
        }
        Ok(resolved)
    }

    /// Gamma metadata fallback when the orderbook is empty/inaccessible:
    /// returns a price-only, zero-size book so any downstream signal is a
    /// near-miss at best (exec_size will always be 0).
    async fn gamma_price_fallback(&self, slug: &str) -> Option<(Option<f64>, Option<f64>)> {
        let markets = self.gamma_markets_by_slug(slug).await.ok()?;
        let m = markets.first()?;
        let prices = parse_outcome_prices(m.outcome_prices.as_ref()?);
        if prices.len() < 2 {
            return None;
        }
        Some((Some(normalize_price(prices[0])), Some(normalize_price(prices[1]))))
    }

    /// Fetches and normalizes snapshots for every mapping, concurrently.
    pub async fn fetch_for_mappings(&self, mappings: &[MarketMapping]) -> Vec<MarketSnapshot> {
        use futures_util::stream::{self, StreamExt};

        let ts = crate::daemon::now_secs();
        let results: Vec<Option<MarketSnapshot>> = stream::iter(mappings.iter())
            .map(|mapping| self.snapshot_for_mapping(mapping, ts))
            .buffer_unordered(8)
            .collect()
            .await;

        let mut snaps: Vec<MarketSnapshot> = results.into_iter().flatten().collect();
        snaps.sort_by(|a, b| a.market.market_id.cmp(&b.market.market_id));
        snaps
    }

    async fn snapshot_for_mapping(
        &self,
        mapping: &MarketMapping,
        ts: i64,
    ) -> Option<MarketSnapshot> {
        let (yes_token, no_token) = match self.tokens_for(mapping).await {
            Ok(Some(pair)) => pair,
            Ok(None) => return None,
            Err(e) => {
                self.log(&format!("token resolution failed: {e:#}"));
                return None;
            }
        };

        let books = futures_util::future::join(
            self.get_order_book(&yes_token),
            self.get_order_book(&no_token),
        )
        .await;

        let (best_yes, best_no) = match books {
            (Ok(y), Ok(n)) => {
                let yes_ask = y.asks.first().map(|l| normalize_price(l.price));
                let yes_size = y.asks.first().map(|l| l.size).unwrap_or(0.0);
                let no_ask = n.asks.first().map(|l| normalize_price(l.price));
                let no_size = n.asks.first().map(|l| l.size).unwrap_or(0.0);
                if yes_ask.is_none() || no_ask.is_none() {
                    self.log(&format!("empty orderbook for slug {}", mapping.polymarket_slug));
                    match self.gamma_price_fallback(&mapping.polymarket_slug).await {
                        Some((y, n)) => (y.map(|p| (p, 0.0)), n.map(|p| (p, 0.0))),
                        None => return None,
                    }
                } else {
                    (Some((yes_ask.unwrap(), yes_size)), Some((no_ask.unwrap(), no_size)))
                }
            }
            _ => match self.gamma_price_fallback(&mapping.polymarket_slug).await {
                Some((y, n)) => (y.map(|p| (p, 0.0)), n.map(|p| (p, 0.0))),
                None => return None,
            },
        };

        let (yes_price, yes_size) = best_yes?;
        let (no_price, no_size) = best_no?;

        Some(MarketSnapshot {
            market: Market {
                venue: Venue::Polymarket,
                market_id: mapping.polymarket_slug.clone(),
                question: mapping.polymarket_slug.replace('-', " "),
                outcomes: ("YES".to_string(), "NO".to_string()),
            },
            book: OrderBookTop {
                best_yes_price: Some(yes_price),
                best_yes_size: yes_size,
                best_no_price: Some(no_price),
                best_no_size: no_size,
            },
            ts,
        })
    }
}

#[async_trait]
impl super::VenueClient for PolymarketClient {
    fn name(&self) -> &'static str {
        "Polymarket"
    }

    async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>> {
        // The Polymarket client is mapping-driven; this trait method exists
        // for interface symmetry but callers in this crate use
        // `fetch_for_mappings` directly, since it needs the mapping list.
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clob_token_ids_handles_json_array_string() {
        let v = serde_json::json!("[\"111\",\"222\"]");
        assert_eq!(parse_clob_token_ids(&v), vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn parse_clob_token_ids_handles_plain_array() {
        let v = serde_json::json!(["111", "222"]);
        assert_eq!(parse_clob_token_ids(&v), vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn parse_clob_token_ids_handles_comma_separated() {
        let v = serde_json::json!("111, 222");
        assert_eq!(parse_clob_token_ids(&v), vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn parse_outcome_prices_handles_string_array() {
        let v = serde_json::json!("[\"0.63\",\"0.37\"]");
        let prices = parse_outcome_prices(&v);
        assert!((prices[0] - 0.63).abs() < 1e-9);
    }
}
