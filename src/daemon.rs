//! Scan scheduler: the supervisor loop tying together venue clients,
//! evaluator, storage, paper executor, and control plane. Control flow and
//! exception-handling shape are grounded almost verbatim on
//! `daemon.py::Backoff`/`main`.

use crate::config::{Config, Mode, PairingMode, PolicyConfig};
use crate::control_plane::{ControlMode, ControlPlaneReader};
use crate::cursor::{iter_batch, load_cursor, save_cursor};
use crate::evaluator::evaluate_pair;
use crate::mapping::{load_mappings, resolve_polymarket_tokens};
use crate::models::{Classification, Leg, MarketMapping, MarketSnapshot, ScanCursor, Side, SignalKind, TradePlan};
use crate::paper::{PaperConfig, PaperExecutor};
use crate::storage::Storage;
use crate::venues::kalshi::KalshiClient;
use crate::venues::polymarket::PolymarketClient;
use anyhow::Result;
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Exponential backoff with jitter, reset on the first successful
/// iteration. Matches `daemon.py::Backoff` exactly: `delay = min(cap, base
/// * factor^attempt)`, jittered uniformly by `+/- delay * jitter`.
pub struct Backoff {
    base: f64,
    factor: f64,
    cap: f64,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: f64, factor: f64, cap: f64, jitter: f64) -> Self {
        Backoff { base, factor, cap, jitter, attempt: 0 }
    }

    pub fn next_sleep(&mut self) -> f64 {
        let delay = self.cap.min(self.base * self.factor.powi(self.attempt as i32));
        let wiggle = delay * self.jitter;
        let jittered = delay + rand::thread_rng().gen_range(-wiggle..=wiggle);
        self.attempt += 1;
        jittered.max(0.0)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Whether an error looks transient/network-shaped, matching
/// `daemon.py::_is_networkish` — these get a backoff-and-retry rather than
/// a fatal abort.
pub fn is_networkish(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<reqwest::Error>().is_some()
            || cause.downcast_ref::<std::io::Error>().is_some()
    })
}

pub struct DaemonArgs {
    pub mode: Mode,
    pub pairing: PairingMode,
}

/// Runs the scheduler until interrupted. Performs the 9-step iteration from
/// SPEC_FULL.md §4.3 on each pass; sleeps are cancellable by ctrl-c.
pub async fn run(config: Config, args: DaemonArgs) -> Result<()> {
    config.assert_dry_run()?;

    let kalshi = KalshiClient::new(&config);
    let polymarket = PolymarketClient::new(&config);

    let mut mappings: Vec<MarketMapping> = Vec::new();
    if matches!(args.pairing, PairingMode::Mapping) {
        mappings = load_mappings(&PathBuf::from(&config.mapping_path))?;
        resolve_polymarket_tokens(&mut mappings, &polymarket).await?;
        if mappings.is_empty() {
            anyhow::bail!("no mapping entries in cross-venue mode");
        }
    }

    let mut storage = Storage::open(&PathBuf::from(&config.db_path), config.sqlite_busy_timeout_ms)?;
    let run_id = uuid::Uuid::new_v4().to_string();
    storage.start_run(&run_id, now_secs(), mode_str(args.mode))?;

    let executor = PaperExecutor::new(PaperConfig {
        settle_after_secs: config.paper_settle_after_secs,
        fee_bps: config.paper_fee_bps,
        min_free_balance: config.paper_min_free_balance,
        bankroll_default: config.paper_bankroll,
    });

    let mut control = ControlPlaneReader::new(&config.control_plane_path);
    let mut backoff = Backoff::new(
        config.net_backoff_base,
        config.net_backoff_factor,
        config.net_backoff_cap,
        config.net_backoff_jitter,
    );

    let mut universe = kalshi.fetch_universe().await?;
    let mut universe_refreshed_at = now_secs();
    let mut cursor = load_cursor(&PathBuf::from(&config.daemon_state_path));

    let mut last_prune = now_secs();
    let mut last_checkpoint = now_secs();
    let mut last_settle = now_secs();
    let mut cooldowns: HashMap<(Side, String, String), i64> = HashMap::new();

    loop {
        let iteration = async {
            // 1. poll control plane (a cheap local file read every iteration;
            // the ~2s cadence in spec is satisfied by `sleep_secs` gating
            // how often iterations happen at all)
            let now = now_secs();
            let state = control.poll();

            // 2. refresh universe if stale
            if now - universe_refreshed_at >= config.refresh_markets_secs || universe.tickers.is_empty() {
                match kalshi.fetch_universe().await {
                    Ok(fresh) => {
                        universe = fresh;
                        universe_refreshed_at = now;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "universe refresh failed, reusing cached universe");
                        if universe.tickers.is_empty() {
                            return Err(e);
                        }
                    }
                }
            }

            // 3. select batch, persist cursor BEFORE any network call
            let (batch, new_cursor) = iter_batch(&universe.tickers, cursor.cursor, config.batch_size);
            let batch_tickers: Vec<String> = batch.into_iter().cloned().collect();
            cursor = ScanCursor { cursor: new_cursor, ts: now };
            save_cursor(&PathBuf::from(&config.daemon_state_path), &cursor)?;

            // 4. fetch snapshots for the batch
            let (kalshi_snaps, _stats) =
                kalshi.snapshot_batch(&batch_tickers, &universe.raw_by_ticker, now);
            let poly_snaps: Vec<MarketSnapshot> = if matches!(args.pairing, PairingMode::Mapping) {
                polymarket.fetch_for_mappings(&mappings).await
            } else {
                Vec::new()
            };

            // 5. persist snapshots
            let mut all_snaps = kalshi_snaps.clone();
            all_snaps.extend(poly_snaps.clone());
            all_snaps.sort_by(|a, b| (a.market.venue as u8, &a.market.market_id).cmp(&(b.market.venue as u8, &b.market.market_id)));
            storage.insert_snapshots(&all_snaps)?;

            // 6. evaluate + persist signals
            let policy = PolicyConfig::for_mode(args.mode, config.fee_buffer_bps)
                .apply_alert_only(config.alert_only, config.alert_threshold);
            let mut signals = Vec::new();
            match args.pairing {
                PairingMode::KalshiInternal => {
                    for i in 0..kalshi_snaps.len() {
                        for j in (i + 1)..kalshi_snaps.len() {
                            signals.extend(evaluate_pair(
                                &kalshi_snaps[i],
                                &kalshi_snaps[j],
                                now,
                                SignalKind::KalshiInternal,
                                &policy,
                            ));
                        }
                    }
                }
                PairingMode::Mapping => {
                    let kalshi_by_id: HashMap<&str, &MarketSnapshot> =
                        kalshi_snaps.iter().map(|s| (s.market.market_id.as_str(), s)).collect();
                    let poly_by_id: HashMap<&str, &MarketSnapshot> =
                        poly_snaps.iter().map(|s| (s.market.market_id.as_str(), s)).collect();
                    for mapping in &mappings {
                        if let (Some(a), Some(b)) = (
                            kalshi_by_id.get(mapping.kalshi_ticker.as_str()),
                            poly_by_id.get(mapping.polymarket_slug.as_str()),
                        ) {
                            signals.extend(evaluate_pair(a, b, now, SignalKind::CrossVenue, &policy));
                        }
                    }
                }
            }
            for signal in &signals {
                storage.insert_signal(signal)?;
                tracing::info!(
                    kind = signal.kind.as_str(),
                    buf_edge = signal.buf_edge,
                    exec_size = signal.exec_size,
                    a = %signal.a_market_id,
                    "[ALERT] {}", signal.kind.as_str(),
                );
            }

            // 7. paper execution
            if state.enabled && state.mode == ControlMode::Paper {
                for signal in &signals {
                    if signal.classification != Classification::Opportunity {
                        continue;
                    }
                    if signal.buf_edge < state.min_buf_edge {
                        continue;
                    }
                    let (Some(b_venue), Some(b_market_id)) = (signal.b_venue, signal.b_market_id.clone()) else {
                        continue;
                    };
                    let key = (Side::Yes, signal.a_market_id.clone(), b_market_id.clone());
                    if let Some(&last) = cooldowns.get(&key) {
                        if now - last < config.paper_trade_cooldown_secs {
                            tracing::info!("[paper] SKIP cooldown active for {}/{}", signal.a_market_id, b_market_id);
                            continue;
                        }
                    }
                    let size = signal
                        .exec_size
                        .min(state.max_per_trade / signal.sum_price.max(1e-9))
                        .max(policy.min_executable_size);
                    if size <= 0.0 {
                        continue;
                    }
                    let plan = TradePlan {
                        kind: signal.kind,
                        buf_edge: signal.buf_edge,
                        sum_price: signal.sum_price,
                        size,
                        legs: (
                            Leg { venue: signal.a_venue, market_id: signal.a_market_id.clone(), side: Side::Yes, price: signal.sum_price / 2.0, size_avail: signal.exec_size },
                            Leg { venue: b_venue, market_id: b_market_id.clone(), side: Side::No, price: signal.sum_price / 2.0, size_avail: signal.exec_size },
                        ),
                        details: signal.details.clone(),
                    };
                    match executor.try_execute(&storage, &plan, now)? {
                        Ok(msg) => {
                            tracing::info!("[paper] OK {}", msg);
                            cooldowns.insert(key, now);
                        }
                        Err(reason) => {
                            tracing::info!("[paper] SKIP {}", reason.as_str());
                        }
                    }
                }
            }

            // 8. maintenance cadence
            if now - last_prune >= config.prune_every_secs {
                let deleted = storage.prune_snapshots(now, config.snapshot_ttl_days)?;
                tracing::debug!(deleted, "pruned old snapshots");
                last_prune = now;
            }
            if now - last_settle >= config.settle_every_secs {
                let closed = executor.maybe_settle(&storage, now)?;
                if closed > 0 {
                    tracing::info!(closed, "settled paper trades");
                }
                last_settle = now;
            }
            if now - last_checkpoint >= config.wal_checkpoint_secs {
                storage.wal_checkpoint("TRUNCATE");
                last_checkpoint = now;
            }

            Ok::<(), anyhow::Error>(())
        };

        tokio::select! {
            result = iteration => {
                match result {
                    Ok(()) => {
                        backoff.reset();
                        let sleep_dur = std::time::Duration::from_secs_f64(config.sleep_secs as f64);
                        if tokio::time::timeout(sleep_dur, tokio::signal::ctrl_c()).await.is_ok() {
                            tracing::info!("shutdown requested, exiting cleanly");
                            break;
                        }
                    }
                    Err(e) => {
                        if is_networkish(&e) {
                            tracing::warn!(error = %e, "network error, backing off");
                        } else {
                            tracing::error!(error = %e, "iteration error, backing off");
                        }
                        let delay = backoff.next_sleep();
                        let sleep_dur = std::time::Duration::from_secs_f64(delay);
                        if tokio::time::timeout(sleep_dur, tokio::signal::ctrl_c()).await.is_ok() {
                            tracing::info!("shutdown requested during backoff, exiting cleanly");
                            break;
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested, exiting cleanly");
                break;
            }
        }
    }

    Ok(())
}

fn mode_str(mode: Mode) -> &'static str {
    match mode {
        Mode::Lab => "lab",
        Mode::Safe => "safe",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let mut b = Backoff::new(1.0, 2.0, 10.0, 0.0);
        assert!((b.next_sleep() - 1.0).abs() < 1e-9);
        assert!((b.next_sleep() - 2.0).abs() < 1e-9);
        assert!((b.next_sleep() - 4.0).abs() < 1e-9);
        assert!((b.next_sleep() - 8.0).abs() < 1e-9);
        assert!((b.next_sleep() - 10.0).abs() < 1e-9); // capped
    }

    #[test]
    fn backoff_reset_restarts_from_base() {
        let mut b = Backoff::new(1.0, 2.0, 100.0, 0.0);
        b.next_sleep();
        b.next_sleep();
        b.reset();
        assert!((b.next_sleep() - 1.0).abs() < 1e-9);
    }
}
