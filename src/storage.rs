//! SQLite-backed durable storage. Schema translated verbatim from
//! `arb_scanner/storage.py::SCHEMA`; WAL mode and busy_timeout match the
//! teacher's `src/signals/db_storage.rs` pragmas.

use crate::models::{
    Leg, MarketSnapshot, PaperBalances, PaperOrder, PaperTrade, Side, Signal, SignalKind,
    TradeStatus, Venue,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys=ON;

CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    started_at INTEGER NOT NULL,
    mode TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS snapshots (
    ts INTEGER NOT NULL,
    venue TEXT NOT NULL,
    market_id TEXT NOT NULL,
    question TEXT NOT NULL,
    yes_ask REAL,
    no_ask REAL,
    yes_sz REAL NOT NULL,
    no_sz REAL NOT NULL,
    raw TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (ts, venue, market_id)
);
CREATE INDEX IF NOT EXISTS idx_snapshots_venue_market ON snapshots(venue, market_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_ts ON snapshots(ts);

CREATE TABLE IF NOT EXISTS signals (
    ts INTEGER NOT NULL,
    kind TEXT NOT NULL,
    a_venue TEXT NOT NULL,
    a_market_id TEXT NOT NULL,
    b_venue TEXT,
    b_market_id TEXT,
    sum_price REAL NOT NULL,
    raw_edge REAL NOT NULL,
    buf_edge REAL NOT NULL,
    exec_size REAL NOT NULL,
    details TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_signals_ts ON signals(ts);

CREATE TABLE IF NOT EXISTS paper_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS paper_trades (
    trade_id TEXT PRIMARY KEY,
    ts_open INTEGER NOT NULL,
    ts_close INTEGER,
    status TEXT NOT NULL,
    kind TEXT NOT NULL,
    size REAL NOT NULL,
    sum_price REAL NOT NULL,
    buf_edge REAL NOT NULL,
    expected_profit REAL NOT NULL,
    legs_json TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_paper_trades_status_ts ON paper_trades(status, ts_open);

CREATE TABLE IF NOT EXISTS paper_orders (
    order_id TEXT PRIMARY KEY,
    trade_id TEXT NOT NULL,
    ts INTEGER NOT NULL,
    venue TEXT NOT NULL,
    market_id TEXT NOT NULL,
    side TEXT NOT NULL,
    price REAL NOT NULL,
    size REAL NOT NULL,
    status TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_paper_orders_ts ON paper_orders(ts);
"#;

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path, busy_timeout_ms: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating storage directory")?;
        }
        let conn = Connection::open(path).context("opening sqlite database")?;
        conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms as u64))?;
        conn.execute_batch(SCHEMA_SQL).context("applying schema")?;
        Ok(Storage { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Storage { conn })
    }

    pub fn start_run(&self, run_id: &str, started_at: i64, mode: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO runs (run_id, started_at, mode, notes) VALUES (?1, ?2, ?3, '')",
            params![run_id, started_at, mode],
        )?;
        Ok(())
    }

    /// Inserts a batch of snapshots, idempotent on `(ts, venue, market_id)`.
    /// Returns the number of rows actually inserted (duplicates ignored).
    pub fn insert_snapshots(&mut self, snapshots: &[MarketSnapshot]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO snapshots
                 (ts, venue, market_id, question, yes_ask, no_ask, yes_sz, no_sz, raw)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for s in snapshots {
                let raw = serde_json::to_string(s).unwrap_or_default();
                let n = stmt.execute(params![
                    s.ts,
                    s.market.venue.as_str(),
                    s.market.market_id,
                    s.market.question,
                    s.book.best_yes_price,
                    s.book.best_no_price,
                    s.book.best_yes_size,
                    s.book.best_no_size,
                    raw,
                ])?;
                inserted += n;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn insert_signal(&self, signal: &Signal) -> Result<()> {
        self.conn.execute(
            "INSERT INTO signals
             (ts, kind, a_venue, a_market_id, b_venue, b_market_id, sum_price, raw_edge, buf_edge, exec_size, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                signal.ts,
                signal.kind.as_str(),
                signal.a_venue.as_str(),
                signal.a_market_id,
                signal.b_venue.map(|v| v.as_str()),
                signal.b_market_id,
                signal.sum_price,
                signal.raw_edge,
                signal.buf_edge,
                signal.exec_size,
                signal.details,
            ],
        )?;
        Ok(())
    }

    /// Deletes snapshots older than `keep_days`; no-op if `keep_days <= 0`.
    /// Returns the number of rows deleted.
    pub fn prune_snapshots(&self, now: i64, keep_days: i64) -> Result<usize> {
        if keep_days <= 0 {
            return Ok(0);
        }
        let cutoff = now - keep_days * 86_400;
        let n = self
            .conn
            .execute("DELETE FROM snapshots WHERE ts < ?1", params![cutoff])?;
        Ok(n)
    }

    /// Best-effort WAL checkpoint; swallows errors like the Python original.
    pub fn wal_checkpoint(&self, mode: &str) {
        let valid = matches!(mode, "PASSIVE" | "FULL" | "RESTART" | "TRUNCATE");
        let mode = if valid { mode } else { "TRUNCATE" };
        let sql = format!("PRAGMA wal_checkpoint({mode});");
        if let Err(e) = self.conn.execute_batch(&sql) {
            tracing::warn!(error = %e, "wal_checkpoint failed");
        }
    }

    pub fn paper_get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM paper_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match raw {
            Some(s) => Some(serde_json::from_str(&s)?),
            None => None,
        })
    }

    pub fn paper_set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO paper_state (key, value) VALUES (?1, ?2)",
            params![key, raw],
        )?;
        Ok(())
    }

    pub fn paper_get_balances(&self, bankroll_default: f64) -> Result<PaperBalances> {
        match self.paper_get("balances")? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => {
                let balances = PaperBalances { free: bankroll_default, locked: 0.0, realized_pnl: 0.0 };
                self.paper_set_balances(&balances)?;
                Ok(balances)
            }
        }
    }

    pub fn paper_set_balances(&self, balances: &PaperBalances) -> Result<()> {
        self.paper_set("balances", &serde_json::to_value(balances)?)
    }

    /// Opens a paper trade as one atomic unit: both leg orders, the trade
    /// row, and the balance update either all land or none do. Uses
    /// `unchecked_transaction` (takes `&Connection`, not `&mut`) since every
    /// other `paper_*` write shares `&self` access on this struct.
    pub fn paper_open_trade(
        &self,
        orders: &[PaperOrder; 2],
        trade: &PaperTrade,
        balances: &PaperBalances,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for order in orders {
            tx.execute(
                "INSERT OR REPLACE INTO paper_orders
                 (order_id, trade_id, ts, venue, market_id, side, price, size, status, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    order.order_id,
                    order.trade_id,
                    order.ts,
                    order.venue.as_str(),
                    order.market_id,
                    side_str(order.side),
                    order.price,
                    order.size,
                    order.status,
                    order.details,
                ],
            )?;
        }

        let legs_json = serde_json::to_string(&trade.legs)?;
        tx.execute(
            "INSERT OR REPLACE INTO paper_trades
             (trade_id, ts_open, ts_close, status, kind, size, sum_price, buf_edge, expected_profit, legs_json, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                trade.trade_id,
                trade.ts_open,
                trade.ts_close,
                status_str(trade.status),
                trade.kind.as_str(),
                trade.size,
                trade.sum_price,
                trade.buf_edge,
                trade.expected_profit,
                legs_json,
                trade.details,
            ],
        )?;

        let balances_json = serde_json::to_string(balances)?;
        tx.execute(
            "INSERT OR REPLACE INTO paper_state (key, value) VALUES ('balances', ?1)",
            params![balances_json],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn paper_close_trade(&self, trade_id: &str, ts_close: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE paper_trades SET status = 'closed', ts_close = ?2 WHERE trade_id = ?1",
            params![trade_id, ts_close],
        )?;
        Ok(())
    }

    /// Open trades ordered oldest-first, matching `paper_list_open_trades`.
    pub fn paper_list_open_trades(&self, limit: usize) -> Result<Vec<PaperTrade>> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_id, ts_open, ts_close, status, kind, size, sum_price, buf_edge, expected_profit, legs_json, details
             FROM paper_trades WHERE status = 'open' ORDER BY ts_open ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let kind_str: String = row.get(4)?;
            let legs_json: String = row.get(9)?;
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, Option<i64>>(2)?,
                kind_str, row.get::<_, f64>(5)?, row.get::<_, f64>(6)?, row.get::<_, f64>(7)?,
                row.get::<_, f64>(8)?, legs_json, row.get::<_, String>(10)?))
        })?;

        let mut trades = Vec::new();
        for row in rows {
            let (trade_id, ts_open, ts_close, kind_str, size, sum_price, buf_edge, expected_profit, legs_json, details) = row?;
            let legs: (Leg, Leg) = serde_json::from_str(&legs_json)?;
            let kind = if kind_str == "cross_venue" { SignalKind::CrossVenue } else { SignalKind::KalshiInternal };
            trades.push(PaperTrade {
                trade_id, ts_open, ts_close, status: TradeStatus::Open, kind, size, sum_price,
                buf_edge, expected_profit, legs, details,
            });
        }
        Ok(trades)
    }
}

fn status_str(s: TradeStatus) -> &'static str {
    match s {
        TradeStatus::Open => "open",
        TradeStatus::Closed => "closed",
        TradeStatus::Canceled => "canceled",
    }
}

fn side_str(s: Side) -> &'static str {
    match s {
        Side::Yes => "Yes",
        Side::No => "No",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Market, OrderBookTop};

    fn snap(ts: i64, venue: Venue, id: &str) -> MarketSnapshot {
        MarketSnapshot {
            market: Market { venue, market_id: id.into(), question: "q".into(), outcomes: ("Yes".into(), "No".into()) },
            book: OrderBookTop { best_yes_price: Some(0.4), best_yes_size: 10.0, best_no_price: Some(0.5), best_no_size: 10.0 },
            ts,
        }
    }

    #[test]
    fn insert_snapshots_is_idempotent() {
        let mut storage = Storage::open_in_memory().unwrap();
        let s = snap(1, Venue::Kalshi, "A");
        assert_eq!(storage.insert_snapshots(&[s.clone()]).unwrap(), 1);
        assert_eq!(storage.insert_snapshots(&[s]).unwrap(), 0);
    }

    #[test]
    fn prune_snapshots_noop_when_keep_days_non_positive() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.prune_snapshots(1_000_000, 0).unwrap(), 0);
    }

    #[test]
    fn paper_balances_seed_from_default_on_first_read() {
        let storage = Storage::open_in_memory().unwrap();
        let balances = storage.paper_get_balances(1000.0).unwrap();
        assert_eq!(balances.free, 1000.0);
        assert_eq!(balances.locked, 0.0);
    }
}
