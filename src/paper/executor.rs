//! Transactional paper-trade simulator. Ported closely from
//! `arb_scanner/paper_executor.py::PaperExecutor` — the closest 1:1
//! translation in this crate, since that module is the most authoritative
//! source available for the exact settlement semantics.

use crate::models::{PaperOrder, PaperTrade, Side, SignalKind, TradePlan, TradeStatus};
use crate::storage::Storage;
use anyhow::Result;

/// Live-tunable paper-executor settings (`settle_after_secs`, `fee_bps`,
/// `min_free_balance`), matching `PaperConfig` in the Python original.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperConfig {
    pub settle_after_secs: i64,
    pub fee_bps: f64,
    pub min_free_balance: f64,
    pub bankroll_default: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        PaperConfig {
            settle_after_secs: 3600,
            fee_bps: 0.0,
            min_free_balance: 0.0,
            bankroll_default: 1000.0,
        }
    }
}

/// Why `try_execute` declined a plan; no state is mutated in either case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InsufficientLiquidity,
    InsufficientBalance,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InsufficientLiquidity => "insufficient_liquidity",
            RejectReason::InsufficientBalance => "insufficient_balance",
        }
    }
}

pub struct PaperExecutor {
    config: PaperConfig,
}

impl PaperExecutor {
    pub fn new(config: PaperConfig) -> Self {
        PaperExecutor { config }
    }

    /// Validates liquidity and balance, then atomically opens a trade:
    /// two filled orders, one open `PaperTrade`, and moves `cost` from
    /// `free` to `locked`. No side effects on rejection.
    pub fn try_execute(
        &self,
        storage: &Storage,
        plan: &TradePlan,
        now: i64,
    ) -> Result<std::result::Result<String, RejectReason>> {
        let (leg_a, leg_b) = &plan.legs;
        if leg_a.size_avail < plan.size || leg_b.size_avail < plan.size {
            return Ok(Err(RejectReason::InsufficientLiquidity));
        }

        let balances = storage.paper_get_balances(self.config.bankroll_default)?;
        let cost = plan.sum_price * plan.size;
        if balances.free - cost < self.config.min_free_balance {
            return Ok(Err(RejectReason::InsufficientBalance));
        }

        let trade_id = uuid::Uuid::new_v4().to_string();
        let expected_profit = (1.0 - plan.sum_price) * plan.size;

        let orders = [leg_a, leg_b].map(|leg| PaperOrder {
            order_id: uuid::Uuid::new_v4().to_string(),
            trade_id: trade_id.clone(),
            ts: now,
            venue: leg.venue,
            market_id: leg.market_id.clone(),
            side: leg.side,
            price: leg.price,
            size: plan.size,
            status: "filled".to_string(),
            details: "paper fill at top-of-book".to_string(),
        });

        let trade = PaperTrade {
            trade_id: trade_id.clone(),
            ts_open: now,
            ts_close: None,
            status: TradeStatus::Open,
            kind: plan.kind,
            size: plan.size,
            sum_price: plan.sum_price,
            buf_edge: plan.buf_edge,
            expected_profit,
            legs: (leg_a.clone(), leg_b.clone()),
            details: plan.details.clone(),
        };

        let new_balances = crate::models::PaperBalances {
            free: balances.free - cost,
            locked: balances.locked + cost,
            realized_pnl: balances.realized_pnl,
        };

        storage.paper_open_trade(&orders, &trade, &new_balances)?;

        Ok(Ok(format!(
            "executed trade_id={trade_id} cost={cost:.4} expected_profit={expected_profit:.4}"
        )))
    }

    /// Settles every open trade whose `settle_after_secs` has elapsed,
    /// oldest-first; unlocks `cost`, credits `cost + expected_profit` to
    /// `free`, and accumulates `realized_pnl`. Returns the number closed.
    pub fn maybe_settle(&self, storage: &Storage, now: i64) -> Result<usize> {
        let open_trades = storage.paper_list_open_trades(10_000)?;
        let mut balances = storage.paper_get_balances(self.config.bankroll_default)?;
        let mut closed = 0usize;

        for trade in open_trades {
            if now - trade.ts_open < self.config.settle_after_secs {
                continue;
            }
            let cost = trade.sum_price * trade.size;
            balances.locked -= cost;
            balances.free += cost + trade.expected_profit;
            balances.realized_pnl += trade.expected_profit;
            storage.paper_close_trade(&trade.trade_id, now)?;
            closed += 1;
        }

        if closed > 0 {
            storage.paper_set_balances(&balances)?;
        }
        Ok(closed)
    }

    pub fn balances(&self, storage: &Storage) -> Result<crate::models::PaperBalances> {
        storage.paper_get_balances(self.config.bankroll_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Leg, Venue};

    fn plan(size: f64, sum_price: f64) -> TradePlan {
        TradePlan {
            kind: SignalKind::CrossVenue,
            buf_edge: 1.0 - sum_price,
            sum_price,
            size,
            legs: (
                Leg { venue: Venue::Kalshi, market_id: "K1".into(), side: Side::Yes, price: 0.4, size_avail: 100.0 },
                Leg { venue: Venue::Polymarket, market_id: "P1".into(), side: Side::No, price: 0.5, size_avail: 100.0 },
            ),
            details: String::new(),
        }
    }

    #[test]
    fn try_execute_moves_cost_from_free_to_locked() {
        let storage = Storage::open_in_memory().unwrap();
        let executor = PaperExecutor::new(PaperConfig { bankroll_default: 1000.0, ..Default::default() });
        let result = executor.try_execute(&storage, &plan(10.0, 0.9), 1000).unwrap();
        assert!(result.is_ok());
        let balances = executor.balances(&storage).unwrap();
        assert!((balances.free - (1000.0 - 9.0)).abs() < 1e-9);
        assert!((balances.locked - 9.0).abs() < 1e-9);
    }

    #[test]
    fn try_execute_rejects_insufficient_liquidity() {
        let storage = Storage::open_in_memory().unwrap();
        let executor = PaperExecutor::new(PaperConfig::default());
        let mut p = plan(200.0, 0.9);
        p.legs.0.size_avail = 5.0;
        let result = executor.try_execute(&storage, &p, 1000).unwrap();
        assert_eq!(result.unwrap_err(), RejectReason::InsufficientLiquidity);
    }

    #[test]
    fn try_execute_rejects_insufficient_balance() {
        let storage = Storage::open_in_memory().unwrap();
        let executor = PaperExecutor::new(PaperConfig { bankroll_default: 1.0, ..Default::default() });
        let result = executor.try_execute(&storage, &plan(10.0, 0.9), 1000).unwrap();
        assert_eq!(result.unwrap_err(), RejectReason::InsufficientBalance);
    }

    #[test]
    fn maybe_settle_closes_mature_trades_and_credits_pnl() {
        let storage = Storage::open_in_memory().unwrap();
        let executor = PaperExecutor::new(PaperConfig {
            bankroll_default: 1000.0,
            settle_after_secs: 60,
            ..Default::default()
        });
        executor.try_execute(&storage, &plan(10.0, 0.9), 1000).unwrap();
        assert_eq!(executor.maybe_settle(&storage, 1030).unwrap(), 0);
        let closed = executor.maybe_settle(&storage, 1061).unwrap();
        assert_eq!(closed, 1);
        let balances = executor.balances(&storage).unwrap();
        assert!((balances.locked - 0.0).abs() < 1e-9);
        assert!(balances.realized_pnl > 0.0);
    }
}
