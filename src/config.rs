//! Process-wide configuration, assembled once at startup.
//!
//! `Config` holds the parts that never change for the life of the process
//! (paths, pagination limits, network timeouts). Live-tunable policy knobs
//! (`PolicyConfig`) are read separately from the control plane so they can
//! change without a restart — see [`crate::control_plane`].

use std::env;

/// Which arbitrage-pairing mode the daemon runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    /// Self-test against Kalshi's own market list only.
    KalshiInternal,
    /// Cross-venue pairing via the curated mapping file.
    Mapping,
}

/// Lab vs. safe policy defaults, per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Lab,
    Safe,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lab" => Some(Mode::Lab),
            "safe" => Some(Mode::Safe),
            _ => None,
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Static process configuration. Built once in `main` and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub dry_run: bool,
    pub mode: Mode,
    pub alert_only: bool,
    pub alert_threshold: f64,
    pub fee_buffer_bps: f64,

    pub kalshi_pages: u32,
    pub kalshi_limit: u32,
    pub kalshi_min_liq: f64,
    pub kalshi_require_two_sided: bool,
    pub kalshi_min_after_blacklist: usize,
    pub kalshi_min_active: usize,
    pub kalshi_max_tickers: usize,

    pub refresh_markets_secs: i64,
    pub batch_size: usize,
    pub sleep_secs: u64,

    pub daemon_state_path: String,
    pub db_path: String,
    pub sqlite_busy_timeout_ms: u32,
    pub mapping_path: String,
    pub control_plane_path: String,

    pub net_backoff_base: f64,
    pub net_backoff_factor: f64,
    pub net_backoff_cap: f64,
    pub net_backoff_jitter: f64,

    pub snapshot_ttl_days: i64,
    pub prune_every_secs: i64,
    pub wal_checkpoint_secs: i64,
    pub settle_every_secs: i64,

    pub paper_settle_after_secs: i64,
    pub paper_bankroll: f64,
    pub paper_max_per_trade: f64,
    pub paper_trade_cooldown_secs: i64,
    pub paper_min_free_balance: f64,
    pub paper_fee_bps: f64,
}

impl Config {
    /// Loads `.env` if present, then reads every variable with a parsed
    /// default, mirroring the teacher's `Config::from_env` idiom.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            dry_run: env_flag("DRY_RUN", true),
            mode: Mode::parse(&env::var("MODE").unwrap_or_default()).unwrap_or(Mode::Lab),
            alert_only: env_flag("ALERT_ONLY", false),
            alert_threshold: env_parsed("ALERT_THRESHOLD", 0.02),
            fee_buffer_bps: env_parsed("FEE_BUFFER_BPS", 25.0),

            kalshi_pages: env_parsed("KALSHI_PAGES", 5),
            kalshi_limit: env_parsed("KALSHI_LIMIT", 200),
            kalshi_min_liq: env_parsed("KALSHI_MIN_LIQ", 1.0),
            kalshi_require_two_sided: env_flag("KALSHI_REQUIRE_TWO_SIDED", true),
            kalshi_min_after_blacklist: env_parsed("KALSHI_MIN_AFTER_BLACKLIST", 50),
            kalshi_min_active: env_parsed("KALSHI_MIN_ACTIVE", 50),
            kalshi_max_tickers: env_parsed("KALSHI_MAX_TICKERS", 300),

            refresh_markets_secs: env_parsed("REFRESH_MARKETS_SECS", 900),
            batch_size: env_parsed("BATCH_SIZE", 50),
            sleep_secs: env_parsed("SLEEP_SECS", 20),

            daemon_state_path: env::var("DAEMON_STATE_PATH")
                .unwrap_or_else(|_| ".state/kalshi_cursor.json".to_string()),
            db_path: env::var("DB_PATH").unwrap_or_else(|_| ".data/scan.db".to_string()),
            sqlite_busy_timeout_ms: env_parsed("SQLITE_BUSY_TIMEOUT_MS", 5000),
            mapping_path: env::var("MAPPING_PATH")
                .unwrap_or_else(|_| "mappings.json".to_string()),
            control_plane_path: env::var("CONTROL_PLANE_PATH")
                .unwrap_or_else(|_| ".state/botctl.json".to_string()),

            net_backoff_base: env_parsed("NET_BACKOFF_BASE", 30.0),
            net_backoff_factor: env_parsed("NET_BACKOFF_FACTOR", 2.0),
            net_backoff_cap: env_parsed("NET_BACKOFF_CAP", 600.0),
            net_backoff_jitter: env_parsed("NET_BACKOFF_JITTER", 0.20),

            snapshot_ttl_days: env_parsed("SNAPSHOT_TTL_DAYS", 14),
            prune_every_secs: env_parsed("PRUNE_EVERY_SECS", 3600),
            wal_checkpoint_secs: env_parsed("WAL_CHECKPOINT_SECS", 300),
            settle_every_secs: env_parsed("SETTLE_EVERY_SECS", 60),

            paper_settle_after_secs: env_parsed("PAPER_SETTLE_AFTER_SECS", 3600),
            paper_bankroll: env_parsed("PAPER_BANKROLL", 1000.0),
            paper_max_per_trade: env_parsed("PAPER_MAX_PER_TRADE", 50.0),
            paper_trade_cooldown_secs: env_parsed("PAPER_TRADE_COOLDOWN_SECS", 300),
            paper_min_free_balance: env_parsed("PAPER_MIN_FREE_BALANCE", 0.0),
            paper_fee_bps: env_parsed("PAPER_FEE_BPS", 0.0),
        }
    }

    /// Fatal configuration check: this scanner never trades for real.
    pub fn assert_dry_run(&self) -> anyhow::Result<()> {
        if !self.dry_run {
            anyhow::bail!("DRY_RUN must be enabled; this scanner never places real orders");
        }
        Ok(())
    }
}

/// Live-tunable arbitrage policy, refreshed from the control plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub mode: Mode,
    pub min_edge_opportunity: f64,
    pub min_executable_size: f64,
    pub near_miss_edge_floor: f64,
    pub near_miss_edge_ceiling: Option<f64>,
    pub near_miss_include_weird_sums: bool,
    pub fee_buffer_bps: f64,
}

impl PolicyConfig {
    /// Mode-driven defaults; `safe` tightens every threshold relative to `lab`.
    pub fn for_mode(mode: Mode, fee_buffer_bps: f64) -> Self {
        match mode {
            Mode::Lab => PolicyConfig {
                mode,
                min_edge_opportunity: 0.02,
                min_executable_size: 1.0,
                near_miss_edge_floor: 0.0,
                near_miss_edge_ceiling: None,
                near_miss_include_weird_sums: false,
                fee_buffer_bps,
            },
            Mode::Safe => PolicyConfig {
                mode,
                min_edge_opportunity: 0.04,
                min_executable_size: 5.0,
                near_miss_edge_floor: 0.01,
                near_miss_edge_ceiling: None,
                near_miss_include_weird_sums: false,
                fee_buffer_bps,
            },
        }
    }

    /// Legacy precedence rule: `alert_only` forces the opportunity floor down
    /// to `alert_threshold`, overriding whatever the mode default set.
    pub fn apply_alert_only(mut self, alert_only: bool, alert_threshold: f64) -> Self {
        if alert_only {
            self.min_edge_opportunity = alert_threshold;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_mode_is_strictly_tighter_than_lab() {
        let lab = PolicyConfig::for_mode(Mode::Lab, 25.0);
        let safe = PolicyConfig::for_mode(Mode::Safe, 25.0);
        assert!(safe.min_edge_opportunity > lab.min_edge_opportunity);
        assert!(safe.min_executable_size > lab.min_executable_size);
    }

    #[test]
    fn alert_only_overrides_mode_default() {
        let policy = PolicyConfig::for_mode(Mode::Safe, 25.0).apply_alert_only(true, 0.005);
        assert_eq!(policy.min_edge_opportunity, 0.005);
    }
}
