//! CLI entry point: `arb-scanner daemon ...`.

use arb_scanner::config::{Config, Mode, PairingMode};
use arb_scanner::daemon::{self, DaemonArgs};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arb-scanner", about = "Read-only, dry-run cross-venue arbitrage scanner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scan scheduler.
    Daemon {
        #[arg(long, default_value = "lab")]
        mode: String,

        #[arg(long, conflicts_with = "use_kalshi_internal")]
        use_mapping: bool,

        #[arg(long, conflicts_with = "use_mapping")]
        use_kalshi_internal: bool,

        #[arg(long)]
        refresh_markets_secs: Option<i64>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long)]
        sleep_secs: Option<u64>,

        #[arg(long)]
        state_path: Option<String>,

        #[arg(long)]
        db_path: Option<String>,

        #[arg(long)]
        alert_threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Command::Daemon {
            mode,
            use_mapping,
            use_kalshi_internal,
            refresh_markets_secs,
            batch_size,
            sleep_secs,
            state_path,
            db_path,
            alert_threshold,
        } => {
            let mode = Mode::parse(&mode).ok_or_else(|| anyhow::anyhow!("invalid --mode: {mode}"))?;

            if !use_mapping && !use_kalshi_internal {
                anyhow::bail!("one of --use-mapping or --use-kalshi-internal is required");
            }
            let pairing = if use_mapping { PairingMode::Mapping } else { PairingMode::KalshiInternal };

            if let Some(v) = refresh_markets_secs {
                config.refresh_markets_secs = v;
            }
            if let Some(v) = batch_size {
                config.batch_size = v;
            }
            if let Some(v) = sleep_secs {
                config.sleep_secs = v;
            }
            if let Some(v) = state_path {
                config.daemon_state_path = v;
            }
            if let Some(v) = db_path {
                config.db_path = v;
            }
            if let Some(v) = alert_threshold {
                config.alert_threshold = v;
            }

            daemon::run(config, DaemonArgs { mode, pairing }).await
        }
    }
}
