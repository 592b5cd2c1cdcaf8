//! `arbctl`: operator CLI for mutating the control-plane switch file.
//! Grounded on `botctl.py::parse_args`/`main` — subcommands
//! `status`/`on`/`off`/`set`, atomic writes via `control_plane::write_state`.

use arb_scanner::control_plane::{ControlMode, ControlPlaneReader, ControlState};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arbctl", about = "Mutate the arb-scanner control-plane switch file")]
struct Cli {
    #[arg(long, env = "CONTROL_PLANE_PATH", default_value = ".state/botctl.json")]
    state_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current control-plane state as JSON.
    Status,
    /// Enable scanning/paper-execution.
    On {
        #[arg(long, default_value = "paper")]
        mode: String,
    },
    /// Disable scanning/paper-execution.
    Off,
    /// Update one or more fields without changing `enabled`/`mode` unless given.
    Set {
        #[arg(long)]
        bankroll: Option<f64>,
        #[arg(long)]
        max_per_trade: Option<f64>,
        #[arg(long)]
        min_buf_edge: Option<f64>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        mode: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut reader = ControlPlaneReader::new(&cli.state_path);
    let mut state: ControlState = reader.poll();

    match cli.command {
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Ok(());
        }
        Command::On { mode } => {
            let mode = ControlMode::parse(&mode)
                .ok_or_else(|| anyhow::anyhow!("invalid --mode: {mode}"))?;
            state.enabled = true;
            state.mode = mode;
        }
        Command::Off => {
            state.enabled = false;
            state.mode = ControlMode::Off;
        }
        Command::Set { bankroll, max_per_trade, min_buf_edge, enabled, mode } => {
            if let Some(v) = bankroll {
                state.bankroll = v;
            }
            if let Some(v) = max_per_trade {
                state.max_per_trade = v;
            }
            if let Some(v) = min_buf_edge {
                state.min_buf_edge = v;
            }
            if let Some(v) = enabled {
                state.enabled = v;
            }
            if let Some(m) = mode {
                state.mode =
                    ControlMode::parse(&m).ok_or_else(|| anyhow::anyhow!("invalid --mode: {m}"))?;
            }
        }
    }

    state.updated_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    arb_scanner::control_plane::write_state(&cli.state_path, &state)?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
