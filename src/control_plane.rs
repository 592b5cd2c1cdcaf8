//! Control-plane switch file reader. Grounded on `botctl.py`'s atomic
//! write discipline and field defaults; the daemon only reads this file,
//! `arbctl` is the writer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paper-execution mode requested via the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Off,
    Alerts,
    Paper,
}

impl ControlMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ControlMode::Off),
            "alerts" => Some(ControlMode::Alerts),
            "paper" => Some(ControlMode::Paper),
            _ => None,
        }
    }
}

/// Live-tunable switch state, matching `botctl.py`'s defaults:
/// `enabled=False, mode="off", bankroll=1000.0, max_per_trade=50.0, min_buf_edge=0.02`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub enabled: bool,
    pub mode: ControlMode,
    pub bankroll: f64,
    pub max_per_trade: f64,
    pub min_buf_edge: f64,
    pub updated_at: i64,
}

impl Default for ControlState {
    fn default() -> Self {
        ControlState {
            enabled: false,
            mode: ControlMode::Off,
            bankroll: 1000.0,
            max_per_trade: 50.0,
            min_buf_edge: 0.02,
            updated_at: 0,
        }
    }
}

/// Reads the control-plane file, falling back to the last-known-good state
/// (or the default) when the file is missing or malformed.
pub struct ControlPlaneReader {
    path: PathBuf,
    last_known_good: ControlState,
}

impl ControlPlaneReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ControlPlaneReader { path: path.into(), last_known_good: ControlState::default() }
    }

    pub fn poll(&mut self) -> ControlState {
        match read_state(&self.path) {
            Ok(state) => {
                self.last_known_good = state;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "control plane file unreadable, using last-known-good state"
                );
            }
        }
        self.last_known_good
    }
}

fn read_state(path: &Path) -> Result<ControlState> {
    let raw = std::fs::read_to_string(path).context("reading control plane file")?;
    let state: ControlState = serde_json::from_str(&raw).context("parsing control plane file")?;
    Ok(state)
}

/// Atomic write-temp-then-rename, matching `botctl.py::_write`. Used by the
/// `arbctl` binary, not the daemon.
pub fn write_state(path: &Path, state: &ControlState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("creating control plane directory")?;
    }
    let tmp = path.with_extension("tmp");
    let body = serde_json::to_string_pretty(state)?;
    std::fs::write(&tmp, body).context("writing control plane temp file")?;
    std::fs::rename(&tmp, path).context("renaming control plane temp file into place")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = ControlPlaneReader::new(dir.path().join("nope.json"));
        let state = reader.poll();
        assert_eq!(state, ControlState::default());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botctl.json");
        let state = ControlState { enabled: true, mode: ControlMode::Paper, bankroll: 500.0, ..Default::default() };
        write_state(&path, &state).unwrap();
        let mut reader = ControlPlaneReader::new(&path);
        assert_eq!(reader.poll(), state);
    }

    #[test]
    fn malformed_file_keeps_last_known_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botctl.json");
        let good = ControlState { enabled: true, ..Default::default() };
        write_state(&path, &good).unwrap();
        let mut reader = ControlPlaneReader::new(&path);
        assert_eq!(reader.poll(), good);

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(reader.poll(), good);
    }
}
