//! Append-only CSV journal of profit-taking reductions.
//!
//! Line format: `YYYY-MM-DD HH:MM:SS,REDUCE,<signed qty>,profit_take_upnl_<upnl>`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::TelemetryResult;

/// Reduce journal. Disabled when constructed without a path.
#[derive(Debug, Clone, Default)]
pub struct ReduceJournal {
    path: Option<PathBuf>,
}

impl ReduceJournal {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a reduction. `qty_change` is signed: negative when selling.
    ///
    /// Write errors are logged at debug level and dropped.
    pub fn record_reduce(&self, qty_change: Decimal, upnl: Decimal) {
        let Some(path) = &self.path else {
            return;
        };
        let line = format_line(
            &Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            qty_change,
            upnl,
        );
        if let Err(e) = append_line(path, &line) {
            debug!(path = %path.display(), error = %e, "Failed to write reduce journal");
        }
    }
}

fn format_line(timestamp: &str, qty_change: Decimal, upnl: Decimal) -> String {
    let sign = if qty_change.is_sign_negative() { "-" } else { "+" };
    format!(
        "{timestamp},REDUCE,{sign}{:.4},profit_take_upnl_{:.2}",
        qty_change.abs(),
        upnl.round_dp(2)
    )
}

fn append_line(path: &Path, line: &str) -> TelemetryResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}
