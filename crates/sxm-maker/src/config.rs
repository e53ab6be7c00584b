//! Market making configuration.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sxm_core::{InstrumentSpec, Symbol};

use crate::error::{MakerError, MakerResult};

/// Quoting and risk parameters. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakerConfig {
    /// Instrument to quote (e.g. "BTC-USD").
    pub symbol: Symbol,

    /// Quote distance from last price in basis points.
    pub order_distance_bps: Decimal,

    /// Orders closer than this to the last price are cancelled.
    pub cancel_distance_bps: Decimal,

    /// Orders further than this from the last price are cancelled.
    #[serde(default = "default_rebalance_distance_bps")]
    pub rebalance_distance_bps: Decimal,

    /// Quantity per quote in base units.
    #[serde(alias = "order_size_btc")]
    pub order_size: Decimal,

    /// Absolute position at which quoting pauses.
    #[serde(alias = "max_position_btc")]
    pub max_position: Decimal,

    /// Rolling window for the volatility gate.
    pub volatility_window_sec: u64,

    /// Quoting holds while the window range exceeds this.
    pub volatility_threshold_bps: Decimal,

    /// Force-flat check interval. 0 disables the check.
    #[serde(default = "default_force_flat_check_sec")]
    pub force_flat_check_sec: u64,

    /// Tick size override for symbols outside the built-in table.
    #[serde(default)]
    pub tick_size: Option<Decimal>,

    /// CSV journal of profit-taking reductions.
    #[serde(default)]
    pub reduce_log_path: Option<PathBuf>,
}

fn default_rebalance_distance_bps() -> Decimal {
    Decimal::from(20)
}

fn default_force_flat_check_sec() -> u64 {
    5
}

impl MakerConfig {
    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> MakerResult<()> {
        if self.order_size <= Decimal::ZERO {
            return Err(MakerError::Config(format!(
                "order_size must be positive, got {}",
                self.order_size
            )));
        }
        if self.max_position <= Decimal::ZERO {
            return Err(MakerError::Config(format!(
                "max_position must be positive, got {}",
                self.max_position
            )));
        }
        if self.order_distance_bps <= Decimal::ZERO {
            return Err(MakerError::Config(format!(
                "order_distance_bps must be positive, got {}",
                self.order_distance_bps
            )));
        }
        if self.cancel_distance_bps < Decimal::ZERO {
            return Err(MakerError::Config(format!(
                "cancel_distance_bps must not be negative, got {}",
                self.cancel_distance_bps
            )));
        }
        if self.rebalance_distance_bps <= self.cancel_distance_bps {
            return Err(MakerError::Config(format!(
                "rebalance_distance_bps ({}) must exceed cancel_distance_bps ({})",
                self.rebalance_distance_bps, self.cancel_distance_bps
            )));
        }
        if self.volatility_window_sec == 0 {
            return Err(MakerError::Config(
                "volatility_window_sec must be at least 1".to_string(),
            ));
        }
        if self.volatility_threshold_bps < Decimal::ZERO {
            return Err(MakerError::Config(format!(
                "volatility_threshold_bps must not be negative, got {}",
                self.volatility_threshold_bps
            )));
        }
        if let Some(tick) = self.tick_size {
            if tick <= Decimal::ZERO {
                return Err(MakerError::Config(format!(
                    "tick_size must be positive, got {tick}"
                )));
            }
        }
        Ok(())
    }

    /// Price and quantity conventions for the configured symbol.
    pub fn instrument_spec(&self) -> InstrumentSpec {
        let spec = InstrumentSpec::for_symbol(&self.symbol);
        match self.tick_size {
            Some(tick) => spec.with_tick_size(tick),
            None => spec,
        }
    }

    pub fn volatility_window_ms(&self) -> u64 {
        self.volatility_window_sec.saturating_mul(1_000)
    }
}
