//! Quoting engine for a single perpetual instrument.
//!
//! Keeps one resting bid and one resting ask near the last price and
//! re-quotes as price moves, under three position controls:
//! - hard cap: stop quoting at max position
//! - profit-taking: cut a profitable position back to half of max
//! - force-flat: periodically cancel everything and close any position
//!
//! [`Maker`] owns the [`MarketStateTracker`] and runs the fixed-order tick
//! pipeline described by [`TickStage::ORDER`].

pub mod config;
pub mod error;
pub mod maker;
pub mod pipeline;
pub mod pricing;
pub mod risk;
pub mod tracker;

pub use config::MakerConfig;
pub use error::{MakerError, MakerResult};
pub use maker::{Maker, MakerHandle};
pub use pipeline::{StageOutcome, TickStage};
pub use pricing::quote_price;
pub use risk::{ForceFlatGate, ReductionPlan, REDUCE_TARGET_RATIO, REDUCE_THRESHOLD_RATIO};
pub use tracker::{MarketStateTracker, OrderSlot, PositionSnapshot, PriceWindow, RestingOrder};
