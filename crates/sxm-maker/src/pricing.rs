//! Quote price alignment.
//!
//! Bids floor and asks ceil to the tick grid, so the quoted distance from
//! the last price is never tighter than configured.

use rust_decimal::Decimal;
use sxm_core::{InstrumentSpec, OrderSide, Price};

/// Tick-aligned quote price `distance_bps` away from `last`.
pub fn quote_price(
    side: OrderSide,
    last: Price,
    distance_bps: Decimal,
    spec: &InstrumentSpec,
) -> Price {
    match side {
        OrderSide::Buy => last.offset_bps(-distance_bps).floor_to_tick(spec.tick_size),
        OrderSide::Sell => last.offset_bps(distance_bps).ceil_to_tick(spec.tick_size),
    }
}
