//! Market state tracker.
//!
//! Latest price, a time-bounded price window for volatility, the shadow of
//! the two resting quotes and the net position. No I/O: the maker feeds
//! it from the price stream and from exchange query results.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use sxm_core::{ClientOrderId, OrderSide, Price, Size, BPS_DIVISOR};

/// Time-bounded window of `(timestamp_ms, price)` samples.
///
/// Timestamps never decrease: a sample stamped earlier than the newest one
/// is recorded at the newest timestamp.
#[derive(Debug, Clone, Default)]
pub struct PriceWindow {
    samples: VecDeque<(u64, Price)>,
}

impl PriceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and evict everything older than `now_ms - window_ms`.
    /// A sample exactly `window_ms` old stays.
    pub fn push(&mut self, now_ms: u64, price: Price, window_ms: u64) {
        let ts = match self.samples.back() {
            Some(&(last_ts, _)) => now_ms.max(last_ts),
            None => now_ms,
        };
        self.samples.push_back((ts, price));

        let cutoff = ts.saturating_sub(window_ms);
        while let Some(&(oldest_ts, _)) = self.samples.front() {
            if oldest_ts >= cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn oldest(&self) -> Option<(u64, Price)> {
        self.samples.front().copied()
    }

    /// Price range as bps of the oldest sample: `(max - min) / oldest * 10000`.
    ///
    /// Zero with fewer than two samples.
    pub fn volatility_bps(&self) -> Decimal {
        if self.samples.len() < 2 {
            return Decimal::ZERO;
        }
        let Some(&(_, oldest)) = self.samples.front() else {
            return Decimal::ZERO;
        };
        if oldest.is_zero() {
            return Decimal::ZERO;
        }

        let mut min = oldest;
        let mut max = oldest;
        for &(_, p) in &self.samples {
            min = min.min(p);
            max = max.max(p);
        }
        (max - min).inner() / oldest.inner() * BPS_DIVISOR
    }
}

/// A quote confirmed resting on the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub cl_ord_id: ClientOrderId,
    pub side: OrderSide,
    /// Tick-aligned price sent to the exchange.
    pub price: Price,
    pub qty: Size,
}

/// Shadow of one side of the book.
///
/// `Empty -> Pending -> Confirmed -> Empty`; a rejected or failed
/// placement goes `Pending -> Empty`. Only an `Empty` slot accepts a new
/// placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrderSlot {
    #[default]
    Empty,
    /// Placement submitted, acknowledgment outstanding.
    Pending(ClientOrderId),
    Confirmed(RestingOrder),
}

impl OrderSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn resting(&self) -> Option<&RestingOrder> {
        match self {
            Self::Confirmed(order) => Some(order),
            _ => None,
        }
    }
}

/// Position as of the last authoritative query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionSnapshot {
    /// Signed quantity (positive = long).
    pub qty: Decimal,
    /// Unrealized PnL reported with the quantity.
    pub upnl: Decimal,
}

/// Single-instrument market state.
#[derive(Debug, Clone, Default)]
pub struct MarketStateTracker {
    last_price: Option<Price>,
    window: PriceWindow,
    buy: OrderSlot,
    sell: OrderSlot,
    position: PositionSnapshot,
}

impl MarketStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price observation.
    pub fn update_price(&mut self, price: Price, window_ms: u64, now_ms: u64) {
        self.window.push(now_ms, price, window_ms);
        self.last_price = Some(price);
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn volatility_bps(&self) -> Decimal {
        self.window.volatility_bps()
    }

    /// Overwrite the position quantity, keeping the last known PnL.
    pub fn update_position(&mut self, qty: Decimal) {
        self.position.qty = qty;
    }

    pub fn update_position_snapshot(&mut self, qty: Decimal, upnl: Decimal) {
        self.position = PositionSnapshot { qty, upnl };
    }

    pub fn position(&self) -> Decimal {
        self.position.qty
    }

    pub fn position_snapshot(&self) -> PositionSnapshot {
        self.position
    }

    pub fn slot(&self, side: OrderSide) -> &OrderSlot {
        match side {
            OrderSide::Buy => &self.buy,
            OrderSide::Sell => &self.sell,
        }
    }

    fn slot_mut(&mut self, side: OrderSide) -> &mut OrderSlot {
        match side {
            OrderSide::Buy => &mut self.buy,
            OrderSide::Sell => &mut self.sell,
        }
    }

    /// True unless the side's slot is `Empty`.
    pub fn has_order(&self, side: OrderSide) -> bool {
        !self.slot(side).is_empty()
    }

    /// Replace the side's shadow with a confirmed order, or clear it.
    pub fn set_order(&mut self, side: OrderSide, order: Option<RestingOrder>) {
        *self.slot_mut(side) = match order {
            Some(order) => OrderSlot::Confirmed(order),
            None => OrderSlot::Empty,
        };
    }

    /// `Empty -> Pending`. Returns false, leaving the slot untouched, when
    /// the slot is occupied.
    pub fn begin_placement(&mut self, side: OrderSide, cl_ord_id: ClientOrderId) -> bool {
        let slot = self.slot_mut(side);
        if !slot.is_empty() {
            return false;
        }
        *slot = OrderSlot::Pending(cl_ord_id);
        true
    }

    /// `Pending -> Confirmed` after acknowledgment.
    pub fn confirm_placement(&mut self, order: RestingOrder) {
        let side = order.side;
        *self.slot_mut(side) = OrderSlot::Confirmed(order);
    }

    /// `Pending -> Empty` after rejection or transport failure.
    pub fn abort_placement(&mut self, side: OrderSide) {
        let slot = self.slot_mut(side);
        if matches!(slot, OrderSlot::Pending(_)) {
            *slot = OrderSlot::Empty;
        }
    }

    pub fn clear_all_orders(&mut self) {
        self.buy = OrderSlot::Empty;
        self.sell = OrderSlot::Empty;
    }

    /// Confirmed orders strictly closer than `cancel_bps` or strictly
    /// further than `rebalance_bps` from the last price. Empty before the
    /// first price.
    pub fn orders_to_cancel(&self, cancel_bps: Decimal, rebalance_bps: Decimal) -> Vec<RestingOrder> {
        let Some(last) = self.last_price else {
            return Vec::new();
        };

        OrderSide::BOTH
            .iter()
            .filter_map(|&side| self.slot(side).resting())
            .filter(|order| match order.price.distance_bps(last) {
                Some(distance) => distance < cancel_bps || distance > rebalance_bps,
                None => false,
            })
            .cloned()
            .collect()
    }
}
