//! Position risk controls.
//!
//! - Hard cap: quoting pauses once |position| reaches max
//! - Profit-taking: above 70% of max and in profit, cut back to 50% of max
//! - Force-flat: interval gate for the periodic cancel-all-and-close check

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sxm_core::{OrderSide, Size};

/// Profit-taking triggers when |position| is strictly above this share of max.
pub const REDUCE_THRESHOLD_RATIO: Decimal = dec!(0.7);

/// Profit-taking cuts |position| back to this share of max.
pub const REDUCE_TARGET_RATIO: Decimal = dec!(0.5);

/// |position| at or above max.
pub fn position_cap_reached(position: Decimal, max_position: Decimal) -> bool {
    position.abs() >= max_position
}

/// |position| strictly above the profit-taking threshold.
pub fn reduce_threshold_exceeded(position: Decimal, max_position: Decimal) -> bool {
    position.abs() > max_position * REDUCE_THRESHOLD_RATIO
}

/// A reduce-only market order that brings the position back to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionPlan {
    pub side: OrderSide,
    pub qty: Size,
}

impl ReductionPlan {
    /// Signed position change (negative when selling).
    pub fn signed_qty(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.qty.inner(),
            OrderSide::Sell => -self.qty.inner(),
        }
    }
}

/// Plan a profit-taking reduction from a fresh position query.
///
/// `None` when the position is at or under the threshold, when unrealized
/// PnL is not positive, or when the lot-floored quantity is zero.
pub fn plan_reduction(
    position: Decimal,
    upnl: Decimal,
    max_position: Decimal,
    lot_size: Size,
) -> Option<ReductionPlan> {
    if !reduce_threshold_exceeded(position, max_position) || upnl <= Decimal::ZERO {
        return None;
    }
    let target = max_position * REDUCE_TARGET_RATIO;
    let qty = Size::new(position.abs() - target).round_to_lot(lot_size);
    if !qty.is_positive() {
        return None;
    }
    let side = OrderSide::closing(position)?;
    Some(ReductionPlan { side, qty })
}

/// Interval gate for the force-flat check.
///
/// The first poll fires immediately. A poll that fires re-arms the gate at
/// that instant whatever the check then does.
#[derive(Debug, Clone)]
pub struct ForceFlatGate {
    interval_ms: u64,
    last_check_ms: Option<u64>,
}

impl ForceFlatGate {
    /// `interval_sec = 0` disables the gate.
    pub fn new(interval_sec: u64) -> Self {
        Self {
            interval_ms: interval_sec.saturating_mul(1_000),
            last_check_ms: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ms > 0
    }

    /// True when a check is due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if let Some(last) = self.last_check_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return false;
            }
        }
        self.last_check_ms = Some(now_ms);
        true
    }
}
