//! Prometheus metrics for the market maker.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`: a failure means a duplicate metric
//! name, which is a programming error and only surfaces during static
//! initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Orders acknowledged by the exchange.
/// Labels: kind (quote/reduce/flatten), side
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sxm_orders_placed_total",
        "Orders accepted by the exchange",
        &["kind", "side"]
    )
    .unwrap()
});

/// Orders rejected or failed in transport.
/// Labels: kind (quote/reduce/flatten), side
pub static ORDERS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sxm_orders_rejected_total",
        "Orders rejected by the exchange or failed in transport",
        &["kind", "side"]
    )
    .unwrap()
});

/// Cancel attempts by result (ok/failed).
pub static CANCELS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sxm_cancels_total",
        "Cancel attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Profit-taking reductions executed.
pub static REDUCTIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sxm_reductions_total",
        "Profit-taking position reductions executed"
    )
    .unwrap()
});

/// Forced flattens by result (ok/failed).
pub static FORCE_FLATS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sxm_force_flats_total",
        "Forced flatten attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Tick outcomes by the stage that handled the tick.
pub static TICK_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sxm_tick_outcomes_total",
        "Ticks by handling stage",
        &["stage"]
    )
    .unwrap()
});

/// Ticks aborted by an error.
pub static TICK_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("sxm_tick_errors_total", "Ticks aborted by an error").unwrap()
});

/// Net position in base units.
pub static POSITION: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("sxm_position", "Net position in base units").unwrap());

/// Rolling-window volatility in basis points.
pub static VOLATILITY_BPS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sxm_volatility_bps",
        "Rolling-window price range in basis points"
    )
    .unwrap()
});

/// Last observed price.
pub static LAST_PRICE: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("sxm_last_price", "Last observed price").unwrap());

/// Price feed connection state (1 = connected).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sxm_feed_connected",
        "Price feed connection state (1=connected)"
    )
    .unwrap()
});

/// Price feed reconnect attempts.
pub static FEED_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sxm_feed_reconnect_total",
        "Price feed reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    pub fn order_placed(kind: &str, side: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[kind, side]).inc();
    }

    pub fn order_rejected(kind: &str, side: &str) {
        ORDERS_REJECTED_TOTAL.with_label_values(&[kind, side]).inc();
    }

    pub fn cancel(ok: bool) {
        let result = if ok { "ok" } else { "failed" };
        CANCELS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn reduction() {
        REDUCTIONS_TOTAL.inc();
    }

    pub fn force_flat(ok: bool) {
        let result = if ok { "ok" } else { "failed" };
        FORCE_FLATS_TOTAL.with_label_values(&[result]).inc();
    }

    /// Record the stage that ended a tick ("complete" when every stage
    /// continued).
    pub fn tick_outcome(stage: &str) {
        TICK_OUTCOMES_TOTAL.with_label_values(&[stage]).inc();
    }

    pub fn tick_error() {
        TICK_ERRORS_TOTAL.inc();
    }

    pub fn position(qty: f64) {
        POSITION.set(qty);
    }

    pub fn volatility_bps(bps: f64) {
        VOLATILITY_BPS.set(bps);
    }

    pub fn last_price(price: f64) {
        LAST_PRICE.set(price);
    }

    pub fn feed_connected() {
        FEED_CONNECTED.set(1.0);
    }

    pub fn feed_disconnected() {
        FEED_CONNECTED.set(0.0);
    }

    pub fn feed_reconnect(reason: &str) {
        FEED_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = REDUCTIONS_TOTAL.get();
        Metrics::reduction();
        assert!(REDUCTIONS_TOTAL.get() >= before + 1.0);

        let before = CANCELS_TOTAL.with_label_values(&["failed"]).get();
        Metrics::cancel(false);
        assert!(CANCELS_TOTAL.with_label_values(&["failed"]).get() >= before + 1.0);
    }

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        Metrics::order_placed("quote", "buy");
        Metrics::position(0.25);
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("sxm_orders_placed_total"));
        assert!(text.contains("sxm_position"));
    }
}
