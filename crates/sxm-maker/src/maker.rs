//! Event-driven quoting loop.
//!
//! The maker owns the tracker and is the only writer. Each wake-up (price
//! update, stop signal or 5 s timeout) drains pending prices into the
//! tracker and runs one tick through [`TickStage::ORDER`], stopping at the
//! first stage that reports [`StageOutcome::Handled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sxm_core::{ClientOrderId, Clock, InstrumentSpec, OrderSide, Price, Size};
use sxm_gateway::{DynGateway, GatewayResult, NewOrderRequest};
use sxm_telemetry::{DynNotifier, Metrics, Priority, ReduceJournal};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::config::MakerConfig;
use crate::error::{MakerError, MakerResult};
use crate::pipeline::{StageOutcome, TickStage};
use crate::pricing::quote_price;
use crate::risk::{self, ForceFlatGate};
use crate::tracker::{MarketStateTracker, RestingOrder};

/// Idle wake-up so the force-flat check runs in a quiet market.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a tick that ended in an error.
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Stops a running [`Maker`] from another task.
#[derive(Debug, Clone)]
pub struct MakerHandle {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl MakerHandle {
    /// Request a stop. The loop exits between ticks, never mid-tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

enum LoopEvent {
    Wake,
    Price(Option<Price>),
    Timeout,
}

/// Single-instrument market maker.
pub struct Maker {
    config: MakerConfig,
    spec: InstrumentSpec,
    tracker: MarketStateTracker,
    gateway: DynGateway,
    notifier: DynNotifier,
    clock: Arc<dyn Clock>,
    journal: ReduceJournal,
    force_flat: ForceFlatGate,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Maker {
    /// Validate the config and build an idle maker.
    pub fn new(
        config: MakerConfig,
        gateway: DynGateway,
        notifier: DynNotifier,
        clock: Arc<dyn Clock>,
    ) -> MakerResult<Self> {
        config.validate()?;
        let spec = config.instrument_spec();
        let journal = ReduceJournal::new(config.reduce_log_path.clone());
        let force_flat = ForceFlatGate::new(config.force_flat_check_sec);

        Ok(Self {
            config,
            spec,
            tracker: MarketStateTracker::new(),
            gateway,
            notifier,
            clock,
            journal,
            force_flat,
            running: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        })
    }

    pub fn handle(&self) -> MakerHandle {
        MakerHandle {
            running: self.running.clone(),
            wake: self.wake.clone(),
        }
    }

    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    pub fn spec(&self) -> &InstrumentSpec {
        &self.spec
    }

    pub fn tracker(&self) -> &MarketStateTracker {
        &self.tracker
    }

    /// Seed position and resting quotes from the exchange.
    ///
    /// Failure here is fatal for startup.
    pub async fn initialize(&mut self) -> MakerResult<()> {
        info!(symbol = %self.config.symbol, "Initializing state from exchange");

        let positions = self
            .gateway
            .query_positions(&self.config.symbol)
            .await
            .map_err(MakerError::Init)?;
        let (qty, upnl) = positions
            .first()
            .map(|p| (p.qty, p.upnl))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        self.set_position(qty, upnl);

        let orders = self
            .gateway
            .query_open_orders(&self.config.symbol)
            .await
            .map_err(MakerError::Init)?;
        for order in orders {
            self.tracker.set_order(
                order.side,
                Some(RestingOrder {
                    cl_ord_id: order.cl_ord_id,
                    side: order.side,
                    price: order.price,
                    qty: order.qty,
                }),
            );
        }

        info!(
            position = %self.tracker.position(),
            buy_order = self.tracker.has_order(OrderSide::Buy),
            sell_order = self.tracker.has_order(OrderSide::Sell),
            "Initialized"
        );
        Ok(())
    }

    /// Record a price observation from the feed.
    pub fn on_price_update(&mut self, price: Price) {
        self.tracker
            .update_price(price, self.config.volatility_window_ms(), self.clock.now_ms());
        Metrics::last_price(price.inner().to_f64().unwrap_or_default());
        Metrics::volatility_bps(self.tracker.volatility_bps().to_f64().unwrap_or_default());
    }

    /// Run until stopped via [`MakerHandle::stop`].
    pub async fn run(&mut self, mut prices: mpsc::Receiver<Price>) {
        info!(symbol = %self.config.symbol, "Maker started");
        let wake = self.wake.clone();
        let mut feed_open = true;

        while self.running.load(Ordering::SeqCst) {
            let event = tokio::select! {
                () = wake.notified() => LoopEvent::Wake,
                price = prices.recv(), if feed_open => LoopEvent::Price(price),
                () = tokio::time::sleep(WAIT_TIMEOUT) => LoopEvent::Timeout,
            };

            match event {
                LoopEvent::Price(Some(price)) => self.on_price_update(price),
                LoopEvent::Price(None) => {
                    warn!("Price channel closed, continuing on timer only");
                    feed_open = false;
                }
                LoopEvent::Wake | LoopEvent::Timeout => {}
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            while let Ok(price) = prices.try_recv() {
                self.on_price_update(price);
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "Maker tick error");
                Metrics::tick_error();
                tokio::time::sleep(ERROR_PAUSE).await;
            }
        }

        info!("Maker stopped");
    }

    /// Run one pass of the pipeline. Returns the stage that ended the tick,
    /// or `None` when every stage continued.
    pub async fn tick(&mut self) -> MakerResult<Option<TickStage>> {
        for stage in TickStage::ORDER {
            if self.run_stage(stage).await? == StageOutcome::Handled {
                Metrics::tick_outcome(stage.as_str());
                return Ok(Some(stage));
            }
        }
        Metrics::tick_outcome("complete");
        Ok(None)
    }

    /// Run a single stage in isolation.
    pub async fn run_stage(&mut self, stage: TickStage) -> MakerResult<StageOutcome> {
        let outcome = match stage {
            TickStage::ForceFlat => self.force_flat_check().await,
            TickStage::PriceGate => self.price_gate(),
            TickStage::PositionCap => self.position_cap(),
            TickStage::ProfitTake => self.profit_take().await,
            TickStage::CancelStale => self.cancel_stale().await,
            TickStage::VolatilityGate => self.volatility_gate(),
            TickStage::PlaceQuotes => self.place_quotes().await?,
        };
        Ok(outcome)
    }

    fn price_gate(&self) -> StageOutcome {
        if self.tracker.last_price().is_none() {
            debug!("Waiting for price data");
            return StageOutcome::Handled;
        }
        StageOutcome::Continue
    }

    fn position_cap(&self) -> StageOutcome {
        let position = self.tracker.position();
        if risk::position_cap_reached(position, self.config.max_position) {
            warn!(
                position = %position,
                max_position = %self.config.max_position,
                "Position at cap, pausing quoting"
            );
            return StageOutcome::Handled;
        }
        StageOutcome::Continue
    }

    fn volatility_gate(&self) -> StageOutcome {
        let volatility = self.tracker.volatility_bps();
        if volatility > self.config.volatility_threshold_bps {
            debug!(
                volatility_bps = %volatility.round_dp(2),
                threshold_bps = %self.config.volatility_threshold_bps,
                "Volatility too high, holding"
            );
            return StageOutcome::Handled;
        }
        StageOutcome::Continue
    }

    async fn profit_take(&mut self) -> StageOutcome {
        let max_position = self.config.max_position;
        if !risk::reduce_threshold_exceeded(self.tracker.position(), max_position) {
            return StageOutcome::Continue;
        }

        let position = match self.gateway.query_positions(&self.config.symbol).await {
            Ok(positions) => match positions.into_iter().next() {
                Some(p) => p,
                None => return StageOutcome::Continue,
            },
            Err(e) => {
                error!(error = %e, "Failed to query position for profit-taking");
                return StageOutcome::Continue;
            }
        };
        self.set_position(position.qty, position.upnl);

        let Some(plan) =
            risk::plan_reduction(position.qty, position.upnl, max_position, self.spec.lot_size)
        else {
            debug!(
                position = %position.qty,
                upnl = %position.upnl,
                "Position above threshold but no reduction due"
            );
            return StageOutcome::Continue;
        };

        let request = NewOrderRequest::reduce_only_market(
            self.config.symbol.clone(),
            plan.side,
            self.spec.format_qty(plan.qty),
            ClientOrderId::reduce(),
        );
        let cl_ord_id = request.cl_ord_id.clone();
        info!(
            position = %position.qty,
            qty = %plan.qty,
            side = %plan.side,
            upnl = %position.upnl,
            %cl_ord_id,
            "Reducing position"
        );

        match self.gateway.new_order(request).await {
            Ok(ack) if ack.is_accepted() => {
                Metrics::order_placed("reduce", plan.side.as_str());
                Metrics::reduction();
                self.journal.record_reduce(plan.signed_qty(), position.upnl);
                self.notifier.notify(
                    "Position reduced",
                    &format!(
                        "{} reduced {} ({}), uPnL {}",
                        self.config.symbol,
                        plan.qty,
                        plan.side,
                        position.upnl.round_dp(2)
                    ),
                    Priority::Normal,
                );
                StageOutcome::Handled
            }
            Ok(ack) => {
                Metrics::order_rejected("reduce", plan.side.as_str());
                error!(%cl_ord_id, reason = %ack.reason(), "Reduce order rejected");
                StageOutcome::Continue
            }
            Err(e) => {
                Metrics::order_rejected("reduce", plan.side.as_str());
                error!(%cl_ord_id, error = %e, "Reduce order failed");
                StageOutcome::Continue
            }
        }
    }

    async fn cancel_stale(&mut self) -> StageOutcome {
        let stale = self.tracker.orders_to_cancel(
            self.config.cancel_distance_bps,
            self.config.rebalance_distance_bps,
        );
        if stale.is_empty() {
            return StageOutcome::Continue;
        }

        for order in stale {
            info!(cl_ord_id = %order.cl_ord_id, side = %order.side, price = %order.price, "Cancelling order");
            match self.gateway.cancel_order(&order.cl_ord_id).await {
                Ok(()) => {
                    Metrics::cancel(true);
                    self.tracker.set_order(order.side, None);
                }
                Err(e) => {
                    Metrics::cancel(false);
                    error!(cl_ord_id = %order.cl_ord_id, error = %e, "Failed to cancel order");
                    self.notifier.notify(
                        "Cancel failed",
                        &format!("{} cancel of {} failed: {e}", self.config.symbol, order.cl_ord_id),
                        Priority::High,
                    );
                }
            }
        }

        StageOutcome::Handled
    }

    async fn place_quotes(&mut self) -> MakerResult<StageOutcome> {
        let Some(last) = self.tracker.last_price() else {
            return Ok(StageOutcome::Continue);
        };

        let mut placed_any = false;
        for side in OrderSide::BOTH {
            if self.tracker.has_order(side) {
                continue;
            }
            self.place_quote(side, last).await?;
            placed_any = true;
        }

        Ok(if placed_any {
            StageOutcome::Handled
        } else {
            StageOutcome::Continue
        })
    }

    /// Place one quote on an empty side. Returns whether the exchange
    /// accepted it.
    pub async fn place_quote(&mut self, side: OrderSide, last: Price) -> MakerResult<bool> {
        let price = quote_price(side, last, self.config.order_distance_bps, &self.spec);
        let qty = Size::new(self.config.order_size);
        let cl_ord_id = ClientOrderId::quote(side);

        if !self.tracker.begin_placement(side, cl_ord_id.clone()) {
            return Err(MakerError::SlotOccupied(side));
        }

        let request = NewOrderRequest::limit(
            self.config.symbol.clone(),
            side,
            self.spec.format_qty(qty),
            self.spec.format_price(price),
            cl_ord_id.clone(),
        );
        info!(
            side = %side,
            qty = %request.qty,
            price = request.price.as_deref().unwrap_or_default(),
            %cl_ord_id,
            "Placing order"
        );

        let failure = match self.gateway.new_order(request).await {
            Ok(ack) if ack.is_accepted() => {
                self.tracker.confirm_placement(RestingOrder {
                    cl_ord_id: cl_ord_id.clone(),
                    side,
                    price,
                    qty,
                });
                Metrics::order_placed("quote", side.as_str());
                info!(%cl_ord_id, "Order placed");
                return Ok(true);
            }
            Ok(ack) => ack.reason(),
            Err(e) => e.to_string(),
        };

        self.tracker.abort_placement(side);
        Metrics::order_rejected("quote", side.as_str());
        error!(%cl_ord_id, side = %side, reason = %failure, "Order placement failed");
        self.notifier.notify(
            "Order failed",
            &format!("{} {side} order failed: {failure}", self.config.symbol),
            Priority::High,
        );
        Ok(false)
    }

    async fn force_flat_check(&mut self) -> StageOutcome {
        if !self.force_flat.poll(self.clock.now_ms()) {
            return StageOutcome::Continue;
        }

        let position = match self.gateway.query_positions(&self.config.symbol).await {
            Ok(positions) => positions.into_iter().next(),
            Err(e) => {
                error!(error = %e, "Failed to query position for force-flat");
                self.notifier.notify(
                    "Force-flat check failed",
                    &format!("{} position query failed: {e}", self.config.symbol),
                    Priority::High,
                );
                return StageOutcome::Continue;
            }
        };
        let (qty, upnl) = position
            .map(|p| (p.qty, p.upnl))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        self.set_position(qty, upnl);

        let Some(close_side) = OrderSide::closing(qty) else {
            return StageOutcome::Continue;
        };
        warn!(position = %qty, "Force-flat triggered");

        match self.cancel_all_open_orders().await {
            Ok(count) => {
                self.tracker.clear_all_orders();
                info!(cancelled = count, "Force-flat cancelled open orders");
            }
            Err(e) => {
                error!(error = %e, "Force-flat cancel failed");
                self.notifier.notify(
                    "Cancel failed",
                    &format!("{} cancel before force-flat failed: {e}", self.config.symbol),
                    Priority::High,
                );
            }
        }

        let close_qty = Size::new(qty.abs());
        let request = NewOrderRequest::reduce_only_market(
            self.config.symbol.clone(),
            close_side,
            self.spec.format_qty(close_qty),
            ClientOrderId::flatten(),
        );
        let cl_ord_id = request.cl_ord_id.clone();

        let failure = match self.gateway.new_order(request).await {
            Ok(ack) if ack.is_accepted() => {
                Metrics::force_flat(true);
                Metrics::order_placed("flatten", close_side.as_str());
                info!(%cl_ord_id, qty = %close_qty, side = %close_side, "Force-flat order placed");
                self.notifier.notify(
                    "Position force-flattened",
                    &format!("{} closed {close_qty} ({close_side})", self.config.symbol),
                    Priority::High,
                );
                return StageOutcome::Handled;
            }
            Ok(ack) => ack.reason(),
            Err(e) => e.to_string(),
        };

        Metrics::force_flat(false);
        Metrics::order_rejected("flatten", close_side.as_str());
        error!(%cl_ord_id, reason = %failure, "Force-flat order failed");
        self.notifier.notify(
            "Force-flat failed",
            &format!("{} force-flat failed: {failure}", self.config.symbol),
            Priority::High,
        );
        StageOutcome::Handled
    }

    /// Cancel every open order the exchange reports for the symbol.
    async fn cancel_all_open_orders(&self) -> GatewayResult<usize> {
        let open = self.gateway.query_open_orders(&self.config.symbol).await?;
        let ids: Vec<ClientOrderId> = open.into_iter().map(|o| o.cl_ord_id).collect();
        let count = ids.len();
        if count > 0 {
            self.gateway.cancel_orders(ids).await?;
        }
        Ok(count)
    }

    fn set_position(&mut self, qty: Decimal, upnl: Decimal) {
        self.tracker.update_position_snapshot(qty, upnl);
        Metrics::position(qty.to_f64().unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sxm_core::{ManualClock, OrderType, Symbol};
    use sxm_gateway::{GatewayCall, GatewayError, MockGateway, MockOrderOutcome, OpenOrderInfo};
    use sxm_telemetry::RecordingNotifier;

    use crate::tracker::OrderSlot;

    struct Harness {
        maker: Maker,
        gateway: Arc<MockGateway>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn price(&mut self, ts_ms: u64, value: Decimal) {
            self.clock.set(ts_ms);
            self.maker.on_price_update(Price::new(value));
        }
    }

    fn config() -> MakerConfig {
        MakerConfig {
            symbol: Symbol::parse("BTC-USD").unwrap(),
            order_distance_bps: dec!(10),
            cancel_distance_bps: dec!(5),
            rebalance_distance_bps: dec!(20),
            order_size: dec!(0.1),
            max_position: dec!(1.0),
            volatility_window_sec: 5,
            volatility_threshold_bps: dec!(5),
            force_flat_check_sec: 0,
            tick_size: None,
            reduce_log_path: None,
        }
    }

    fn harness(config: MakerConfig) -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(0));
        let maker = Maker::new(config, gateway.clone(), notifier.clone(), clock.clone()).unwrap();
        Harness {
            maker,
            gateway,
            notifier,
            clock,
        }
    }

    fn open_order(id: &str, side: OrderSide, price: Decimal) -> OpenOrderInfo {
        OpenOrderInfo {
            cl_ord_id: ClientOrderId::from(id),
            side,
            price: Price::new(price),
            qty: Size::new(dec!(0.1)),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_quotes_both_sides() {
        let mut h = harness(config());
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));
        h.price(1_000, dec!(50010));

        let stage = h.maker.tick().await.unwrap();
        assert_eq!(stage, Some(TickStage::PlaceQuotes));

        let orders = h.gateway.new_orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].price.as_deref(), Some("49959.99"));
        assert_eq!(orders[0].qty, "0.100");
        assert_eq!(orders[0].order_type, OrderType::Limit);
        assert!(!orders[0].reduce_only);
        assert!(orders[0].cl_ord_id.as_str().starts_with("mm-buy-"));
        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].price.as_deref(), Some("50060.01"));
        assert!(orders[1].cl_ord_id.as_str().starts_with("mm-sell-"));

        let buy = h.maker.tracker().slot(OrderSide::Buy).resting().unwrap();
        assert_eq!(buy.price, Price::new(dec!(49959.99)));
        assert_eq!(buy.cl_ord_id, orders[0].cl_ord_id);
        let sell = h.maker.tracker().slot(OrderSide::Sell).resting().unwrap();
        assert_eq!(sell.price, Price::new(dec!(50060.01)));

        // Quotes in band, nothing left to do.
        h.gateway.clear_calls();
        assert_eq!(h.maker.tick().await.unwrap(), None);
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_price_means_no_action() {
        let mut h = harness(config());
        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PriceGate));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_position_cap_pauses_quoting() {
        let mut h = harness(config());
        h.gateway.set_position(dec!(-1.0), dec!(-4));
        h.maker.initialize().await.unwrap();
        h.gateway.clear_calls();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PositionCap));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_profit_take_reduces_to_half_of_max() {
        let path = std::env::temp_dir().join(format!("sxm_maker_reduce_{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut cfg = config();
        cfg.reduce_log_path = Some(path.clone());

        let mut h = harness(cfg);
        h.gateway.set_position(dec!(0.8), dec!(25));
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ProfitTake));

        let orders = h.gateway.new_orders();
        assert_eq!(orders.len(), 1);
        let reduce = &orders[0];
        assert_eq!(reduce.side, OrderSide::Sell);
        assert_eq!(reduce.qty, "0.300");
        assert_eq!(reduce.order_type, OrderType::Market);
        assert!(reduce.reduce_only);
        assert!(reduce.price.is_none());
        assert!(reduce.cl_ord_id.as_str().starts_with("reduce-"));
        assert_eq!(h.notifier.count(Priority::Normal), 1);

        let journal = std::fs::read_to_string(&path).unwrap();
        assert!(journal.trim_end().ends_with(",REDUCE,-0.3000,profit_take_upnl_25.00"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_profit_take_skips_without_profit() {
        let mut h = harness(config());
        h.gateway.set_position(dec!(0.8), dec!(-5));
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
        let orders = h.gateway.new_orders();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.order_type == OrderType::Limit));
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_profit_take_uses_fresh_position() {
        let mut h = harness(config());
        h.gateway.set_position(dec!(-0.9), dec!(3));
        h.maker.initialize().await.unwrap();
        h.gateway.set_position(dec!(-0.75), dec!(3));
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ProfitTake));
        let orders = h.gateway.new_orders();
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].qty, "0.250");
        assert_eq!(h.maker.tracker().position(), dec!(-0.75));
    }

    #[tokio::test]
    async fn test_rejected_reduction_continues_to_quoting() {
        let mut h = harness(config());
        h.gateway.set_position(dec!(0.8), dec!(25));
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));
        h.gateway.push_order_outcome(MockOrderOutcome::Reject {
            code: 1,
            message: "reduce only rejected".to_string(),
        });

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
        assert_eq!(h.gateway.new_orders().len(), 3);
        assert!(h.maker.tracker().has_order(OrderSide::Buy));
        assert!(h.maker.tracker().has_order(OrderSide::Sell));
    }

    #[tokio::test]
    async fn test_stale_orders_cancelled_without_replacing() {
        let mut h = harness(config());
        h.gateway.set_open_orders(vec![
            open_order("mm-buy-close", OrderSide::Buy, dec!(49990)),
            open_order("mm-sell-ok", OrderSide::Sell, dec!(50050)),
        ]);
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::CancelStale));
        assert_eq!(h.gateway.cancelled_ids(), vec![ClientOrderId::from("mm-buy-close")]);
        assert!(h.gateway.new_orders().is_empty());
        assert!(!h.maker.tracker().has_order(OrderSide::Buy));
        assert!(h.maker.tracker().has_order(OrderSide::Sell));

        // Next tick re-quotes the empty side only.
        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
        let orders = h.gateway.new_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].price.as_deref(), Some("49950.00"));
    }

    #[tokio::test]
    async fn test_far_order_cancelled() {
        let mut h = harness(config());
        h.gateway.set_open_orders(vec![open_order("mm-sell-far", OrderSide::Sell, dec!(50200))]);
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::CancelStale));
        assert_eq!(h.gateway.cancelled_ids(), vec![ClientOrderId::from("mm-sell-far")]);
    }

    #[tokio::test]
    async fn test_failed_cancel_keeps_shadow_and_alerts() {
        let mut h = harness(config());
        h.gateway.set_open_orders(vec![open_order("mm-buy-close", OrderSide::Buy, dec!(49990))]);
        h.maker.initialize().await.unwrap();
        h.price(0, dec!(50000));
        h.gateway.fail_cancels(Some(GatewayError::HttpClient("timeout".to_string())));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::CancelStale));
        assert!(h.maker.tracker().has_order(OrderSide::Buy));
        assert_eq!(h.notifier.count(Priority::High), 1);
        assert!(h.gateway.new_orders().is_empty());
    }

    #[tokio::test]
    async fn test_volatility_gate_holds_quotes() {
        let mut h = harness(config());
        h.price(0, dec!(50000));
        h.price(1_000, dec!(50100));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::VolatilityGate));
        assert!(h.gateway.new_orders().is_empty());

        // The spike leaves the window after 5 s.
        h.price(7_000, dec!(50100));
        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
    }

    #[tokio::test]
    async fn test_rejected_placement_leaves_slot_empty() {
        let mut h = harness(config());
        h.price(0, dec!(50000));
        h.gateway.push_order_outcome(MockOrderOutcome::Reject {
            code: 400,
            message: "price out of range".to_string(),
        });

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
        assert_eq!(h.maker.tracker().slot(OrderSide::Buy), &OrderSlot::Empty);
        assert!(h.maker.tracker().slot(OrderSide::Sell).resting().is_some());
        assert_eq!(h.notifier.count(Priority::High), 1);
        assert!(h.notifier.sent()[0].message.contains("price out of range"));
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_slot_empty() {
        let mut h = harness(config());
        h.price(0, dec!(50000));
        h.gateway.push_order_outcome(MockOrderOutcome::Fail(GatewayError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
        assert!(!h.maker.tracker().has_order(OrderSide::Buy));
        assert!(h.maker.tracker().has_order(OrderSide::Sell));
    }

    #[tokio::test]
    async fn test_place_quote_refuses_occupied_slot() {
        let mut h = harness(config());
        h.price(0, dec!(50000));
        assert!(h.maker.place_quote(OrderSide::Buy, Price::new(dec!(50000))).await.unwrap());

        let err = h
            .maker
            .place_quote(OrderSide::Buy, Price::new(dec!(50000)))
            .await
            .unwrap_err();
        assert!(matches!(err, MakerError::SlotOccupied(OrderSide::Buy)));
        assert_eq!(h.gateway.new_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_force_flat_cancels_all_and_closes() {
        let mut cfg = config();
        cfg.force_flat_check_sec = 5;
        let mut h = harness(cfg);
        h.gateway.set_position(dec!(0.3), dec!(-2));
        h.gateway.set_open_orders(vec![
            open_order("mm-buy-a", OrderSide::Buy, dec!(49950)),
            open_order("mm-sell-b", OrderSide::Sell, dec!(50050)),
        ]);
        h.maker.initialize().await.unwrap();
        h.gateway.clear_calls();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ForceFlat));

        let symbol = Symbol::parse("BTC-USD").unwrap();
        let calls = h.gateway.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], GatewayCall::QueryPositions(symbol.clone()));
        assert_eq!(calls[1], GatewayCall::QueryOpenOrders(symbol));
        assert_eq!(
            calls[2],
            GatewayCall::CancelOrders(vec![
                ClientOrderId::from("mm-buy-a"),
                ClientOrderId::from("mm-sell-b")
            ])
        );
        let GatewayCall::NewOrder(close) = &calls[3] else {
            panic!("expected close order, got {:?}", calls[3]);
        };
        assert_eq!(close.side, OrderSide::Sell);
        assert_eq!(close.qty, "0.300");
        assert_eq!(close.order_type, OrderType::Market);
        assert!(close.reduce_only);
        assert!(close.cl_ord_id.as_str().starts_with("flat-"));

        assert!(!h.maker.tracker().has_order(OrderSide::Buy));
        assert!(!h.maker.tracker().has_order(OrderSide::Sell));
        assert_eq!(h.notifier.count(Priority::High), 1);

        // Gate not due yet: the check is skipped.
        h.clock.advance(4_999);
        assert_ne!(h.maker.tick().await.unwrap(), Some(TickStage::ForceFlat));
        h.clock.advance(1);
        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ForceFlat));
    }

    #[tokio::test]
    async fn test_force_flat_short_closes_with_buy() {
        let mut cfg = config();
        cfg.force_flat_check_sec = 5;
        let mut h = harness(cfg);
        h.gateway.set_position(dec!(-0.25), dec!(1));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ForceFlat));
        let orders = h.gateway.new_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].qty, "0.250");
        // No open orders: no bulk cancel sent.
        assert!(h.gateway.cancelled_ids().is_empty());
    }

    #[tokio::test]
    async fn test_force_flat_with_no_position_continues() {
        let mut cfg = config();
        cfg.force_flat_check_sec = 5;
        let mut h = harness(cfg);
        h.gateway.clear_positions();
        h.price(0, dec!(50000));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PlaceQuotes));
        assert_eq!(h.gateway.new_orders().len(), 2);
        assert!(h
            .gateway
            .calls()
            .iter()
            .any(|c| matches!(c, GatewayCall::QueryPositions(_))));
    }

    #[tokio::test]
    async fn test_force_flat_cancel_failure_keeps_shadow() {
        let mut cfg = config();
        cfg.force_flat_check_sec = 5;
        let mut h = harness(cfg);
        h.gateway.set_position(dec!(0.3), dec!(0));
        h.gateway.set_open_orders(vec![open_order("mm-buy-a", OrderSide::Buy, dec!(49950))]);
        h.maker.initialize().await.unwrap();
        h.gateway.fail_cancels(Some(GatewayError::HttpClient("down".to_string())));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ForceFlat));
        assert!(h.maker.tracker().has_order(OrderSide::Buy));
        // Close order still sent.
        assert_eq!(h.gateway.new_orders().len(), 1);
        // Cancel failure alert plus close alert.
        assert_eq!(h.notifier.count(Priority::High), 2);
    }

    #[tokio::test]
    async fn test_force_flat_order_failure_is_handled_and_alerted() {
        let mut cfg = config();
        cfg.force_flat_check_sec = 5;
        let mut h = harness(cfg);
        h.gateway.set_position(dec!(0.3), dec!(0));
        h.gateway.push_order_outcome(MockOrderOutcome::Reject {
            code: 9,
            message: "no liquidity".to_string(),
        });

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::ForceFlat));
        let alerts = h.notifier.sent();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].priority, Priority::High);
        assert!(alerts[0].message.contains("no liquidity"));
    }

    #[tokio::test]
    async fn test_force_flat_query_failure_alerts_and_continues() {
        let mut cfg = config();
        cfg.force_flat_check_sec = 5;
        let mut h = harness(cfg);
        h.gateway
            .fail_position_queries(Some(GatewayError::HttpClient("down".to_string())));

        assert_eq!(h.maker.tick().await.unwrap(), Some(TickStage::PriceGate));
        assert_eq!(h.notifier.count(Priority::High), 1);
        assert!(h.gateway.new_orders().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_failure_is_fatal() {
        let mut h = harness(config());
        h.gateway
            .fail_open_order_queries(Some(GatewayError::HttpClient("refused".to_string())));
        let err = h.maker.initialize().await.unwrap_err();
        assert!(matches!(err, MakerError::Init(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut cfg = config();
        cfg.rebalance_distance_bps = dec!(1);
        let result = Maker::new(
            cfg,
            Arc::new(MockGateway::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(MakerError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_quotes_on_price_and_stops() {
        let h = harness(config());
        let gateway = h.gateway.clone();
        let mut maker = h.maker;
        let handle = maker.handle();
        let (tx, rx) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            maker.run(rx).await;
            maker
        });

        tx.send(Price::new(dec!(50000))).await.unwrap();
        for _ in 0..200 {
            if gateway.new_orders().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(gateway.new_orders().len(), 2);

        handle.stop();
        assert!(!handle.is_running());
        let maker = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(maker.tracker().has_order(OrderSide::Buy));
        assert!(maker.tracker().has_order(OrderSide::Sell));
    }

    #[tokio::test]
    async fn test_stop_before_run_exits_immediately() {
        let mut h = harness(config());
        h.maker.handle().stop();
        let (_tx, rx) = mpsc::channel(1);
        tokio::time::timeout(Duration::from_secs(1), h.maker.run(rx))
            .await
            .unwrap();
        assert!(h.gateway.calls().is_empty());
    }
}
