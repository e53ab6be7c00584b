//! In-memory gateway double for tests.
//!
//! Holds a scripted exchange state (positions, open orders) and records
//! every call so tests can assert on the exact sequence the maker issued.

use std::collections::VecDeque;

use parking_lot::Mutex;
use sxm_core::{ClientOrderId, OrderType, Price, Size, Symbol};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway};
use crate::types::{NewOrderRequest, OpenOrderInfo, OrderAck, PositionInfo};

/// Recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    QueryPositions(Symbol),
    QueryOpenOrders(Symbol),
    NewOrder(NewOrderRequest),
    CancelOrder(ClientOrderId),
    CancelOrders(Vec<ClientOrderId>),
}

/// Scripted outcome for the next order submission.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOrderOutcome {
    /// Acknowledge with code 0.
    Accept,
    /// Acknowledge with a non-zero code.
    Reject { code: i64, message: String },
    /// Fail at the transport level.
    Fail(GatewayError),
}

#[derive(Debug, Default)]
struct MockState {
    positions: Vec<PositionInfo>,
    open_orders: Vec<OpenOrderInfo>,
    order_outcomes: VecDeque<MockOrderOutcome>,
    position_error: Option<GatewayError>,
    open_orders_error: Option<GatewayError>,
    cancel_error: Option<GatewayError>,
    calls: Vec<GatewayCall>,
}

/// Mock exchange gateway.
///
/// Accepted limit orders rest in the mock's open-order book until
/// cancelled. Without a scripted outcome every order is accepted.
#[derive(Debug, Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the reported position with a single entry.
    pub fn set_position(&self, qty: rust_decimal::Decimal, upnl: rust_decimal::Decimal) {
        self.state.lock().positions = vec![PositionInfo::new(qty, upnl)];
    }

    /// Report no positions at all.
    pub fn clear_positions(&self) {
        self.state.lock().positions.clear();
    }

    pub fn set_open_orders(&self, orders: Vec<OpenOrderInfo>) {
        self.state.lock().open_orders = orders;
    }

    pub fn open_orders(&self) -> Vec<OpenOrderInfo> {
        self.state.lock().open_orders.clone()
    }

    /// Queue an outcome for the next order submission.
    pub fn push_order_outcome(&self, outcome: MockOrderOutcome) {
        self.state.lock().order_outcomes.push_back(outcome);
    }

    pub fn fail_position_queries(&self, error: Option<GatewayError>) {
        self.state.lock().position_error = error;
    }

    pub fn fail_open_order_queries(&self, error: Option<GatewayError>) {
        self.state.lock().open_orders_error = error;
    }

    pub fn fail_cancels(&self, error: Option<GatewayError>) {
        self.state.lock().cancel_error = error;
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded order submissions, oldest first.
    pub fn new_orders(&self) -> Vec<NewOrderRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::NewOrder(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded single and bulk cancels, flattened into one id list.
    pub fn cancelled_ids(&self) -> Vec<ClientOrderId> {
        let state = self.state.lock();
        let mut ids = Vec::new();
        for call in &state.calls {
            match call {
                GatewayCall::CancelOrder(id) => ids.push(id.clone()),
                GatewayCall::CancelOrders(batch) => ids.extend(batch.iter().cloned()),
                _ => {}
            }
        }
        ids
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

impl ExchangeGateway for MockGateway {
    fn query_positions<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<PositionInfo>>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(GatewayCall::QueryPositions(symbol.clone()));
            match &state.position_error {
                Some(e) => Err(e.clone()),
                None => Ok(state.positions.clone()),
            }
        })
    }

    fn query_open_orders<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<OpenOrderInfo>>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(GatewayCall::QueryOpenOrders(symbol.clone()));
            match &state.open_orders_error {
                Some(e) => Err(e.clone()),
                None => Ok(state.open_orders.clone()),
            }
        })
    }

    fn new_order(&self, request: NewOrderRequest) -> BoxFuture<'_, GatewayResult<OrderAck>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(GatewayCall::NewOrder(request.clone()));
            let outcome = state
                .order_outcomes
                .pop_front()
                .unwrap_or(MockOrderOutcome::Accept);

            match outcome {
                MockOrderOutcome::Accept => {
                    if request.order_type == OrderType::Limit {
                        let price = request
                            .price
                            .as_deref()
                            .and_then(|p| p.parse::<Price>().ok())
                            .unwrap_or(Price::ZERO);
                        let qty = request.qty.parse::<Size>().unwrap_or(Size::ZERO);
                        state.open_orders.push(OpenOrderInfo {
                            cl_ord_id: request.cl_ord_id.clone(),
                            side: request.side,
                            price,
                            qty,
                        });
                    }
                    Ok(OrderAck::accepted())
                }
                MockOrderOutcome::Reject { code, message } => Ok(OrderAck::rejected(code, message)),
                MockOrderOutcome::Fail(e) => Err(e),
            }
        })
    }

    fn cancel_order<'a>(
        &'a self,
        cl_ord_id: &'a ClientOrderId,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(GatewayCall::CancelOrder(cl_ord_id.clone()));
            if let Some(e) = &state.cancel_error {
                return Err(e.clone());
            }
            state.open_orders.retain(|o| &o.cl_ord_id != cl_ord_id);
            Ok(())
        })
    }

    fn cancel_orders(&self, cl_ord_ids: Vec<ClientOrderId>) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.calls.push(GatewayCall::CancelOrders(cl_ord_ids.clone()));
            if let Some(e) = &state.cancel_error {
                return Err(e.clone());
            }
            state.open_orders.retain(|o| !cl_ord_ids.contains(&o.cl_ord_id));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sxm_core::OrderSide;

    fn symbol() -> Symbol {
        Symbol::parse("BTC-USD").unwrap()
    }

    fn limit(side: OrderSide, id: &str) -> NewOrderRequest {
        NewOrderRequest::limit(
            symbol(),
            side,
            "0.100".to_string(),
            "50000.00".to_string(),
            ClientOrderId::from(id),
        )
    }

    #[tokio::test]
    async fn test_accepted_limit_order_rests() {
        let gw = MockGateway::new();
        let ack = gw.new_order(limit(OrderSide::Buy, "mm-buy-1")).await.unwrap();
        assert!(ack.is_accepted());

        let open = gw.query_open_orders(&symbol()).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].price, Price::new(dec!(50000.00)));
        assert_eq!(open[0].qty, Size::new(dec!(0.100)));
    }

    #[tokio::test]
    async fn test_scripted_outcomes_in_order() {
        let gw = MockGateway::new();
        gw.push_order_outcome(MockOrderOutcome::Reject {
            code: 400,
            message: "post only".to_string(),
        });
        gw.push_order_outcome(MockOrderOutcome::Fail(GatewayError::HttpClient(
            "timeout".to_string(),
        )));

        let first = gw.new_order(limit(OrderSide::Buy, "a")).await.unwrap();
        assert!(!first.is_accepted());
        assert!(gw.new_order(limit(OrderSide::Buy, "b")).await.is_err());
        assert!(gw.new_order(limit(OrderSide::Buy, "c")).await.unwrap().is_accepted());
        assert_eq!(gw.open_orders().len(), 1);
        assert_eq!(gw.new_orders().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_removes_and_records() {
        let gw = MockGateway::new();
        gw.new_order(limit(OrderSide::Buy, "a")).await.unwrap();
        gw.new_order(limit(OrderSide::Sell, "b")).await.unwrap();

        gw.cancel_order(&ClientOrderId::from("a")).await.unwrap();
        assert_eq!(gw.open_orders().len(), 1);

        gw.cancel_orders(vec![ClientOrderId::from("b")]).await.unwrap();
        assert!(gw.open_orders().is_empty());
        assert_eq!(
            gw.cancelled_ids(),
            vec![ClientOrderId::from("a"), ClientOrderId::from("b")]
        );
    }

    #[tokio::test]
    async fn test_failures_are_scripted() {
        let gw = MockGateway::new();
        gw.set_position(dec!(0.5), dec!(12));
        gw.fail_position_queries(Some(GatewayError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }));
        assert!(gw.query_positions(&symbol()).await.is_err());

        gw.fail_position_queries(None);
        let positions = gw.query_positions(&symbol()).await.unwrap();
        assert_eq!(positions, vec![PositionInfo::new(dec!(0.5), dec!(12))]);

        gw.fail_cancels(Some(GatewayError::HttpClient("down".to_string())));
        assert!(gw.cancel_order(&ClientOrderId::from("x")).await.is_err());
        assert_eq!(gw.calls().len(), 3);
    }
}
