//! Exchange gateway trait.
//!
//! Object-safe so the maker can hold an `Arc<dyn ExchangeGateway>` and tests
//! can inject [`crate::MockGateway`].

use std::pin::Pin;
use std::sync::Arc;

use sxm_core::{ClientOrderId, Symbol};

use crate::error::GatewayResult;
use crate::types::{NewOrderRequest, OpenOrderInfo, OrderAck, PositionInfo};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Signed REST calls against the exchange.
pub trait ExchangeGateway: Send + Sync {
    /// Current positions for `symbol` (normally zero or one entry).
    fn query_positions<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<PositionInfo>>>;

    /// Open orders for `symbol`.
    fn query_open_orders<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<OpenOrderInfo>>>;

    /// Submit an order. A returned `OrderAck` may still be a rejection;
    /// check [`OrderAck::is_accepted`].
    fn new_order(&self, request: NewOrderRequest) -> BoxFuture<'_, GatewayResult<OrderAck>>;

    /// Cancel a single order by client order id.
    fn cancel_order<'a>(&'a self, cl_ord_id: &'a ClientOrderId)
        -> BoxFuture<'a, GatewayResult<()>>;

    /// Cancel several orders in one request.
    fn cancel_orders(&self, cl_ord_ids: Vec<ClientOrderId>) -> BoxFuture<'_, GatewayResult<()>>;
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn ExchangeGateway>;
