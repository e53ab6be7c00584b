//! Request and response types at the gateway boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sxm_core::{ClientOrderId, OrderSide, OrderType, Price, Size, Symbol};

/// Position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionInfo {
    /// Signed quantity (positive = long, negative = short).
    pub qty: Decimal,
    /// Unrealized PnL in quote currency.
    pub upnl: Decimal,
}

impl PositionInfo {
    pub fn new(qty: Decimal, upnl: Decimal) -> Self {
        Self { qty, upnl }
    }

    pub fn flat() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }
}

/// Open order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrderInfo {
    pub cl_ord_id: ClientOrderId,
    pub side: OrderSide,
    pub price: Price,
    pub qty: Size,
}

/// Order submission. Price and quantity are already tick/lot aligned and
/// rendered with the instrument's fixed decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: String,
    /// `None` for market orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub time_in_force: &'static str,
    pub reduce_only: bool,
    pub cl_ord_id: ClientOrderId,
}

impl NewOrderRequest {
    /// Resting good-til-cancelled limit order.
    pub fn limit(
        symbol: Symbol,
        side: OrderSide,
        qty: String,
        price: String,
        cl_ord_id: ClientOrderId,
    ) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Limit,
            qty,
            price: Some(price),
            time_in_force: "gtc",
            reduce_only: false,
            cl_ord_id,
        }
    }

    /// Reduce-only immediate-or-cancel market order.
    pub fn reduce_only_market(
        symbol: Symbol,
        side: OrderSide,
        qty: String,
        cl_ord_id: ClientOrderId,
    ) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            qty,
            price: None,
            time_in_force: "ioc",
            reduce_only: true,
            cl_ord_id,
        }
    }
}

/// Exchange acknowledgment of an order submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderAck {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl OrderAck {
    pub fn accepted() -> Self {
        Self {
            code: Some(0),
            message: None,
            id: None,
        }
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: Some(message.into()),
            id: None,
        }
    }

    /// Code 0, or the presence of an order id, signals acceptance.
    pub fn is_accepted(&self) -> bool {
        self.code == Some(0) || self.id.as_ref().is_some_and(|id| !id.is_null())
    }

    /// Human-readable rejection reason for logs and alerts.
    pub fn reason(&self) -> String {
        match (&self.code, &self.message) {
            (_, Some(message)) => message.clone(),
            (Some(code), None) => format!("code {code}"),
            (None, None) => "no code in response".to_string(),
        }
    }
}
