//! Order-related types and identifiers.
//!
//! Provides order side, order type, and client order ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Both sides, bid first.
    pub const BOTH: [OrderSide; 2] = [OrderSide::Buy, OrderSide::Sell];

    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Side that closes a signed position (long closes with sell).
    ///
    /// Returns `None` for a flat position.
    pub fn closing(position_qty: rust_decimal::Decimal) -> Option<Self> {
        if position_qty.is_sign_positive() && !position_qty.is_zero() {
            Some(Self::Sell)
        } else if position_qty.is_sign_negative() && !position_qty.is_zero() {
            Some(Self::Buy)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Resting limit order (quotes).
    #[default]
    Limit,
    /// Market order (reductions and force-flat only).
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// Client order ID for idempotency and log correlation.
///
/// Every submission gets a fresh id so that duplicate submissions can be
/// detected by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID with the given prefix.
    ///
    /// Format: `{prefix}-{uuid_short}`
    pub fn generate(prefix: &str) -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}", &simple[..8]))
    }

    /// Id for a resting quote: `mm-buy-xxxxxxxx` / `mm-sell-xxxxxxxx`.
    pub fn quote(side: OrderSide) -> Self {
        Self::generate(&format!("mm-{side}"))
    }

    /// Id for a profit-taking reduction.
    pub fn reduce() -> Self {
        Self::generate("reduce")
    }

    /// Id for a force-flat close.
    pub fn flatten() -> Self {
        Self::generate("flat")
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl From<&str> for ClientOrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_closing_side() {
        assert_eq!(OrderSide::closing(dec!(0.4)), Some(OrderSide::Sell));
        assert_eq!(OrderSide::closing(dec!(-0.4)), Some(OrderSide::Buy));
        assert_eq!(OrderSide::closing(dec!(0)), None);
    }

    #[test]
    fn test_client_order_id_unique() {
        let id1 = ClientOrderId::quote(OrderSide::Buy);
        let id2 = ClientOrderId::quote(OrderSide::Buy);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_client_order_id_format() {
        let id = ClientOrderId::quote(OrderSide::Sell);
        assert!(id.as_str().starts_with("mm-sell-"));
        assert_eq!(id.as_str().len(), "mm-sell-".len() + 8);
        assert!(ClientOrderId::reduce().as_str().starts_with("reduce-"));
        assert!(ClientOrderId::flatten().as_str().starts_with("flat-"));
    }

    #[test]
    fn test_side_serde_lowercase() {
        let json = serde_json::to_string(&OrderSide::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
        let side: OrderSide = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(side, OrderSide::Sell);
    }
}
