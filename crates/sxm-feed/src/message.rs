//! Price channel wire format.
//!
//! Price pushes look like
//! `{"channel": "price", "data": {"symbol": "BTC-USD", "last_price": "50000.1", "mark_price": "50000.3"}}`.
//! Some frames carry the fields at the top level instead of under `data`.
//! Prices may be strings or numbers.

use serde_json::{json, Value};
use sxm_core::{Price, Symbol};

/// Subscription request for the price channel of `symbol`.
pub fn subscribe_request(symbol: &Symbol) -> Value {
    json!({
        "subscribe": {
            "channel": "price",
            "symbol": symbol.as_str(),
        }
    })
}

/// Extract the last price from a price frame, falling back to the mark
/// price. Returns `None` for frames that carry neither, for other
/// channels, for other symbols, and for non-positive prices.
pub fn parse_price_message(text: &str, symbol: &Symbol) -> Option<Price> {
    let value: Value = serde_json::from_str(text).ok()?;

    if let Some(channel) = value.get("channel").and_then(Value::as_str) {
        if channel != "price" {
            return None;
        }
    }

    let body = match value.get("data") {
        Some(data) if data.is_object() => data,
        _ => &value,
    };

    if let Some(s) = body.get("symbol").and_then(Value::as_str) {
        if s != symbol.as_str() {
            return None;
        }
    }

    field_price(body, "last_price").or_else(|| field_price(body, "mark_price"))
}

fn field_price(body: &Value, key: &str) -> Option<Price> {
    let raw = match body.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Price::parse_positive(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::parse("BTC-USD").unwrap()
    }

    #[test]
    fn test_subscribe_request() {
        let req = subscribe_request(&btc());
        assert_eq!(req["subscribe"]["channel"], "price");
        assert_eq!(req["subscribe"]["symbol"], "BTC-USD");
    }

    #[test]
    fn test_parse_nested_last_price() {
        let text = r#"{"channel":"price","data":{"symbol":"BTC-USD","last_price":"50010.5","mark_price":"50011"}}"#;
        assert_eq!(parse_price_message(text, &btc()), Some(Price::new(dec!(50010.5))));
    }

    #[test]
    fn test_parse_falls_back_to_mark_price() {
        let text = r#"{"channel":"price","data":{"symbol":"BTC-USD","mark_price":50011.25}}"#;
        assert_eq!(parse_price_message(text, &btc()), Some(Price::new(dec!(50011.25))));
    }

    #[test]
    fn test_parse_top_level_fields() {
        let text = r#"{"symbol":"BTC-USD","last_price":"42.1"}"#;
        assert_eq!(parse_price_message(text, &btc()), Some(Price::new(dec!(42.1))));
    }

    #[test]
    fn test_parse_rejects_unusable_frames() {
        let other_channel = r#"{"channel":"depth","data":{"last_price":"1"}}"#;
        let other_symbol = r#"{"channel":"price","data":{"symbol":"ETH-USD","last_price":"1"}}"#;
        let zero = r#"{"channel":"price","data":{"last_price":"0"}}"#;
        let missing = r#"{"channel":"price","data":{"symbol":"BTC-USD"}}"#;
        for text in [other_channel, other_symbol, zero, missing, "not json"] {
            assert_eq!(parse_price_message(text, &btc()), None, "{text}");
        }
    }
}
