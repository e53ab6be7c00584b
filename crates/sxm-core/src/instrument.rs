//! Instrument identity and price conventions.
//!
//! The exchange quotes different symbol families on different price grids.
//! The grid is a lookup keyed by symbol prefix, with a coarser default for
//! everything not listed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};
use crate::error::CoreError;

/// Exchange symbol (e.g. `BTC-USD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(CoreError::InvalidSymbol(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Price and quantity conventions for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Minimum price increment.
    pub tick_size: Price,
    /// Decimals used when rendering prices.
    pub price_decimals: u32,
    /// Minimum quantity increment.
    pub lot_size: Size,
    /// Decimals used when rendering quantities.
    pub qty_decimals: u32,
}

/// Known symbol families: (symbol prefix, tick size scaled integer, scale).
const FAMILIES: &[(&str, i64, u32)] = &[("BTC", 1, 2)];

/// Grid used for every symbol not listed in `FAMILIES`.
const DEFAULT_TICK: (i64, u32) = (1, 1);

const QTY_DECIMALS: u32 = 3;

impl InstrumentSpec {
    /// Look up the conventions for a symbol.
    pub fn for_symbol(symbol: &Symbol) -> Self {
        let (tick, scale) = FAMILIES
            .iter()
            .find(|(prefix, _, _)| symbol.as_str().starts_with(prefix))
            .map(|(_, tick, scale)| (*tick, *scale))
            .unwrap_or(DEFAULT_TICK);

        Self {
            tick_size: Price::new(Decimal::new(tick, scale)),
            price_decimals: scale,
            lot_size: Size::new(Decimal::new(1, QTY_DECIMALS)),
            qty_decimals: QTY_DECIMALS,
        }
    }

    /// Apply an explicit tick size override.
    ///
    /// Price decimals follow the scale of the override (0.5 → 1, 0.25 → 2).
    pub fn with_tick_size(mut self, tick_size: Decimal) -> Self {
        let normalized = tick_size.normalize();
        self.tick_size = Price::new(normalized);
        self.price_decimals = normalized.scale();
        self
    }

    /// Render a price for the wire.
    pub fn format_price(&self, price: Price) -> String {
        price.render(self.price_decimals)
    }

    /// Render a quantity for the wire.
    pub fn format_qty(&self, qty: Size) -> String {
        qty.render(self.qty_decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn test_btc_family_uses_fine_tick() {
        let spec = InstrumentSpec::for_symbol(&sym("BTC-USD"));
        assert_eq!(spec.tick_size.inner(), dec!(0.01));
        assert_eq!(spec.price_decimals, 2);
        assert_eq!(spec.qty_decimals, 3);
    }

    #[test]
    fn test_other_symbols_use_default_tick() {
        let spec = InstrumentSpec::for_symbol(&sym("ETH-USD"));
        assert_eq!(spec.tick_size.inner(), dec!(0.1));
        assert_eq!(spec.price_decimals, 1);
    }

    #[test]
    fn test_tick_override() {
        let spec = InstrumentSpec::for_symbol(&sym("SOL-USD")).with_tick_size(dec!(0.010));
        assert_eq!(spec.tick_size.inner(), dec!(0.01));
        assert_eq!(spec.price_decimals, 2);
    }

    #[test]
    fn test_format() {
        let spec = InstrumentSpec::for_symbol(&sym("BTC-USD"));
        assert_eq!(spec.format_price(Price::new(dec!(49959.99))), "49959.99");
        assert_eq!(spec.format_qty(Size::new(dec!(0.1))), "0.100");
    }

    #[test]
    fn test_symbol_validation() {
        assert!(Symbol::parse("").is_err());
        assert!(Symbol::parse("BTC USD").is_err());
        assert_eq!(sym(" BTC-USD ").as_str(), "BTC-USD");
    }
}
