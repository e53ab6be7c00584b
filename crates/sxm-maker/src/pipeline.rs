//! Tick pipeline stages.

use std::fmt;

/// Result of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage acted (or deliberately held); the tick ends here.
    Handled,
    /// Hand over to the next stage.
    Continue,
}

/// Pipeline stages, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickStage {
    /// Periodic cancel-all-and-close when a position is open.
    ForceFlat,
    /// Nothing to quote around before the first price.
    PriceGate,
    /// Pause at max position.
    PositionCap,
    /// Reduce-only cut of a profitable large position.
    ProfitTake,
    /// Cancel quotes that drifted too close or too far.
    CancelStale,
    /// Hold while the price window is too wide.
    VolatilityGate,
    /// Fill empty sides.
    PlaceQuotes,
}

impl TickStage {
    /// Execution order of a tick.
    pub const ORDER: [TickStage; 7] = [
        TickStage::ForceFlat,
        TickStage::PriceGate,
        TickStage::PositionCap,
        TickStage::ProfitTake,
        TickStage::CancelStale,
        TickStage::VolatilityGate,
        TickStage::PlaceQuotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForceFlat => "force_flat",
            Self::PriceGate => "price_gate",
            Self::PositionCap => "position_cap",
            Self::ProfitTake => "profit_take",
            Self::CancelStale => "cancel_stale",
            Self::VolatilityGate => "volatility_gate",
            Self::PlaceQuotes => "place_quotes",
        }
    }
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
