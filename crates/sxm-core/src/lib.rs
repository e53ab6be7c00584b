//! Core domain types for the StandX market maker.
//!
//! This crate provides fundamental types used throughout the workspace:
//! - `Price`, `Size`: Precision-safe numeric types with tick/lot alignment
//! - `Symbol`, `InstrumentSpec`: Instrument identity and price conventions
//! - `OrderSide`, `OrderType`, `ClientOrderId`: Trading enums and identifiers
//! - `Clock`: Injectable time source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod instrument;
pub mod order;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decimal::{Price, Size, BPS_DIVISOR};
pub use error::{CoreError, Result};
pub use instrument::{InstrumentSpec, Symbol};
pub use order::{ClientOrderId, OrderSide, OrderType};
