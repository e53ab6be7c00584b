//! StandX single-instrument market maker.
//!
//! Wires the pieces together:
//! - REST gateway and webhook notifier from config
//! - WebSocket price feed into the maker's channel
//! - Maker loop until Ctrl-C

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, TelemetryConfig, WalletConfig};
pub use error::{AppError, AppResult};
