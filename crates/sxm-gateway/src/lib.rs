//! Exchange gateway for the StandX market maker.
//!
//! The maker talks to the exchange only through the [`ExchangeGateway`]
//! trait:
//! - `RestGateway`: reqwest-based client for the perps REST API
//! - `MockGateway`: scripted in-memory double that records every call
//!
//! Request signing and wallet authentication live outside this crate; the
//! REST client only attaches the bearer token it is given.

pub mod error;
pub mod gateway;
pub mod mock;
pub mod rest;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{BoxFuture, DynGateway, ExchangeGateway};
pub use mock::{GatewayCall, MockGateway, MockOrderOutcome};
pub use rest::{GatewayConfig, RestGateway};
pub use types::{NewOrderRequest, OpenOrderInfo, OrderAck, PositionInfo};
