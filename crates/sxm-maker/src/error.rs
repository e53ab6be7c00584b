//! Maker error types.

use sxm_core::OrderSide;
use sxm_gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MakerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(#[source] GatewayError),

    #[error("{0} slot already holds an order")]
    SlotOccupied(OrderSide),
}

pub type MakerResult<T> = Result<T, MakerError>;
