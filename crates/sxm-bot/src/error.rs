//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] sxm_gateway::GatewayError),

    #[error("Maker error: {0}")]
    Maker(#[from] sxm_maker::MakerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sxm_telemetry::TelemetryError),
}

pub type AppResult<T> = Result<T, AppError>;
