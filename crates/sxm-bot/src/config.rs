//! Application configuration.
//!
//! The quoting parameters sit at the top level of the file next to the
//! `wallet` section; transport, alerting and logging have their own
//! sections with defaults. YAML (`.yaml`/`.yml`) and TOML (`.toml`) are
//! both accepted.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sxm_feed::FeedConfig;
use sxm_gateway::GatewayConfig;
use sxm_maker::MakerConfig;
use sxm_telemetry::NotifyConfig;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AppError, AppResult};

/// Wallet identity used by the authentication layer.
///
/// The private key is wiped on drop and never printed.
#[derive(Clone, Deserialize, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletConfig {
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Usually supplied via `SXM_PRIVATE_KEY`.
    #[serde(default, skip_serializing)]
    pub private_key: String,
}

fn default_chain() -> String {
    "bsc".to_string()
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            private_key: String::new(),
        }
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("chain", &self.chain)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(flatten)]
    pub maker: MakerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from a file, apply environment overrides and validate.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        let mut config = Self::parse(&content, path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse file content, picking the format from the file extension.
    pub fn parse(content: &str, path: &str) -> AppResult<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(content)
                .map_err(|e| AppError::Config(format!("Failed to parse YAML config: {e}"))),
            Some("toml") => toml::from_str(content)
                .map_err(|e| AppError::Config(format!("Failed to parse TOML config: {e}"))),
            _ => Err(AppError::Config(format!(
                "Unsupported config format for {path} (expected .yaml, .yml or .toml)"
            ))),
        }
    }

    /// Secrets and endpoints from the environment win over the file.
    ///
    /// - `SXM_PRIVATE_KEY` -> `wallet.private_key`
    /// - `SXM_API_TOKEN` -> `gateway.api_token`
    /// - `NOTIFY_URL` / `NOTIFY_API_KEY` -> `notify`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("SXM_PRIVATE_KEY") {
            self.wallet.private_key.zeroize();
            self.wallet.private_key = key;
        }
        if let Some(token) = non_empty("SXM_API_TOKEN") {
            self.gateway.api_token = Some(token);
        }
        if let Some(url) = non_empty("NOTIFY_URL") {
            self.notify.url = Some(url);
        }
        if let Some(key) = non_empty("NOTIFY_API_KEY") {
            self.notify.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.maker
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        if self.gateway.timeout_ms == 0 {
            return Err(AppError::Config("gateway.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}
