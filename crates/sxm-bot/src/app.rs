//! Application wiring and lifecycle.

use std::sync::Arc;

use sxm_core::SystemClock;
use sxm_feed::PriceFeed;
use sxm_gateway::{DynGateway, RestGateway};
use sxm_maker::Maker;
use sxm_telemetry::{Metrics, WebhookNotifier};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Price updates buffered between the feed and the maker loop.
const PRICE_CHANNEL_CAPACITY: usize = 1024;

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the maker against the live exchange.
    ///
    /// Seeds position and resting orders; a failure here aborts startup.
    async fn build_maker(&self) -> AppResult<Maker> {
        let gateway: DynGateway = Arc::new(RestGateway::new(&self.config.gateway)?);
        let notifier = WebhookNotifier::from_config(&self.config.notify)?;

        let mut maker = Maker::new(
            self.config.maker.clone(),
            gateway,
            notifier,
            Arc::new(SystemClock),
        )?;
        maker.initialize().await?;
        Ok(maker)
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        info!(
            symbol = %self.config.maker.symbol,
            base_url = %self.config.gateway.base_url,
            ws_url = %self.config.feed.ws_url,
            "Starting application"
        );

        let mut maker = self.build_maker().await?;
        let handle = maker.handle();

        let (price_tx, price_rx) = mpsc::channel(PRICE_CHANNEL_CAPACITY);
        let feed = Arc::new(PriceFeed::new(
            self.config.feed.clone(),
            self.config.maker.symbol.clone(),
            price_tx,
        ));

        let feed_task = {
            let feed = feed.clone();
            tokio::spawn(async move {
                if let Err(e) = feed.run().await {
                    error!(error = %e, "Price feed terminated");
                }
            })
        };

        let signal_task = {
            let feed = feed.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
                }
                feed.shutdown();
                handle.stop();
            })
        };

        maker.run(price_rx).await;

        feed.shutdown();
        if let Err(e) = feed_task.await {
            warn!(error = %e, "Price feed task join failed");
        }
        signal_task.abort();

        match Metrics::gather_text() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => debug!(error = %e, "Failed to gather metrics"),
        }

        info!("Application stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
symbol: BTC-USD
order_distance_bps: 10
cancel_distance_bps: 5
order_size: 0.1
max_position: 1
volatility_window_sec: 5
volatility_threshold_bps: 5
"#;

    #[test]
    fn test_application_keeps_config() {
        let config = AppConfig::parse(YAML, "config.yaml").unwrap();
        let app = Application::new(config);
        assert_eq!(app.config().maker.symbol.as_str(), "BTC-USD");
    }

    #[tokio::test]
    async fn test_startup_fails_when_exchange_unreachable() {
        let mut config = AppConfig::parse(YAML, "config.yaml").unwrap();
        config.gateway.base_url = "http://127.0.0.1:1".to_string();
        config.gateway.timeout_ms = 500;

        let result = Application::new(config).run().await;
        assert!(matches!(result, Err(crate::AppError::Maker(_))));
    }
}
