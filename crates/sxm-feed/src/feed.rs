//! WebSocket price feed with reconnection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sxm_core::{Price, Symbol};
use sxm_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{FeedError, FeedResult};
use crate::message::{parse_price_message, subscribe_request};

fn default_ws_url() -> String {
    "wss://perps.standx.com/ws-stream/v1".to_string()
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_base_delay_ms(),
            reconnect_max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Feed connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Streams last prices for one symbol into the maker.
pub struct PriceFeed {
    config: FeedConfig,
    symbol: Symbol,
    price_tx: mpsc::Sender<Price>,
    state: Arc<RwLock<FeedState>>,
    shutdown_token: CancellationToken,
}

impl PriceFeed {
    pub fn new(config: FeedConfig, symbol: Symbol, price_tx: mpsc::Sender<Price>) -> Self {
        Self {
            config,
            symbol,
            price_tx,
            state: Arc::new(RwLock::new(FeedState::Disconnected)),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> FeedState {
        *self.state.read()
    }

    /// Token that stops the feed when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self) {
        info!("Price feed shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and stream until shutdown, the receiver is dropped, or the
    /// reconnect budget is spent.
    pub async fn run(&self) -> FeedResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                self.set_state(FeedState::Disconnected);
                return Ok(());
            }

            self.set_state(FeedState::Connecting);

            match self.try_connect().await {
                Ok(()) => info!("Price feed connection closed"),
                Err(e) => {
                    error!(error = %e, "Price feed connection error");
                    Metrics::feed_reconnect(reconnect_reason(&e));
                }
            }
            Metrics::feed_disconnected();

            if self.is_shutdown() || self.price_tx.is_closed() {
                info!("Price feed stopping, not reconnecting");
                self.set_state(FeedState::Disconnected);
                return Ok(());
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(FeedState::Disconnected);
                return Err(FeedError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(FeedState::Reconnecting);
            let delay = backoff_delay(
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
                attempt,
            ) + Duration::from_millis(jitter_ms());
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting price feed");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff");
                    self.set_state(FeedState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> FeedResult<()> {
        info!(url = %self.config.ws_url, symbol = %self.symbol, "Connecting price feed");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.ws_url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::to_string(&subscribe_request(&self.symbol))?;
        write.send(Message::Text(subscribe)).await?;

        self.set_state(FeedState::Connected);
        Metrics::feed_connected();
        info!(symbol = %self.symbol, "Price feed connected and subscribed");

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.forward_price(&text).await {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Price feed closed by server");
                            return Err(FeedError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            warn!("Price feed stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Returns false once the receiver is gone.
    async fn forward_price(&self, text: &str) -> bool {
        let Some(price) = parse_price_message(text, &self.symbol) else {
            trace!(%text, "Ignoring non-price frame");
            return true;
        };
        debug!(price = %price, "Price update");
        if self.price_tx.send(price).await.is_err() {
            warn!("Price receiver dropped");
            return false;
        }
        true
    }

    fn set_state(&self, state: FeedState) {
        *self.state.write() = state;
    }
}

fn reconnect_reason(e: &FeedError) -> &'static str {
    match e {
        FeedError::ConnectionClosed { .. } => "closed",
        FeedError::Tungstenite(_) => "transport",
        FeedError::Json(_) => "encode",
        FeedError::ConnectionFailed(_) => "failed",
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exponent).min(max_ms))
}

/// Jitter in 0..1000 ms.
fn jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.ws_url, "wss://perps.standx.com/ws-stream/v1");
        assert_eq!(config.max_reconnect_attempts, 0);
        assert_eq!(config.reconnect_base_delay_ms, 1_000);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1_000, 60_000, 1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1_000, 60_000, 2), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(1_000, 60_000, 4), Duration::from_millis(8_000));
        assert_eq!(backoff_delay(1_000, 60_000, 30), Duration::from_millis(60_000));
    }

    #[test]
    fn test_jitter_bounded() {
        assert!(jitter_ms() < 1000);
    }

    #[tokio::test]
    async fn test_forward_price_sends_parsed_prices() {
        let (tx, mut rx) = mpsc::channel(4);
        let feed = PriceFeed::new(
            FeedConfig::default(),
            Symbol::parse("BTC-USD").unwrap(),
            tx,
        );

        assert!(feed.forward_price(r#"{"channel":"price","data":{"last_price":"100.5"}}"#).await);
        assert!(feed.forward_price(r#"{"channel":"depth"}"#).await);
        assert_eq!(rx.recv().await.map(|p| p.to_string()), Some("100.5".to_string()));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!feed.forward_price(r#"{"last_price":"1"}"#).await);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_immediately() {
        let (tx, _rx) = mpsc::channel(1);
        let feed = PriceFeed::new(
            FeedConfig::default(),
            Symbol::parse("BTC-USD").unwrap(),
            tx,
        );
        feed.shutdown();
        assert!(feed.run().await.is_ok());
        assert_eq!(feed.state(), FeedState::Disconnected);
    }
}
