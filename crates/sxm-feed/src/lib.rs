//! Last-price feed for the StandX market maker.
//!
//! Subscribes to the exchange price channel for one symbol and forwards
//! every parsed price to the maker over an mpsc channel. Reconnects with
//! exponential backoff until shut down.

pub mod error;
pub mod feed;
pub mod message;

pub use error::{FeedError, FeedResult};
pub use feed::{FeedConfig, FeedState, PriceFeed};
pub use message::{parse_price_message, subscribe_request};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install the ring TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
