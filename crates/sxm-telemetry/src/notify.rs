//! Alert notifications.
//!
//! Notifications are fire-and-forget: delivery runs on a spawned task and
//! every failure is logged and dropped. Callers never wait on the sink.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TelemetryError, TelemetryResult};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Alert priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// Alert sink.
pub trait Notifier: Send + Sync {
    /// Queue an alert. Must return immediately and never fail.
    fn notify(&self, title: &str, message: &str, priority: Priority);
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Webhook settings. `url = None` disables alerts.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    message: &'a str,
    channel: &'static str,
    priority: &'static str,
}

/// Posts alerts as JSON to an HTTP endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> TelemetryResult<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| TelemetryError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    /// Build the sink for `config`: a webhook when a URL is set, a no-op
    /// otherwise.
    pub fn from_config(config: &NotifyConfig) -> TelemetryResult<DynNotifier> {
        match config.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => Ok(Arc::new(Self::new(url, config.api_key.clone())?)),
            None => {
                debug!("Notification URL not configured, alerts disabled");
                Ok(Arc::new(NoopNotifier))
            }
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, title: &str, message: &str, priority: Priority) {
        let payload = match serde_json::to_value(WebhookPayload {
            title,
            message,
            channel: "alert",
            priority: priority.as_str(),
        }) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to encode notification");
                return;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(title, "No runtime available, dropping notification");
            return;
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        // Fire and forget
        handle.spawn(async move {
            let result = match request.send().await {
                Ok(response) => response.error_for_status().map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(error = %e, "Failed to send notification");
            }
        });
    }
}

/// Discards every alert.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _title: &str, _message: &str, _priority: Priority) {}
}

/// Recorded alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

/// Keeps every alert in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self, priority: Priority) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.priority == priority)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str, priority: Priority) {
        self.sent.lock().push(Notification {
            title: title.to_string(),
            message: message.to_string(),
            priority,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = serde_json::to_value(WebhookPayload {
            title: "Force flat",
            message: "closed 0.300",
            channel: "alert",
            priority: Priority::High.as_str(),
        })
        .unwrap();
        assert_eq!(payload["channel"], "alert");
        assert_eq!(payload["priority"], "high");
    }

    #[test]
    fn test_unconfigured_url_is_noop() {
        let sink = WebhookNotifier::from_config(&NotifyConfig::default()).unwrap();
        sink.notify("t", "m", Priority::Normal);
    }

    #[test]
    fn test_notify_without_runtime_does_not_panic() {
        let sink = WebhookNotifier::new("http://127.0.0.1:9/notify", None).unwrap();
        sink.notify("t", "m", Priority::High);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_swallowed() {
        let sink = WebhookNotifier::new("http://127.0.0.1:9/notify", Some("k".into())).unwrap();
        sink.notify("t", "m", Priority::High);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_recording_notifier() {
        let sink = RecordingNotifier::new();
        sink.notify("a", "1", Priority::Normal);
        sink.notify("b", "2", Priority::High);
        assert_eq!(sink.sent().len(), 2);
        assert_eq!(sink.count(Priority::High), 1);
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = NotifyConfig {
            url: Some("https://example.invalid".into()),
            api_key: Some("secret".into()),
        };
        assert!(!format!("{config:?}").contains("secret"));
    }
}
