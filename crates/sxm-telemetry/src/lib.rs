//! Observability for the StandX market maker.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for quoting, cancels and risk actions
//! - Fire-and-forget alert notifications
//! - CSV journal of profit-taking reductions

pub mod error;
pub mod journal;
pub mod logging;
pub mod metrics;
pub mod notify;

pub use error::{TelemetryError, TelemetryResult};
pub use journal::ReduceJournal;
pub use logging::init_logging;
pub use metrics::Metrics;
pub use notify::{
    DynNotifier, NoopNotifier, Notification, Notifier, NotifyConfig, Priority, RecordingNotifier,
    WebhookNotifier,
};
