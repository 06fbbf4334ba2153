//! Notification delivery interface.

use async_trait::async_trait;

use crate::notify::{Notification, Recipient};

/// Errors that can occur while delivering a notification.
///
/// These never reach ledger callers; the dispatcher logs and drops them.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Messenger unavailable: {0}")]
    Unavailable(String),

    #[error("Messenger rejected message: {0}")]
    Rejected(String),
}

/// Best-effort sender for parent and staff messages.
///
/// Implementations:
/// - `WebhookNotifier`: POSTs rendered messages to the messaging bot
/// - `RecordingNotifier`: Captures messages in memory for tests
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification to one recipient.
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError>;

    /// Return the notifier name for logging.
    fn name(&self) -> &str;
}
