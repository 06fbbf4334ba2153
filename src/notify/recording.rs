//! In-memory notifier for tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Notification, Recipient};
use crate::interfaces::{Notifier, NotifyError};

/// Notifier that records every delivered message.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<(Recipient, Notification)>>,
    attempts: RwLock<usize>,
    fail: RwLock<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail with `Unavailable`.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn sent(&self) -> Vec<(Recipient, Notification)> {
        self.sent.read().await.clone()
    }

    /// Delivery attempts, successful or not.
    pub async fn attempts(&self) -> usize {
        *self.attempts.read().await
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        *self.attempts.write().await += 1;
        if *self.fail.read().await {
            return Err(NotifyError::Unavailable("recording notifier set to fail".to_string()));
        }
        self.sent
            .write()
            .await
            .push((recipient.clone(), notification.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
