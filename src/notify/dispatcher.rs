//! Non-blocking notification queue.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Notification, Recipient};
use crate::interfaces::Notifier;

struct Envelope {
    recipient: Recipient,
    notification: Notification,
}

/// Fire-and-forget front of a [`Notifier`].
///
/// `dispatch` never waits: messages go into a bounded queue drained by one
/// worker task. When the queue is full or the worker is gone the message is
/// dropped with a warning.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Option<mpsc::Sender<Envelope>>,
}

impl NotificationDispatcher {
    /// Start a worker delivering through `notifier`.
    ///
    /// The worker exits once every clone of the returned dispatcher is dropped
    /// and the queue is empty.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let kind = envelope.notification.kind();
                match notifier
                    .notify(&envelope.recipient, &envelope.notification)
                    .await
                {
                    Ok(()) => debug!(notifier = notifier.name(), kind, "Notification delivered"),
                    Err(e) => warn!(
                        notifier = notifier.name(),
                        kind,
                        error = %e,
                        "Notification delivery failed"
                    ),
                }
            }
            debug!(notifier = notifier.name(), "Notification worker stopped");
        });

        (
            Self {
                sender: Some(sender),
            },
            worker,
        )
    }

    /// A dispatcher that discards everything.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue a notification without waiting for delivery.
    pub fn dispatch(&self, recipient: Recipient, notification: Notification) {
        let Some(sender) = &self.sender else {
            return;
        };

        let kind = notification.kind();
        match sender.try_send(Envelope {
            recipient,
            notification,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(kind, "Notification queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(kind, "Notification worker gone, dropping message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    fn issued(name: &str) -> Notification {
        Notification::TextbooksIssued {
            student_name: name.to_string(),
            textbooks: vec!["Math: Algebra 7".to_string()],
        }
    }

    #[tokio::test]
    async fn test_messages_are_delivered_in_order() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, worker) = NotificationDispatcher::spawn(notifier.clone(), 8);

        dispatcher.dispatch(Recipient::Staff, issued("A"));
        dispatcher.dispatch(Recipient::Staff, issued("B"));
        drop(dispatcher);
        worker.await.unwrap();

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, issued("A"));
        assert_eq!(sent[1].1, issued("B"));
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_stop_worker() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.set_fail(true).await;
        let (dispatcher, worker) = NotificationDispatcher::spawn(notifier.clone(), 8);

        dispatcher.dispatch(Recipient::Staff, issued("A"));
        dispatcher.dispatch(Recipient::Staff, issued("B"));
        drop(dispatcher);
        worker.await.unwrap();

        assert!(notifier.sent().await.is_empty());
        assert_eq!(notifier.attempts().await, 2);
    }

    #[test]
    fn test_disabled_dispatcher_drops_silently() {
        let dispatcher = NotificationDispatcher::disabled();
        assert!(!dispatcher.is_enabled());
        dispatcher.dispatch(Recipient::Staff, issued("A"));
    }
}
