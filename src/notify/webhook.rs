//! HTTP webhook notifier.
//!
//! POSTs each rendered message as JSON to the messaging bot.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::{Notification, Recipient};
use crate::config::NotificationConfig;
use crate::interfaces::{Notifier, NotifyError};

#[derive(Serialize)]
struct WebhookMessage<'a> {
    recipient: &'a Recipient,
    kind: &'static str,
    text: String,
    payload: &'a Notification,
}

/// Notifier backed by the messaging bot's HTTP endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotifyError> {
        if config.endpoint.is_empty() {
            return Err(NotifyError::Config(
                "Notification endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        })
    }

    /// Backoff configuration for retries.
    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(3)
            .with_jitter()
    }

    fn is_retryable(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }

    /// Retry 429 (rate limit) and 5xx (server errors).
    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    async fn post(&self, message: &WebhookMessage<'_>) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(endpoint = %self.endpoint, kind = message.kind, "Notification posted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = format!(
            "HTTP {} - {}",
            status,
            body.chars().take(200).collect::<String>()
        );

        if Self::is_retryable_status(status) {
            warn!(endpoint = %self.endpoint, status = %status, "Notification POST returned retryable status");
            Err(NotifyError::Unavailable(detail))
        } else {
            error!(endpoint = %self.endpoint, status = %status, "Notification POST rejected");
            Err(NotifyError::Rejected(detail))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let message = WebhookMessage {
            recipient,
            kind: notification.kind(),
            text: notification.render(),
            payload: notification,
        };

        (|| async { self.post(&message).await })
            .retry(Self::backoff())
            .when(|e| {
                matches!(e, NotifyError::Http(err) if Self::is_retryable(err))
                    || matches!(e, NotifyError::Unavailable(_))
            })
            .await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = NotificationConfig {
            endpoint: String::new(),
            ..NotificationConfig::default()
        };
        assert!(matches!(
            WebhookNotifier::new(&config),
            Err(NotifyError::Config(_))
        ));
    }

    #[test]
    fn test_retryable_status() {
        assert!(WebhookNotifier::is_retryable_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS
        ));
        assert!(WebhookNotifier::is_retryable_status(
            reqwest::StatusCode::BAD_GATEWAY
        ));
        assert!(!WebhookNotifier::is_retryable_status(
            reqwest::StatusCode::BAD_REQUEST
        ));
    }

    #[test]
    fn test_message_body_shape() {
        let recipient = Recipient::Parent {
            phone: "+70000000000".to_string(),
        };
        let notification = Notification::ReturnReminder {
            student_name: "Petrova Anna".to_string(),
            textbooks: vec!["Math: Algebra 7".to_string()],
        };
        let message = WebhookMessage {
            recipient: &recipient,
            kind: notification.kind(),
            text: notification.render(),
            payload: &notification,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["recipient"]["phone"], "+70000000000");
        assert_eq!(json["kind"], "return_reminder");
        assert!(json["text"].as_str().unwrap().contains("Math: Algebra 7"));
        assert_eq!(json["payload"]["student_name"], "Petrova Anna");
    }
}
