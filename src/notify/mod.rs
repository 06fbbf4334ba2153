//! Parent and staff notifications.
//!
//! The ledger builds a [`Notification`] per event and hands it to a
//! [`NotificationDispatcher`]; delivery happens on a background task so a
//! slow or broken messenger never blocks or fails a ledger write.

mod dispatcher;
mod recording;
mod webhook;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::NotificationConfig;
use crate::interfaces::NotifyError;

pub use dispatcher::NotificationDispatcher;
pub use recording::RecordingNotifier;
pub use webhook::WebhookNotifier;

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    /// A student's parent, reached by phone number through the messaging bot.
    Parent { phone: String },
    /// The staff channel.
    Staff,
}

/// A textbook still inside its damage-check window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckDeadline {
    pub textbook: String,
    pub deadline: DateTime<Utc>,
}

/// Everything the ledger tells parents and staff about.
///
/// Textbooks are carried as their "Subject: Title" labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    TextbooksIssued {
        student_name: String,
        textbooks: Vec<String>,
    },
    TextbooksReturned {
        student_name: String,
        textbooks: Vec<String>,
    },
    TextbookLost {
        student_name: String,
        textbook: String,
    },
    TextbookFound {
        student_name: String,
        textbook: String,
        location: String,
    },
    IssueSummary {
        student_name: String,
        textbooks: Vec<String>,
    },
    ReturnReminder {
        student_name: String,
        textbooks: Vec<String>,
    },
    DamageCheckReminder {
        student_name: String,
        items: Vec<CheckDeadline>,
    },
    DamageReported {
        textbook: String,
        code: String,
        category: String,
        student_name: Option<String>,
        during_check_period: Option<bool>,
        description: String,
    },
    FoundReported {
        textbook: String,
        code: String,
        location: String,
    },
}

fn bullet_list(textbooks: &[String]) -> String {
    textbooks
        .iter()
        .map(|t| format!("• {}", t))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Notification {
    /// Stable machine-readable name of the notification type.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::TextbooksIssued { .. } => "textbooks_issued",
            Notification::TextbooksReturned { .. } => "textbooks_returned",
            Notification::TextbookLost { .. } => "textbook_lost",
            Notification::TextbookFound { .. } => "textbook_found",
            Notification::IssueSummary { .. } => "issue_summary",
            Notification::ReturnReminder { .. } => "return_reminder",
            Notification::DamageCheckReminder { .. } => "damage_check_reminder",
            Notification::DamageReported { .. } => "damage_reported",
            Notification::FoundReported { .. } => "found_reported",
        }
    }

    /// Plain-text message body.
    pub fn render(&self) -> String {
        match self {
            Notification::TextbooksIssued {
                student_name,
                textbooks,
            } => format!(
                "Textbooks issued to {} ({}):\n{}",
                student_name,
                textbooks.len(),
                bullet_list(textbooks)
            ),
            Notification::TextbooksReturned {
                student_name,
                textbooks,
            } => format!(
                "Textbooks returned by {} ({}):\n{}",
                student_name,
                textbooks.len(),
                bullet_list(textbooks)
            ),
            Notification::TextbookLost {
                student_name,
                textbook,
            } => format!(
                "{} has reported a lost textbook: {}. Please contact the school library.",
                student_name, textbook
            ),
            Notification::TextbookFound {
                student_name,
                textbook,
                location,
            } => format!(
                "The textbook {} issued to {} was found ({}). It can be collected from the library.",
                textbook, student_name, location
            ),
            Notification::IssueSummary {
                student_name,
                textbooks,
            } => format!(
                "{} currently holds {} textbook(s):\n{}",
                student_name,
                textbooks.len(),
                bullet_list(textbooks)
            ),
            Notification::ReturnReminder {
                student_name,
                textbooks,
            } => format!(
                "Reminder: {} still has {} textbook(s) to return:\n{}",
                student_name,
                textbooks.len(),
                bullet_list(textbooks)
            ),
            Notification::DamageCheckReminder {
                student_name,
                items,
            } => {
                let lines = items
                    .iter()
                    .map(|i| format!("• {} (until {})", i.textbook, i.deadline.format("%Y-%m-%d")))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Please check the textbooks issued to {} for damage and report any you find:\n{}",
                    student_name, lines
                )
            }
            Notification::DamageReported {
                textbook,
                code,
                category,
                student_name,
                during_check_period,
                description,
            } => {
                let period = match during_check_period {
                    Some(true) => "within the check period",
                    Some(false) => "after the check period",
                    None => "not on loan",
                };
                format!(
                    "Damage report ({}) for {} [{}], {}, borrower: {}.\n{}",
                    category,
                    textbook,
                    code,
                    period,
                    student_name.as_deref().unwrap_or("none"),
                    description
                )
            }
            Notification::FoundReported {
                textbook,
                code,
                location,
            } => format!("Found textbook {} [{}] at {}.", textbook, code, location),
        }
    }
}

/// Build the dispatcher described by `config`.
///
/// Returns the worker handle when a worker was started; awaiting it after
/// dropping every dispatcher clone waits for queued messages to drain.
pub fn init_notifications(
    config: &NotificationConfig,
) -> Result<(NotificationDispatcher, Option<JoinHandle<()>>), NotifyError> {
    if !config.enabled {
        info!("Notifications disabled");
        return Ok((NotificationDispatcher::disabled(), None));
    }

    let notifier = std::sync::Arc::new(WebhookNotifier::new(config)?);
    info!(endpoint = %config.endpoint, "Notifications enabled");
    let (dispatcher, worker) = NotificationDispatcher::spawn(notifier, config.queue_capacity);
    Ok((dispatcher, Some(worker)))
}
