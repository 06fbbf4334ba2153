//! Shared fixtures for ledger integration tests.
//!
//! Every harness runs on a manual clock and records notifications in memory.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::task::JoinHandle;

use textbook_ledger::interfaces::LedgerStore;
use textbook_ledger::ledger::{Clock, ManualClock};
use textbook_ledger::model::{Student, Textbook};
use textbook_ledger::notify::{Notification, NotificationDispatcher, Recipient, RecordingNotifier};
use textbook_ledger::storage::MockLedgerStore;
use textbook_ledger::{Ledger, StudentDetails, TextbookDetails};

/// Librarian account id used as `actor_id`.
pub const LIBRARIAN: i64 = 900;

/// Start of term; day 0 of every scenario.
pub fn term_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap()
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

pub struct Harness {
    pub ledger: Ledger,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    worker: JoinHandle<()>,
}

impl Harness {
    pub fn with_store(store: Arc<dyn LedgerStore>) -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, worker) = NotificationDispatcher::spawn(notifier.clone(), 64);
        let clock = Arc::new(ManualClock::new(term_start()));
        let ledger = Ledger::new(store, dispatcher).with_clock(clock.clone());
        Self {
            ledger,
            clock,
            notifier,
            worker,
        }
    }

    pub fn mock() -> Self {
        Self::with_store(Arc::new(MockLedgerStore::new()))
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Shut the ledger down, wait for queued notifications, and return them.
    pub async fn finish(self) -> Vec<(Recipient, Notification)> {
        let Harness {
            ledger,
            notifier,
            worker,
            ..
        } = self;
        drop(ledger);
        worker.await.expect("notification worker panicked");
        notifier.sent().await
    }

    pub async fn textbook(&self, subject: &str, title: &str) -> Textbook {
        self.ledger
            .register_textbook(
                TextbookDetails {
                    subject: subject.to_string(),
                    title: title.to_string(),
                    ..Default::default()
                },
                None,
            )
            .await
            .expect("register textbook")
    }

    pub async fn student(&self, first: &str, last: &str, grade: &str) -> Student {
        self.ledger
            .enroll_student(StudentDetails {
                first_name: first.to_string(),
                last_name: last.to_string(),
                grade: grade.to_string(),
                parent_phone: Some(format!("+7900{}{}", first.len(), last.len())),
                ..Default::default()
            })
            .await
            .expect("enroll student")
    }

    pub async fn issue(&self, textbook: &Textbook, student: &Student) {
        self.ledger
            .issue(textbook.id, student.id, LIBRARIAN, Vec::new(), None)
            .await
            .expect("issue");
    }
}

/// Notifications of one kind, in delivery order.
pub fn of_kind<'a>(
    sent: &'a [(Recipient, Notification)],
    kind: &str,
) -> Vec<&'a (Recipient, Notification)> {
    sent.iter().filter(|(_, n)| n.kind() == kind).collect()
}
