use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::interfaces::{LedgerStore, StorageError};
use crate::model::{
    IssueDraft, IssueOutcome, LoanKind, LoanStatus, NewStudent, NewTextbook, NewUser, ReturnDraft,
    ReturnOutcome, UserRole,
};

fn at(hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, hour, 0, 0).unwrap()
}

async fn seeded() -> (MockLedgerStore, i64, i64) {
    let store = MockLedgerStore::new();
    let textbook = store
        .insert_textbook(NewTextbook {
            code: "TEXTBOOK_000000000001".to_string(),
            subject: "Math".to_string(),
            title: "Algebra 7".to_string(),
            created_at: at(8),
            ..Default::default()
        })
        .await
        .unwrap();
    let student = store
        .insert_student(NewStudent {
            first_name: "Ivan".to_string(),
            last_name: "Sidorov".to_string(),
            grade: "7A".to_string(),
            created_at: at(8),
            ..Default::default()
        })
        .await
        .unwrap();
    (store, textbook.id, student.id)
}

fn issue(textbook_id: i64, student_id: i64, hour: u32) -> IssueDraft {
    IssueDraft {
        textbook_id,
        student_id,
        actor_id: 1,
        evidence: vec![],
        notes: None,
        occurred_at: at(hour),
    }
}

#[tokio::test]
async fn test_issue_then_second_issue_reports_open_loan() {
    let (store, textbook_id, student_id) = seeded().await;

    let first = store.issue_if_available(issue(textbook_id, student_id, 9)).await.unwrap();
    let IssueOutcome::Issued(event) = first else {
        panic!("expected issue to be written");
    };
    assert_eq!(event.kind, LoanKind::Issue);
    assert_eq!(event.status, LoanStatus::Completed);

    let second = store.issue_if_available(issue(textbook_id, student_id, 10)).await.unwrap();
    assert_eq!(second, IssueOutcome::AlreadyOnLoan(event));
    assert_eq!(store.loan_event_count().await, 1);
}

#[tokio::test]
async fn test_return_is_attributed_to_borrower() {
    let (store, textbook_id, student_id) = seeded().await;
    store.issue_if_available(issue(textbook_id, student_id, 9)).await.unwrap();

    let outcome = store
        .return_if_on_loan(ReturnDraft {
            textbook_id,
            actor_id: 2,
            evidence: vec![],
            notes: Some("ok".to_string()),
            occurred_at: at(9) + Duration::days(30),
        })
        .await
        .unwrap();

    let ReturnOutcome::Returned { issue, event } = outcome else {
        panic!("expected return to be written");
    };
    assert_eq!(event.student_id, student_id);
    assert_eq!(event.returned_at, Some(event.occurred_at));
    assert_eq!(issue.student_id, student_id);

    let again = store
        .return_if_on_loan(ReturnDraft {
            textbook_id,
            actor_id: 2,
            evidence: vec![],
            notes: None,
            occurred_at: at(12) + Duration::days(30),
        })
        .await
        .unwrap();
    assert_eq!(again, ReturnOutcome::NotOnLoan);
}

#[tokio::test]
async fn test_duplicate_code_and_username_rejected() {
    let (store, _, student_id) = seeded().await;

    let err = store
        .insert_textbook(NewTextbook {
            code: "TEXTBOOK_000000000001".to_string(),
            subject: "Math".to_string(),
            title: "Copy".to_string(),
            created_at: at(8),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Duplicate(_)));

    let user = NewUser {
        username: "ivan".to_string(),
        email: None,
        role: UserRole::Student,
        student_id: Some(student_id),
        created_at: at(8),
    };
    store.insert_user(user.clone()).await.unwrap();

    let err = store
        .insert_user(NewUser {
            username: "ivan2".to_string(),
            ..user
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Duplicate(_)));
}

#[tokio::test]
async fn test_fail_toggles() {
    let (store, textbook_id, student_id) = seeded().await;

    store.set_fail_on_write(true).await;
    let err = store
        .issue_if_available(issue(textbook_id, student_id, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Injected("write")));

    store.set_fail_on_write(false).await;
    store.set_fail_on_read(true).await;
    assert!(store.get_textbook(textbook_id).await.is_err());
}
