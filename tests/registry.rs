//! Roster and catalogue integration tests.
//!
//! Run with: cargo test --test registry

mod common;

use textbook_ledger::model::textbook::CODE_PREFIX;
use textbook_ledger::model::{TextbookFilter, UserRole};
use textbook_ledger::{LedgerError, StudentDetails, TextbookDetails};

use common::Harness;

fn algebra() -> TextbookDetails {
    TextbookDetails {
        subject: "Math".to_string(),
        title: "Algebra 9".to_string(),
        author: Some("Makarychev".to_string()),
        year: Some(2019),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_textbook_generates_code() {
    let h = Harness::mock();
    let textbook = h
        .ledger
        .register_textbook(algebra(), None)
        .await
        .expect("register");
    assert!(textbook.code.starts_with(CODE_PREFIX));
    assert_eq!(textbook.code.len(), CODE_PREFIX.len() + 12);
    assert!(textbook.is_active);
}

#[tokio::test]
async fn test_register_textbook_duplicate_code() {
    let h = Harness::mock();
    h.ledger
        .register_textbook(algebra(), Some("ALG-9-001".to_string()))
        .await
        .expect("register");

    let err = h
        .ledger
        .register_textbook(algebra(), Some("ALG-9-001".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_register_textbooks_bulk_numbers_inventory() {
    let h = Harness::mock();
    let created = h
        .ledger
        .register_textbooks_bulk(algebra(), 3, Some("INV-"))
        .await
        .expect("bulk register");

    let numbers: Vec<_> = created
        .iter()
        .map(|t| t.inventory_number.clone().unwrap_or_default())
        .collect();
    assert_eq!(numbers, vec!["INV-0001", "INV-0002", "INV-0003"]);

    let mut codes: Vec<_> = created.iter().map(|t| t.code.clone()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 3, "every copy gets its own code");

    let listed = h
        .ledger
        .store()
        .list_textbooks(&TextbookFilter {
            subject: Some("math".to_string()),
            ..TextbookFilter::default()
        })
        .await
        .expect("list");
    assert_eq!(listed.len(), 3);

    let err = h
        .ledger
        .register_textbooks_bulk(algebra(), 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "quantity", .. }));
}

#[tokio::test]
async fn test_update_condition() {
    let h = Harness::mock();
    let textbook = h.textbook("Math", "Algebra 9").await;
    let updated = h
        .ledger
        .update_condition(textbook.id, "Cover replaced")
        .await
        .expect("update");
    assert_eq!(updated.current_condition.as_deref(), Some("Cover replaced"));

    let err = h.ledger.update_condition(9999, "n/a").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_enroll_student_validation() {
    let h = Harness::mock();
    let err = h
        .ledger
        .enroll_student(StudentDetails {
            first_name: "Ivan".to_string(),
            last_name: "Petrov".to_string(),
            grade: "seventh".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "grade", .. }));

    let err = h
        .ledger
        .enroll_student(StudentDetails {
            first_name: String::new(),
            last_name: "Petrov".to_string(),
            grade: "7A".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "first_name", .. }));
}

#[tokio::test]
async fn test_accounts() {
    let h = Harness::mock();
    let student = h.student("Ivan", "Petrov", "7A").await;

    let teacher = h
        .ledger
        .create_teacher_account("librarian", Some("library@school.example".to_string()))
        .await
        .expect("teacher account");
    assert_eq!(teacher.role, UserRole::Teacher);

    let account = h
        .ledger
        .create_student_account(student.id, "ivan_p")
        .await
        .expect("student account");
    assert_eq!(account.role, UserRole::Student);
    assert_eq!(account.student_id, Some(student.id));

    let err = h
        .ledger
        .create_student_account(student.id, "ivan_p2")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    let other = h.student("Olga", "Sidorova", "7A").await;
    let err = h
        .ledger
        .create_student_account(other.id, "librarian")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    let err = h
        .ledger
        .create_student_account(9999, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "student", .. }));
}
