//! LedgerStore interface tests.
//!
//! These tests verify the contract of the LedgerStore trait.
//! Each storage implementation should run these tests. Every test works on
//! records it creates itself, so they can share one store.

use chrono::{DateTime, Duration, TimeZone, Utc};

use textbook_ledger::interfaces::{LedgerStore, StorageError};
use textbook_ledger::model::{
    DamageCategory, DamageDecision, FoundResolution, FoundStatus, IssueDraft, IssueOutcome,
    LoanFilter, LoanKind, NewDamageReport, NewFoundReport, NewStudent, NewTextbook, NewUser,
    ReporterRole, ReturnDraft, ReturnOutcome, ReviewStatus, Student, Textbook, Transition,
    UserRole,
};

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub async fn make_textbook<S: LedgerStore + ?Sized>(store: &S, code: &str) -> Textbook {
    store
        .insert_textbook(NewTextbook {
            code: code.to_string(),
            subject: "Math".to_string(),
            title: format!("Algebra {}", code),
            created_at: at(0),
            ..Default::default()
        })
        .await
        .expect("insert textbook")
}

pub async fn make_student<S: LedgerStore + ?Sized>(store: &S, last: &str, grade: &str) -> Student {
    store
        .insert_student(NewStudent {
            first_name: "Anna".to_string(),
            last_name: last.to_string(),
            grade: grade.to_string(),
            parent_phone: Some("+79001234567".to_string()),
            created_at: at(0),
            ..Default::default()
        })
        .await
        .expect("insert student")
}

fn issue_draft(textbook: &Textbook, student: &Student, when: DateTime<Utc>) -> IssueDraft {
    IssueDraft {
        textbook_id: textbook.id,
        student_id: student.id,
        actor_id: 1,
        evidence: Vec::new(),
        notes: None,
        occurred_at: when,
    }
}

fn return_draft(textbook: &Textbook, when: DateTime<Utc>) -> ReturnDraft {
    ReturnDraft {
        textbook_id: textbook.id,
        actor_id: 1,
        evidence: Vec::new(),
        notes: None,
        occurred_at: when,
    }
}

// =============================================================================
// Roster tests
// =============================================================================

pub async fn test_textbook_code_is_unique<S: LedgerStore + ?Sized>(store: &S) {
    let first = make_textbook(store, "TEXTBOOK_UNIQUE01").await;

    let again = store
        .insert_textbook(NewTextbook {
            code: "TEXTBOOK_UNIQUE01".to_string(),
            subject: "History".to_string(),
            title: "World History".to_string(),
            created_at: at(1),
            ..Default::default()
        })
        .await;
    assert!(
        matches!(again, Err(StorageError::Duplicate(_))),
        "duplicate code should be rejected, got {:?}",
        again
    );

    let found = store
        .find_textbook_by_code("TEXTBOOK_UNIQUE01")
        .await
        .expect("lookup should succeed")
        .expect("textbook should exist");
    assert_eq!(found, first);
    assert!(found.is_active);
}

pub async fn test_textbook_condition_and_active_flag<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_COND01").await;

    let updated = store
        .update_textbook_condition(textbook.id, "torn cover", at(5))
        .await
        .expect("update should succeed")
        .expect("textbook should exist");
    assert_eq!(updated.current_condition.as_deref(), Some("torn cover"));
    assert_eq!(updated.updated_at, Some(at(5)));

    let withdrawn = store
        .set_textbook_active(textbook.id, false, at(6))
        .await
        .expect("update should succeed")
        .expect("textbook should exist");
    assert!(!withdrawn.is_active);

    let missing = store
        .set_textbook_active(i64::MAX, false, at(6))
        .await
        .expect("update should succeed");
    assert!(missing.is_none());
}

pub async fn test_list_students_by_grade<S: LedgerStore + ?Sized>(store: &S) {
    let smirnov = make_student(store, "Smirnov", "9C").await;
    let abramov = make_student(store, "Abramov", "9C").await;
    make_student(store, "Other", "9D").await;
    store
        .set_student_active(smirnov.id, false, at(1))
        .await
        .expect("deactivate should succeed");

    let all = store
        .list_students(Some("9C"), false)
        .await
        .expect("list should succeed");
    let names: Vec<_> = all.iter().map(|s| s.last_name.as_str()).collect();
    assert_eq!(names, vec!["Abramov", "Smirnov"], "ordered by last name");

    let active = store
        .list_students(Some("9C"), true)
        .await
        .expect("list should succeed");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, abramov.id);
}

pub async fn test_user_uniqueness<S: LedgerStore + ?Sized>(store: &S) {
    let student = make_student(store, "Userov", "8A").await;

    let account = store
        .insert_user(NewUser {
            username: "userov_a".to_string(),
            email: None,
            role: UserRole::Student,
            student_id: Some(student.id),
            created_at: at(0),
        })
        .await
        .expect("insert should succeed");

    let same_name = store
        .insert_user(NewUser {
            username: "userov_a".to_string(),
            email: None,
            role: UserRole::Teacher,
            student_id: None,
            created_at: at(1),
        })
        .await;
    assert!(matches!(same_name, Err(StorageError::Duplicate(_))));

    let second_account = store
        .insert_user(NewUser {
            username: "userov_b".to_string(),
            email: None,
            role: UserRole::Student,
            student_id: Some(student.id),
            created_at: at(1),
        })
        .await;
    assert!(matches!(second_account, Err(StorageError::Duplicate(_))));

    let by_student = store
        .find_user_by_student(student.id)
        .await
        .expect("lookup should succeed");
    assert_eq!(by_student, Some(account));
}

// =============================================================================
// Loan log tests
// =============================================================================

pub async fn test_issue_rejects_open_loan<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_ISSUE01").await;
    let a = make_student(store, "Issuer", "7A").await;
    let b = make_student(store, "Second", "7A").await;

    let first = store
        .issue_if_available(issue_draft(&textbook, &a, at(10)))
        .await
        .expect("issue should succeed");
    let IssueOutcome::Issued(issued) = first else {
        panic!("first issue should be applied, got {:?}", first);
    };
    assert!(issued.id > 0, "store should assign an id");
    assert_eq!(issued.kind, LoanKind::Issue);

    let second = store
        .issue_if_available(issue_draft(&textbook, &b, at(11)))
        .await
        .expect("issue should succeed");
    assert_eq!(second, IssueOutcome::AlreadyOnLoan(issued));

    let log = store
        .loan_events_for_textbook(textbook.id)
        .await
        .expect("log should load");
    assert_eq!(log.len(), 1, "rejected issue must not be written");
}

pub async fn test_return_attributed_to_borrower<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_RETURN01").await;
    let student = make_student(store, "Borrower", "7B").await;

    store
        .issue_if_available(issue_draft(&textbook, &student, at(10)))
        .await
        .expect("issue should succeed");

    let outcome = store
        .return_if_on_loan(return_draft(&textbook, at(20)))
        .await
        .expect("return should succeed");
    let ReturnOutcome::Returned { issue, event } = outcome else {
        panic!("return should be applied, got {:?}", outcome);
    };
    assert_eq!(issue.student_id, student.id);
    assert_eq!(event.student_id, student.id);
    assert_eq!(event.kind, LoanKind::Return);
    assert_eq!(event.returned_at, Some(at(20)));

    let again = store
        .return_if_on_loan(return_draft(&textbook, at(21)))
        .await
        .expect("return should succeed");
    assert_eq!(again, ReturnOutcome::NotOnLoan);
}

pub async fn test_return_without_issue<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_NOISSUE01").await;
    let outcome = store
        .return_if_on_loan(return_draft(&textbook, at(10)))
        .await
        .expect("return should succeed");
    assert_eq!(outcome, ReturnOutcome::NotOnLoan);
}

pub async fn test_reissue_at_return_instant<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_SAMEINSTANT").await;
    let a = make_student(store, "Early", "6A").await;
    let b = make_student(store, "Late", "6A").await;

    store
        .issue_if_available(issue_draft(&textbook, &a, at(10)))
        .await
        .expect("issue should succeed");
    store
        .return_if_on_loan(return_draft(&textbook, at(10)))
        .await
        .expect("return should succeed");

    let outcome = store
        .issue_if_available(issue_draft(&textbook, &b, at(10)))
        .await
        .expect("issue should succeed");
    let IssueOutcome::Issued(reissued) = outcome else {
        panic!("re-issue should be applied, got {:?}", outcome);
    };
    assert!(
        reissued.occurred_at > at(10),
        "re-issue must sort after the return it follows"
    );

    let closed = store
        .return_if_on_loan(return_draft(&textbook, reissued.occurred_at))
        .await
        .expect("return should succeed");
    assert!(
        matches!(closed, ReturnOutcome::Returned { ref event, .. } if event.student_id == b.id),
        "second loan should be attributed to the second borrower"
    );
}

pub async fn test_list_loan_events_filter<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_FILTER01").await;
    let student = make_student(store, "Filtered", "5A").await;

    for cycle in 0..3 {
        let start = at(100 + cycle * 10);
        store
            .issue_if_available(issue_draft(&textbook, &student, start))
            .await
            .expect("issue should succeed");
        store
            .return_if_on_loan(return_draft(&textbook, start + Duration::minutes(5)))
            .await
            .expect("return should succeed");
    }

    let issues = store
        .list_loan_events(&LoanFilter {
            student_id: Some(student.id),
            kind: Some(LoanKind::Issue),
            ..LoanFilter::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(issues.len(), 3);
    assert!(issues.windows(2).all(|w| w[0].occurred_at < w[1].occurred_at));

    let window = store
        .list_loan_events(&LoanFilter {
            textbook_id: Some(textbook.id),
            since: Some(at(110)),
            until: Some(at(115)),
            ..LoanFilter::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(window.len(), 2, "one issue and one return inside the range");

    let page = store
        .list_loan_events(&LoanFilter {
            textbook_id: Some(textbook.id),
            offset: 4,
            limit: 10,
            ..LoanFilter::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(page.len(), 2);

    let by_student = store
        .loan_events_for_student(student.id)
        .await
        .expect("list should succeed");
    assert_eq!(by_student.len(), 6);
}

// =============================================================================
// Review transition tests
// =============================================================================

pub async fn test_check_damage_report_once<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_DAMAGE01").await;

    let report = store
        .insert_damage_report(NewDamageReport {
            textbook_id: textbook.id,
            student_id: None,
            reporter_id: 7,
            reporter_role: ReporterRole::Teacher,
            category: DamageCategory::Moderate,
            description: "Water damage on pages 10-20".to_string(),
            evidence: Vec::new(),
            is_during_check_period: None,
            reported_at: at(30),
        })
        .await
        .expect("insert should succeed");
    assert_eq!(report.status, ReviewStatus::Pending);

    let decision = DamageDecision {
        decision: "Charge replacement fee".to_string(),
        checked_by: 1,
        checked_at: at(40),
    };
    let first = store
        .check_damage_report(report.id, decision.clone())
        .await
        .expect("check should succeed")
        .expect("report should exist");
    let Transition::Applied(checked) = first else {
        panic!("first check should apply");
    };
    assert_eq!(checked.status, ReviewStatus::Checked);
    assert_eq!(checked.checked_at, Some(at(40)));

    let second = store
        .check_damage_report(
            report.id,
            DamageDecision {
                decision: "Overwrite".to_string(),
                checked_by: 2,
                checked_at: at(50),
            },
        )
        .await
        .expect("check should succeed")
        .expect("report should exist");
    let Transition::AlreadyFinal(unchanged) = second else {
        panic!("second check should not apply");
    };
    assert_eq!(unchanged.decision.as_deref(), Some("Charge replacement fee"));

    let missing = store
        .check_damage_report(i64::MAX, decision)
        .await
        .expect("check should succeed");
    assert!(missing.is_none());
}

pub async fn test_mark_found_returned_once<S: LedgerStore + ?Sized>(store: &S) {
    let textbook = make_textbook(store, "TEXTBOOK_FOUND01").await;

    let report = store
        .insert_found_report(NewFoundReport {
            textbook_id: textbook.id,
            found_location: "Gym locker room".to_string(),
            description: None,
            evidence: Vec::new(),
            reported_by: 7,
            found_at: at(30),
        })
        .await
        .expect("insert should succeed");
    assert_eq!(report.status, FoundStatus::Found);

    let resolution = FoundResolution {
        returned_by: 1,
        returned_at: at(45),
        notes: Some("Back on the shelf".to_string()),
    };
    let first = store
        .mark_found_returned(report.id, resolution.clone())
        .await
        .expect("transition should succeed")
        .expect("report should exist");
    assert!(matches!(first, Transition::Applied(ref r) if r.status == FoundStatus::Returned));

    let second = store
        .mark_found_returned(report.id, resolution)
        .await
        .expect("transition should succeed")
        .expect("report should exist");
    assert!(matches!(second, Transition::AlreadyFinal(ref r) if r.returned_at == Some(at(45))));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all LedgerStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_ledger_store_tests {
    ($store:expr) => {
        use $crate::storage::ledger_store_tests::*;

        // roster tests
        test_textbook_code_is_unique($store).await;
        println!("  test_textbook_code_is_unique: PASSED");

        test_textbook_condition_and_active_flag($store).await;
        println!("  test_textbook_condition_and_active_flag: PASSED");

        test_list_students_by_grade($store).await;
        println!("  test_list_students_by_grade: PASSED");

        test_user_uniqueness($store).await;
        println!("  test_user_uniqueness: PASSED");

        // loan log tests
        test_issue_rejects_open_loan($store).await;
        println!("  test_issue_rejects_open_loan: PASSED");

        test_return_attributed_to_borrower($store).await;
        println!("  test_return_attributed_to_borrower: PASSED");

        test_return_without_issue($store).await;
        println!("  test_return_without_issue: PASSED");

        test_reissue_at_return_instant($store).await;
        println!("  test_reissue_at_return_instant: PASSED");

        test_list_loan_events_filter($store).await;
        println!("  test_list_loan_events_filter: PASSED");

        // review transition tests
        test_check_damage_report_once($store).await;
        println!("  test_check_damage_report_once: PASSED");

        test_mark_found_returned_once($store).await;
        println!("  test_mark_found_returned_once: PASSED");
    };
}
