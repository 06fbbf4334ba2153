//! The open-loan rule.
//!
//! A textbook's loan state is derived from its event log alone. An issue
//! is open when it is the latest completed issue and no completed return
//! for the same textbook carries an equal or later timestamp. Pending and
//! cancelled events never count.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::model::{LoanEvent, StudentId, TextbookId};

/// Resolve the open issue, if any, from one textbook's event log.
///
/// The log may be in any order; events are compared by `(occurred_at, id)`.
pub fn open_loan(events: &[LoanEvent]) -> Option<&LoanEvent> {
    let latest_issue = events
        .iter()
        .filter(|e| e.is_completed_issue())
        .max_by_key(|e| (e.occurred_at, e.id))?;

    let closed = events
        .iter()
        .filter(|e| e.is_completed_return())
        .any(|e| e.occurred_at >= latest_issue.occurred_at);

    if closed {
        None
    } else {
        Some(latest_issue)
    }
}

/// Timestamp for a new issue appended after `events`.
///
/// An issue stamped at or before the latest completed return would read as
/// already closed, so it is moved one microsecond past that return.
pub fn issue_timestamp(events: &[LoanEvent], proposed: DateTime<Utc>) -> DateTime<Utc> {
    let last_return = events
        .iter()
        .filter(|e| e.is_completed_return())
        .map(|e| e.occurred_at)
        .max();

    match last_return {
        Some(at) if proposed <= at => at + Duration::microseconds(1),
        _ => proposed,
    }
}

/// Resolve open loans for many textbooks from a mixed event list.
pub fn open_loans_by_textbook(events: &[LoanEvent]) -> BTreeMap<TextbookId, LoanEvent> {
    let mut per_textbook: BTreeMap<TextbookId, Vec<LoanEvent>> = BTreeMap::new();
    for event in events {
        per_textbook
            .entry(event.textbook_id)
            .or_default()
            .push(event.clone());
    }

    per_textbook
        .into_iter()
        .filter_map(|(textbook_id, log)| open_loan(&log).cloned().map(|e| (textbook_id, e)))
        .collect()
}

/// Open loans from `open` attributed to one student.
pub fn attributed_to<'a>(
    open: impl IntoIterator<Item = &'a LoanEvent>,
    student_id: StudentId,
) -> Vec<LoanEvent> {
    open.into_iter()
        .filter(|e| e.student_id == student_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoanKind, LoanStatus};
    use chrono::TimeZone;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    fn event(id: i64, kind: LoanKind, status: LoanStatus, student: i64, at: DateTime<Utc>) -> LoanEvent {
        LoanEvent {
            id,
            textbook_id: 1,
            student_id: student,
            kind,
            status,
            occurred_at: at,
            actor_id: 100,
            evidence: vec![],
            notes: None,
            returned_at: (kind == LoanKind::Return).then_some(at),
        }
    }

    fn issue(id: i64, student: i64, at: DateTime<Utc>) -> LoanEvent {
        event(id, LoanKind::Issue, LoanStatus::Completed, student, at)
    }

    fn ret(id: i64, student: i64, at: DateTime<Utc>) -> LoanEvent {
        event(id, LoanKind::Return, LoanStatus::Completed, student, at)
    }

    #[test]
    fn test_never_issued_has_no_open_loan() {
        assert!(open_loan(&[]).is_none());
    }

    #[test]
    fn test_single_issue_is_open() {
        let log = vec![issue(1, 10, day(0))];
        assert_eq!(open_loan(&log).map(|e| e.id), Some(1));
    }

    #[test]
    fn test_return_closes_issue() {
        let log = vec![issue(1, 10, day(0)), ret(2, 10, day(5))];
        assert!(open_loan(&log).is_none());
    }

    #[test]
    fn test_return_with_equal_timestamp_closes_issue() {
        let log = vec![issue(1, 10, day(0)), ret(2, 10, day(0))];
        assert!(open_loan(&log).is_none());
    }

    #[test]
    fn test_latest_cycle_wins_across_many_cycles() {
        let log = vec![
            issue(1, 10, day(0)),
            ret(2, 10, day(30)),
            issue(3, 11, day(40)),
            ret(4, 11, day(70)),
            issue(5, 12, day(80)),
        ];
        let open = open_loan(&log).unwrap();
        assert_eq!(open.id, 5);
        assert_eq!(open.student_id, 12);
    }

    #[test]
    fn test_old_return_does_not_close_newer_issue() {
        // Log handed over out of order.
        let log = vec![issue(3, 11, day(40)), ret(2, 10, day(30)), issue(1, 10, day(0))];
        assert_eq!(open_loan(&log).map(|e| e.id), Some(3));
    }

    #[test]
    fn test_pending_and_cancelled_events_are_ignored() {
        let log = vec![
            issue(1, 10, day(0)),
            event(2, LoanKind::Return, LoanStatus::Cancelled, 10, day(1)),
            event(3, LoanKind::Return, LoanStatus::Pending, 10, day(2)),
            event(4, LoanKind::Issue, LoanStatus::Cancelled, 11, day(3)),
        ];
        assert_eq!(open_loan(&log).map(|e| e.id), Some(1));
    }

    #[test]
    fn test_reissue_at_return_instant_stays_open() {
        let mut log = vec![issue(1, 10, day(0)), ret(2, 10, day(5))];
        let at = issue_timestamp(&log, day(5));
        assert!(at > day(5));
        log.push(issue(3, 11, at));
        assert_eq!(open_loan(&log).map(|e| e.id), Some(3));

        assert_eq!(issue_timestamp(&log, day(9)), day(9));
    }

    #[test]
    fn test_open_loans_by_textbook_and_attribution() {
        let mut other = issue(7, 11, day(2));
        other.textbook_id = 2;
        let mut closed = issue(8, 10, day(1));
        closed.textbook_id = 3;
        let mut closed_return = ret(9, 10, day(3));
        closed_return.textbook_id = 3;

        let events = vec![issue(1, 10, day(0)), other, closed, closed_return];
        let open = open_loans_by_textbook(&events);
        assert_eq!(open.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let mine = attributed_to(open.values(), 10);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].textbook_id, 1);
    }
}
