//! The loan ledger.
//!
//! [`Ledger`] is the service every caller goes through. Loan state is never
//! stored: each query replays the append-only log through
//! [`reconcile::open_loan`]. Writes that depend on that state go through the
//! store's transactional check-and-insert.
//!
//! Review, policy and registry operations live in their own modules as
//! further `impl Ledger` blocks.

mod clock;
pub mod reconcile;
mod reports;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::evidence::{image_extension, FilesystemEvidenceStore};
use crate::interfaces::{EvidenceStore, LedgerStore};
use crate::model::{
    DamageCategory, DamageFilter, EvidenceRef, IssueDraft, IssueOutcome, LoanEvent, LoanFilter,
    LoanStatus, ReturnDraft, ReturnOutcome, Student, StudentId, Textbook, TextbookId, UserId,
};
use crate::notify::{init_notifications, Notification, NotificationDispatcher, Recipient};
use crate::policy::GracePolicy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use reports::{
    DamageLine, DamageSummary, GradeSummary, HistoryEntry, StudentDamage, StudentLoans,
    StudentSummary, SummaryLine,
};

/// Photo evidence attached to a ledger write.
#[derive(Debug, Clone)]
pub enum Evidence {
    /// Already stored; kept verbatim.
    Stored(EvidenceRef),
    /// Raw upload, stored through the configured evidence store.
    Upload {
        content_type: String,
        filename: Option<String>,
        bytes: Vec<u8>,
    },
}

impl Evidence {
    pub fn is_upload(&self) -> bool {
        matches!(self, Evidence::Upload { .. })
    }
}

fn has_uploads(evidence: &[Evidence]) -> bool {
    evidence.iter().any(Evidence::is_upload)
}

fn active_textbook(textbook: Textbook) -> Result<Textbook> {
    if !textbook.is_active {
        return Err(LedgerError::Inactive {
            entity: "textbook",
            id: textbook.id,
        });
    }
    Ok(textbook)
}

/// Where a textbook stands right now, derived from its log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "issue", rename_all = "snake_case")]
pub enum TextbookStatus {
    /// Deactivated; no longer issued.
    Withdrawn,
    Available,
    OnLoan(LoanEvent),
    /// On loan with a `Lost` damage report filed since issuance.
    Lost(LoanEvent),
}

impl TextbookStatus {
    pub fn open_loan(&self) -> Option<&LoanEvent> {
        match self {
            TextbookStatus::OnLoan(issue) | TextbookStatus::Lost(issue) => Some(issue),
            TextbookStatus::Withdrawn | TextbookStatus::Available => None,
        }
    }
}

/// A scanned code resolved for a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeLookup {
    pub textbook: Textbook,
    pub status: TextbookStatus,
    /// True when the viewer is the current borrower.
    pub is_own_loan: bool,
}

/// Result of a bulk issue or return.
///
/// Items are processed one by one; a rejected item is recorded and skipped.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub created: Vec<LoanEvent>,
    pub skipped: Vec<(TextbookId, LedgerError)>,
}

impl BatchOutcome {
    pub fn skipped_ids(&self) -> Vec<TextbookId> {
        self.skipped.iter().map(|(id, _)| *id).collect()
    }
}

/// Loan ledger service.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    notifications: NotificationDispatcher,
    policy: GracePolicy,
    clock: Arc<dyn Clock>,
    evidence: Option<Arc<dyn EvidenceStore>>,
}

impl Ledger {
    /// Create a ledger with the default grace policy, the system clock and
    /// no evidence store.
    pub fn new(store: Arc<dyn LedgerStore>, notifications: NotificationDispatcher) -> Self {
        Self {
            store,
            notifications,
            policy: GracePolicy::default(),
            clock: Arc::new(SystemClock),
            evidence: None,
        }
    }

    pub fn with_policy(mut self, policy: GracePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_evidence_store(mut self, evidence: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Wire storage, notifications and evidence from configuration.
    ///
    /// Returns the notification worker handle, if one was started.
    pub async fn from_config(
        config: &Config,
    ) -> std::result::Result<(Self, Option<JoinHandle<()>>), Box<dyn std::error::Error>> {
        let store = crate::storage::init_storage(&config.storage).await?;
        let (notifications, worker) = init_notifications(&config.notifications)?;
        let evidence = FilesystemEvidenceStore::new(&config.evidence.base_path).await?;

        let ledger = Self::new(store, notifications)
            .with_policy(GracePolicy::from_days(config.ledger.grace_days))
            .with_evidence_store(Arc::new(evidence));
        Ok((ledger, worker))
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn policy(&self) -> GracePolicy {
        self.policy
    }

    /// Current time at the precision the store keeps.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    pub(crate) async fn require_textbook(&self, id: TextbookId) -> Result<Textbook> {
        self.store
            .get_textbook(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("textbook", id))
    }

    pub(crate) async fn require_student(&self, id: StudentId) -> Result<Student> {
        self.store
            .get_student(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("student", id))
    }

    pub(crate) fn notify_parent(&self, student: &Student, notification: Notification) {
        match &student.parent_phone {
            Some(phone) => self.notifications.dispatch(
                Recipient::Parent {
                    phone: phone.clone(),
                },
                notification,
            ),
            None => debug!(
                student_id = student.id,
                kind = notification.kind(),
                "No parent phone on file, skipping notification"
            ),
        }
    }

    pub(crate) fn notify_staff(&self, notification: Notification) {
        self.notifications.dispatch(Recipient::Staff, notification);
    }

    /// Store uploads and pass stored references through.
    ///
    /// Non-image uploads are skipped. Uploads are skipped with a warning when
    /// no evidence store is configured.
    pub(crate) async fn resolve_evidence(&self, items: Vec<Evidence>) -> Result<Vec<EvidenceRef>> {
        let mut refs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Evidence::Stored(reference) => refs.push(reference),
                Evidence::Upload {
                    content_type,
                    filename,
                    bytes,
                } => {
                    let Some(extension) = image_extension(&content_type) else {
                        debug!(content_type = %content_type, ?filename, "Skipping non-image upload");
                        continue;
                    };
                    let Some(store) = &self.evidence else {
                        warn!(?filename, "No evidence store configured, dropping upload");
                        continue;
                    };
                    refs.push(store.put(&bytes, extension).await?);
                }
            }
        }
        Ok(refs)
    }

    /// Labels of the given textbooks, in order, skipping missing ids.
    pub(crate) async fn labels(&self, ids: impl IntoIterator<Item = TextbookId>) -> Result<Vec<String>> {
        let mut labels = Vec::new();
        for id in ids {
            if let Some(textbook) = self.store.get_textbook(id).await? {
                labels.push(textbook.label());
            }
        }
        Ok(labels)
    }

    /// Open loans of every textbook, keyed by textbook.
    pub(crate) async fn open_loans(&self) -> Result<BTreeMap<TextbookId, LoanEvent>> {
        let events = self
            .store
            .list_loan_events(&LoanFilter {
                status: Some(LoanStatus::Completed),
                limit: u64::MAX,
                ..LoanFilter::default()
            })
            .await?;
        Ok(reconcile::open_loans_by_textbook(&events))
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// The open issue of a textbook, if any.
    pub async fn is_open_loan(&self, textbook_id: TextbookId) -> Result<Option<LoanEvent>> {
        let events = self.store.loan_events_for_textbook(textbook_id).await?;
        Ok(reconcile::open_loan(&events).cloned())
    }

    /// Open loans attributed to a student.
    pub async fn active_loans(&self, student_id: StudentId) -> Result<Vec<LoanEvent>> {
        let touched: BTreeSet<TextbookId> = self
            .store
            .loan_events_for_student(student_id)
            .await?
            .iter()
            .map(|e| e.textbook_id)
            .collect();

        let mut loans = Vec::new();
        for textbook_id in touched {
            if let Some(open) = self.is_open_loan(textbook_id).await? {
                if open.student_id == student_id {
                    loans.push(open);
                }
            }
        }
        loans.sort_by_key(|e| (e.occurred_at, e.id));
        Ok(loans)
    }

    pub async fn textbook_status(&self, textbook_id: TextbookId) -> Result<TextbookStatus> {
        let textbook = self.require_textbook(textbook_id).await?;
        if !textbook.is_active {
            return Ok(TextbookStatus::Withdrawn);
        }

        let Some(issue) = self.is_open_loan(textbook_id).await? else {
            return Ok(TextbookStatus::Available);
        };

        let lost = self
            .store
            .list_damage_reports(&DamageFilter {
                category: Some(DamageCategory::Lost),
                ..DamageFilter::for_textbook(textbook_id)
            })
            .await?
            .iter()
            .any(|r| r.reported_at >= issue.occurred_at);

        Ok(if lost {
            TextbookStatus::Lost(issue)
        } else {
            TextbookStatus::OnLoan(issue)
        })
    }

    /// Resolve a scanned code.
    pub async fn lookup_by_code(
        &self,
        code: &str,
        viewer: Option<StudentId>,
    ) -> Result<CodeLookup> {
        let textbook = self
            .store
            .find_textbook_by_code(code.trim())
            .await?
            .ok_or_else(|| LedgerError::not_found("textbook", code))?;
        let status = self.textbook_status(textbook.id).await?;
        let is_own_loan = match (viewer, status.open_loan()) {
            (Some(viewer), Some(issue)) => issue.student_id == viewer,
            _ => false,
        };
        Ok(CodeLookup {
            textbook,
            status,
            is_own_loan,
        })
    }

    pub async fn loan_events(&self, filter: &LoanFilter) -> Result<Vec<LoanEvent>> {
        Ok(self.store.list_loan_events(filter).await?)
    }

    // ------------------------------------------------------------------
    // Issue and return
    // ------------------------------------------------------------------

    async fn issue_one(
        &self,
        textbook: Textbook,
        student: &Student,
        actor_id: UserId,
        evidence: Vec<EvidenceRef>,
        notes: Option<String>,
    ) -> Result<(Textbook, LoanEvent)> {
        let textbook_id = textbook.id;
        let draft = IssueDraft {
            textbook_id,
            student_id: student.id,
            actor_id,
            evidence,
            notes,
            occurred_at: self.now(),
        };

        match self.store.issue_if_available(draft).await? {
            IssueOutcome::Issued(event) => {
                info!(
                    textbook_id,
                    student_id = student.id,
                    actor_id,
                    event_id = event.id,
                    "Textbook issued"
                );
                Ok((textbook, event))
            }
            IssueOutcome::AlreadyOnLoan(open) => {
                debug!(
                    textbook_id,
                    holder = open.student_id,
                    requested_for = student.id,
                    "Issue rejected, textbook already on loan"
                );
                Err(LedgerError::AlreadyIssued {
                    textbook_id,
                    student_id: open.student_id,
                })
            }
        }
    }

    async fn require_active_student(&self, student_id: StudentId) -> Result<Student> {
        let student = self.require_student(student_id).await?;
        if !student.is_active {
            return Err(LedgerError::Inactive {
                entity: "student",
                id: student_id,
            });
        }
        Ok(student)
    }

    /// Issue a textbook to a student and notify the parent.
    ///
    /// Uploads are stored only once the textbook and student pass their checks.
    pub async fn issue(
        &self,
        textbook_id: TextbookId,
        student_id: StudentId,
        actor_id: UserId,
        evidence: Vec<Evidence>,
        notes: Option<String>,
    ) -> Result<LoanEvent> {
        let textbook = self.require_textbook(textbook_id).await?;
        let student = self.require_active_student(student_id).await?;
        let textbook = active_textbook(textbook)?;
        if has_uploads(&evidence) {
            if let Some(open) = self.is_open_loan(textbook_id).await? {
                debug!(textbook_id, holder = open.student_id, "Issue rejected before upload");
                return Err(LedgerError::AlreadyIssued {
                    textbook_id,
                    student_id: open.student_id,
                });
            }
        }
        let evidence = self.resolve_evidence(evidence).await?;

        let (textbook, event) = self
            .issue_one(textbook, &student, actor_id, evidence, notes)
            .await?;

        self.notify_parent(
            &student,
            Notification::TextbooksIssued {
                student_name: student.full_name(),
                textbooks: vec![textbook.label()],
            },
        );
        Ok(event)
    }

    async fn return_one(
        &self,
        textbook: Textbook,
        actor_id: UserId,
        evidence: Vec<EvidenceRef>,
        notes: Option<String>,
    ) -> Result<(Textbook, LoanEvent)> {
        let textbook_id = textbook.id;
        let draft = ReturnDraft {
            textbook_id,
            actor_id,
            evidence,
            notes,
            occurred_at: self.now(),
        };

        match self.store.return_if_on_loan(draft).await? {
            ReturnOutcome::Returned { issue, event } => {
                info!(
                    textbook_id,
                    student_id = event.student_id,
                    issue_id = issue.id,
                    event_id = event.id,
                    actor_id,
                    "Textbook returned"
                );
                Ok((textbook, event))
            }
            ReturnOutcome::NotOnLoan => Err(LedgerError::NotIssued { textbook_id }),
        }
    }

    /// Record the return of a textbook's open loan and notify the parent.
    pub async fn return_(
        &self,
        textbook_id: TextbookId,
        actor_id: UserId,
        evidence: Vec<Evidence>,
        notes: Option<String>,
    ) -> Result<LoanEvent> {
        let textbook = self.require_textbook(textbook_id).await?;
        if has_uploads(&evidence) && self.is_open_loan(textbook_id).await?.is_none() {
            debug!(textbook_id, "Return rejected before upload");
            return Err(LedgerError::NotIssued { textbook_id });
        }
        let evidence = self.resolve_evidence(evidence).await?;
        let (textbook, event) = self.return_one(textbook, actor_id, evidence, notes).await?;

        match self.store.get_student(event.student_id).await {
            Ok(Some(student)) => self.notify_parent(
                &student,
                Notification::TextbooksReturned {
                    student_name: student.full_name(),
                    textbooks: vec![textbook.label()],
                },
            ),
            Ok(None) => warn!(student_id = event.student_id, "Borrower missing from roster"),
            Err(e) => warn!(error = %e, "Could not load borrower for return notification"),
        }
        Ok(event)
    }

    /// Issue several textbooks to one student.
    ///
    /// A missing or inactive student rejects the whole batch; per-textbook
    /// failures are skipped. The parent gets one message listing everything
    /// issued.
    pub async fn bulk_issue(
        &self,
        student_id: StudentId,
        textbook_ids: &[TextbookId],
        actor_id: UserId,
        notes: Option<String>,
    ) -> Result<BatchOutcome> {
        let student = self.require_active_student(student_id).await?;

        let mut outcome = BatchOutcome::default();
        let mut labels = Vec::new();
        for &textbook_id in textbook_ids {
            let issued = match self.require_textbook(textbook_id).await.and_then(active_textbook) {
                Ok(textbook) => {
                    self.issue_one(textbook, &student, actor_id, Vec::new(), notes.clone())
                        .await
                }
                Err(e) => Err(e),
            };
            match issued {
                Ok((textbook, event)) => {
                    labels.push(textbook.label());
                    outcome.created.push(event);
                }
                Err(e) => {
                    if e.is_rejection() {
                        debug!(textbook_id, error = %e, "Skipping textbook in bulk issue");
                    } else {
                        error!(textbook_id, error = %e, "Bulk issue item failed");
                    }
                    outcome.skipped.push((textbook_id, e));
                }
            }
        }

        info!(
            student_id,
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            "Bulk issue finished"
        );

        if !labels.is_empty() {
            self.notify_parent(
                &student,
                Notification::TextbooksIssued {
                    student_name: student.full_name(),
                    textbooks: labels,
                },
            );
        }
        Ok(outcome)
    }

    /// Return several textbooks, possibly held by different students.
    ///
    /// Each affected parent gets one message listing their child's returns.
    pub async fn bulk_return(
        &self,
        textbook_ids: &[TextbookId],
        actor_id: UserId,
        notes: Option<String>,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut per_student: BTreeMap<StudentId, Vec<String>> = BTreeMap::new();

        for &textbook_id in textbook_ids {
            let returned = match self.require_textbook(textbook_id).await {
                Ok(textbook) => {
                    self.return_one(textbook, actor_id, Vec::new(), notes.clone())
                        .await
                }
                Err(e) => Err(e),
            };
            match returned {
                Ok((textbook, event)) => {
                    per_student
                        .entry(event.student_id)
                        .or_default()
                        .push(textbook.label());
                    outcome.created.push(event);
                }
                Err(e) => {
                    if e.is_rejection() {
                        debug!(textbook_id, error = %e, "Skipping textbook in bulk return");
                    } else {
                        error!(textbook_id, error = %e, "Bulk return item failed");
                    }
                    outcome.skipped.push((textbook_id, e));
                }
            }
        }

        info!(
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            "Bulk return finished"
        );

        for (student_id, labels) in per_student {
            match self.store.get_student(student_id).await {
                Ok(Some(student)) => self.notify_parent(
                    &student,
                    Notification::TextbooksReturned {
                        student_name: student.full_name(),
                        textbooks: labels,
                    },
                ),
                Ok(None) => warn!(student_id, "Borrower missing from roster"),
                Err(e) => warn!(student_id, error = %e, "Could not load borrower for return notification"),
            }
        }
        Ok(outcome)
    }
}
