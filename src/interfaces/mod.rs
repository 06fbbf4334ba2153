//! Abstract interfaces for the ledger's collaborators.
//!
//! These traits define the contracts for:
//! - Record storage (the event log and roster tables)
//! - Notification delivery (parent and staff messages)
//! - Evidence storage (photo blobs)

pub mod evidence_store;
pub mod ledger_store;
pub mod notifier;

pub use evidence_store::{EvidenceError, EvidenceStore};
pub use ledger_store::{LedgerStore, StorageError};
pub use notifier::{Notifier, NotifyError};
