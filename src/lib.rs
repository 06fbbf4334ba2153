//! Textbook loan ledger.
//!
//! Tracks which school textbook is on loan to which student as an
//! append-only log of issue and return events, runs the damage and
//! found-item review workflows, and applies the post-issue grace period
//! for reporting pre-existing damage.

pub mod config;
pub mod error;
pub mod evidence;
pub mod interfaces;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod policy;
pub mod registry;
pub mod review;
pub mod storage;
pub mod utils;

pub use error::{LedgerError, Result};
pub use ledger::{BatchOutcome, CodeLookup, Evidence, Ledger, TextbookStatus};
pub use policy::GracePolicy;
pub use registry::{StudentDetails, TextbookDetails};
pub use review::{FoundTarget, Reporter};
