//! SQLite implementation of the ledger store.

mod ledger_store;
mod rows;

pub use ledger_store::SqliteLedgerStore;
