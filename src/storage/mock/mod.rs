//! Mock storage implementation for testing.

mod ledger_store;
#[cfg(test)]
mod tests;

pub use ledger_store::MockLedgerStore;
