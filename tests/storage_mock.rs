//! In-memory storage integration tests.
//!
//! Run with: cargo test --test storage_mock

mod storage;

use textbook_ledger::storage::MockLedgerStore;

#[tokio::test]
async fn test_mock_ledger_store() {
    println!("=== Mock LedgerStore Tests ===");

    let store = MockLedgerStore::new();
    run_ledger_store_tests!(&store);

    println!("=== All Mock LedgerStore tests PASSED ===");
}
