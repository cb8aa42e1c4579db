//! PostgreSQL backend tests. Run with `DATABASE_URL` set and `--ignored`.

use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_ledger::collab::{AccountDirectory, AccountRole, PgAccountDirectory};
use wallet_ledger::db::{Database, DatabaseConfig};
use wallet_ledger::hold::HoldManager;
use wallet_ledger::ledger::{
    ApplyRequest, Category, HoldMetadata, LedgerError, LedgerManager, PgLedgerStore,
};

/// Generate a unique external player id
fn unique_player(prefix: &str) -> String {
    format!(
        "{}_{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap()
    )
}

async fn setup() -> (LedgerManager, HoldManager, PgAccountDirectory) {
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
    let db = Database::new(&config)
        .await
        .expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to run migrations");

    let store = Arc::new(PgLedgerStore::new(db.shared_pool()));
    (
        LedgerManager::new(store.clone()),
        HoldManager::new(store),
        PgAccountDirectory::new(db.shared_pool()),
    )
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_credit_debit_and_reference() {
    let (ledger, _, accounts) = setup().await;
    let account = accounts
        .register(&unique_player("pg_ledger"), AccountRole::Customer)
        .await
        .unwrap();
    let wallet = ledger.create_wallet(account.id, "INR").await.unwrap();

    let credit = ApplyRequest::credit(wallet.id, Decimal::from(500), Category::Deposit)
        .reference(format!("test:{}", wallet.id));
    let applied = ledger.apply_transaction(credit.clone()).await.unwrap();
    assert_eq!(applied.balance, Decimal::from(500));

    let duplicate = ledger.apply_transaction(credit).await;
    assert!(matches!(duplicate, Err(LedgerError::DuplicateReference(_))));

    let overdraw = ledger
        .apply_transaction(ApplyRequest::debit(wallet.id, Decimal::from(501), Category::Withdrawal))
        .await;
    assert!(matches!(overdraw, Err(LedgerError::InsufficientBalance { .. })));

    let history = ledger.history(wallet.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_hold_round_trip() {
    let (ledger, holds, accounts) = setup().await;
    let account = accounts
        .register(&unique_player("pg_hold"), AccountRole::Customer)
        .await
        .unwrap();
    let wallet = ledger.create_wallet(account.id, "INR").await.unwrap();
    ledger
        .apply_transaction(ApplyRequest::credit(wallet.id, Decimal::from(200), Category::Deposit))
        .await
        .unwrap();

    let held = holds
        .create_hold(account.id, Decimal::from(150), None, HoldMetadata::default())
        .await
        .unwrap();
    assert_eq!(held.balance, Decimal::from(50));
    assert_eq!(held.hold_balance, Decimal::from(150));

    let released = holds.release_hold(held.hold_id, "test", None).await.unwrap();
    assert_eq!(released.balance, Decimal::from(200));
    assert_eq!(released.hold_balance, Decimal::ZERO);
}
