//! Shared fixtures for the in-memory integration tests.

#![allow(dead_code)]

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::sync::Arc;
use wallet_ledger::casino::{CasinoAdapter, Signer};
use wallet_ledger::collab::{AccountRef, AccountRole, MemoryAccountDirectory, MemoryTicketService};
use wallet_ledger::hold::HoldManager;
use wallet_ledger::ledger::{
    ApplyRequest, Category, LedgerManager, LedgerStore, MemoryLedgerStore, Wallet, WalletRef,
};
use wallet_ledger::sportsbook::SportsbookAdapter;

pub const SECRET: &str = "integration-test-secret";
pub const CURRENCY: &str = "INR";
pub const PLAYER: &str = "player-1";
pub const PLAYER_ACCOUNT: i64 = 1;

pub struct Harness {
    pub store: Arc<dyn LedgerStore>,
    pub ledger: LedgerManager,
    pub holds: HoldManager,
    pub casino: CasinoAdapter,
    pub sportsbook: SportsbookAdapter,
    pub signer: Signer,
    pub tickets: Arc<MemoryTicketService>,
}

/// One customer account with a funded wallet
pub async fn harness(opening_balance: i64) -> Harness {
    let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
    let ledger = LedgerManager::new(store.clone());
    let accounts = Arc::new(MemoryAccountDirectory::new().with_account(AccountRef {
        id: PLAYER_ACCOUNT,
        external_player_id: PLAYER.to_string(),
        role: AccountRole::Customer,
    }));

    let wallet = ledger.create_wallet(PLAYER_ACCOUNT, CURRENCY).await.unwrap();
    if opening_balance > 0 {
        ledger
            .apply_transaction(ApplyRequest::credit(
                wallet.id,
                Decimal::from(opening_balance),
                Category::Deposit,
            ))
            .await
            .unwrap();
    }

    let signer = Signer::new(SECRET).unwrap();
    Harness {
        holds: HoldManager::new(store.clone()),
        casino: CasinoAdapter::new(ledger.clone(), accounts.clone(), signer.clone(), CURRENCY),
        sportsbook: SportsbookAdapter::new(ledger.clone(), accounts, CURRENCY),
        signer,
        tickets: Arc::new(MemoryTicketService::new()),
        store,
        ledger,
    }
}

impl Harness {
    pub async fn wallet(&self) -> Wallet {
        self.ledger
            .get_balance(WalletRef::Account(PLAYER_ACCOUNT))
            .await
            .unwrap()
    }

    pub async fn row_count(&self) -> usize {
        let wallet = self.wallet().await;
        self.store.history(wallet.id, 10_000).await.unwrap().len()
    }

    /// Seal a casino request with the shared secret
    pub fn signed(&self, body: Value) -> Value {
        let Value::Object(map) = body else {
            panic!("casino request must be an object");
        };
        self.signer.seal(map)
    }
}

pub fn fields(value: &Value) -> &Map<String, Value> {
    value.as_object().expect("object body")
}
