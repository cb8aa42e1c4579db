//! Storage abstraction for the ledger.
//!
//! All money movement goes through [`LedgerStore::commit`], which applies a
//! [`Changeset`] as one all-or-nothing unit: balance and hold deltas, hold row
//! settlement, appended ledger rows, bet order writes and audit records either
//! all land or none do.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::errors::LedgerResult;
use super::models::{
    AccountId, AuditRecord, CasinoRound, Category, EntryMetadata, EntryStatus, EntryType,
    LedgerTransaction, TransactionId, Wallet, WalletId,
};
use crate::bets::{BetLookup, BetOrder};

/// Ledger row to append
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub category: Category,
    pub reference: Option<String>,
    pub metadata: EntryMetadata,
}

/// In-place settlement of a pending hold row
#[derive(Debug, Clone)]
pub struct HoldSettlement {
    pub hold_id: TransactionId,
    pub status: EntryStatus,
    pub category: Category,
    pub metadata: EntryMetadata,
}

/// Mutation of a single wallet
///
/// The store rejects the whole changeset if either resulting balance would be
/// negative, or if `settle_hold` does not name a pending hold of this wallet.
#[derive(Debug, Clone)]
pub struct WalletLeg {
    pub wallet_id: WalletId,
    pub balance_delta: Decimal,
    pub hold_delta: Decimal,
    pub settle_hold: Option<HoldSettlement>,
    pub entry: Option<NewEntry>,
}

impl WalletLeg {
    /// Plain balance movement with one appended row
    pub fn entry(wallet_id: WalletId, entry: NewEntry) -> Self {
        Self {
            wallet_id,
            balance_delta: entry.entry_type.signed(entry.amount),
            hold_delta: Decimal::ZERO,
            settle_hold: None,
            entry: Some(entry),
        }
    }
}

/// Bet order write
#[derive(Debug, Clone)]
pub enum BetOrderWrite {
    Insert(BetOrder),
    Update(BetOrder),
}

/// Atomic unit of work
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub legs: Vec<WalletLeg>,
    pub bets: Vec<BetOrderWrite>,
    pub audit: Vec<AuditRecord>,
}

impl Changeset {
    pub fn leg(mut self, leg: WalletLeg) -> Self {
        self.legs.push(leg);
        self
    }

    pub fn bet(mut self, write: BetOrderWrite) -> Self {
        self.bets.push(write);
        self
    }

    pub fn audit(mut self, records: impl IntoIterator<Item = AuditRecord>) -> Self {
        self.audit.extend(records);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty() && self.bets.is_empty() && self.audit.is_empty()
    }
}

/// Wallet state and appended row after one leg
#[derive(Debug, Clone)]
pub struct CommittedLeg {
    pub wallet: Wallet,
    pub entry: Option<LedgerTransaction>,
}

/// Result of a committed changeset, legs in input order
#[derive(Debug, Clone, Default)]
pub struct Committed {
    pub legs: Vec<CommittedLeg>,
}

/// Semantic key of a casino action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasinoActionKey {
    pub game_id: String,
    pub action_id: String,
    /// Part of the key only when the provider sent one
    pub subtype: Option<String>,
}

/// Trait for ledger storage backends
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the wallet of an account
    async fn create_wallet(&self, account_id: AccountId, currency: &str) -> LedgerResult<Wallet>;

    /// Get wallet by ID
    async fn wallet(&self, wallet_id: WalletId) -> LedgerResult<Wallet>;

    /// Get wallet of an account
    async fn wallet_by_account(&self, account_id: AccountId) -> LedgerResult<Wallet>;

    /// Apply a changeset atomically
    async fn commit(&self, changeset: Changeset) -> LedgerResult<Committed>;

    /// Get ledger row by ID
    async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<LedgerTransaction>>;

    /// Get ledger row by idempotency reference
    async fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<LedgerTransaction>>;

    /// Get the completed casino row carrying this semantic key
    async fn find_casino_action(
        &self,
        key: &CasinoActionKey,
    ) -> LedgerResult<Option<LedgerTransaction>>;

    /// Ledger rows of a wallet, newest first
    async fn history(&self, wallet_id: WalletId, limit: i64)
    -> LedgerResult<Vec<LedgerTransaction>>;

    /// Pending holds of a wallet
    async fn pending_holds(&self, wallet_id: WalletId) -> LedgerResult<Vec<LedgerTransaction>>;

    /// Find a bet order
    async fn bet_order(&self, lookup: &BetLookup) -> LedgerResult<Option<BetOrder>>;

    /// Insert or replace the round keyed by `(game_id, user_id)`
    async fn upsert_round(&self, round: &CasinoRound) -> LedgerResult<()>;

    /// Get a casino round
    async fn round(&self, game_id: &str, user_id: &str) -> LedgerResult<Option<CasinoRound>>;

    /// Audit records of a subject, oldest first
    async fn audit_trail(&self, subject_id: uuid::Uuid) -> LedgerResult<Vec<AuditRecord>>;

    /// Check the backend is reachable
    async fn health_check(&self) -> LedgerResult<()>;
}
