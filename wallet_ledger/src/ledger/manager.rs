//! Ledger manager: single-wallet transactions, balances, transfers.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use super::errors::{LedgerError, LedgerResult};
use super::models::{
    AccountId, AuditRecord, Category, EntryMetadata, EntryStatus, EntryType, LedgerTransaction,
    TransactionId, TransferMetadata, Wallet, WalletId,
};
use super::store::{BetOrderWrite, Changeset, Committed, LedgerStore, NewEntry, WalletLeg};

/// Largest page returned by [`LedgerManager::history`]
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Wallet selector for balance lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletRef {
    Wallet(WalletId),
    Account(AccountId),
}

/// A single balance movement, optionally carrying bet order writes and audit
/// records that must commit together with it
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub category: Category,
    pub reference: Option<String>,
    pub status: EntryStatus,
    pub metadata: EntryMetadata,
    pub bets: Vec<BetOrderWrite>,
    pub audit: Vec<AuditRecord>,
}

impl ApplyRequest {
    pub fn new(
        wallet_id: WalletId,
        amount: Decimal,
        entry_type: EntryType,
        category: Category,
    ) -> Self {
        Self {
            wallet_id,
            amount,
            entry_type,
            category,
            reference: None,
            status: EntryStatus::Completed,
            metadata: EntryMetadata::None,
            bets: Vec::new(),
            audit: Vec::new(),
        }
    }

    pub fn credit(wallet_id: WalletId, amount: Decimal, category: Category) -> Self {
        Self::new(wallet_id, amount, EntryType::Credit, category)
    }

    pub fn debit(wallet_id: WalletId, amount: Decimal, category: Category) -> Self {
        Self::new(wallet_id, amount, EntryType::Debit, category)
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn maybe_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = metadata;
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
}

/// Result of an applied transaction
#[derive(Debug, Clone, Serialize)]
pub struct Applied {
    pub balance: Decimal,
    pub transaction_id: TransactionId,
    pub transaction: LedgerTransaction,
    pub wallet: Wallet,
}

/// Wallet-to-wallet movement
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: WalletId,
    pub to: WalletId,
    pub amount: Decimal,
    /// Idempotency key; the credit leg uses `<reference>:credit`
    pub reference: Option<String>,
    pub staff_id: Option<i64>,
    pub note: Option<String>,
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    pub debit: Applied,
    pub credit: Applied,
}

/// Ledger manager
#[derive(Clone)]
pub struct LedgerManager {
    store: Arc<dyn LedgerStore>,
}

impl LedgerManager {
    /// Create a new ledger manager
    ///
    /// # Arguments
    ///
    /// * `store` - Storage backend
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Provision the wallet of an account
    ///
    /// Calling this again for the same account returns the existing wallet.
    pub async fn create_wallet(
        &self,
        account_id: AccountId,
        currency: &str,
    ) -> LedgerResult<Wallet> {
        let wallet = self.store.create_wallet(account_id, currency).await?;
        log::info!("Wallet {} ready for account {}", wallet.id, account_id);
        Ok(wallet)
    }

    /// Apply a credit or debit to one wallet
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    /// * `LedgerError::WalletNotFound` - Wallet does not exist
    /// * `LedgerError::InsufficientBalance` - Debit would drive the balance negative
    /// * `LedgerError::DuplicateReference` - Reference already applied
    pub async fn apply_transaction(&self, request: ApplyRequest) -> LedgerResult<Applied> {
        self.apply_batch(vec![request])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Decode("commit returned no legs".to_string()))
    }

    /// Apply several movements as one atomic unit, results in input order
    ///
    /// Either every movement lands or none does. Bet order writes and audit
    /// records of all requests commit with them.
    pub async fn apply_batch(&self, requests: Vec<ApplyRequest>) -> LedgerResult<Vec<Applied>> {
        let mut changeset = Changeset::default();
        for request in requests {
            ensure_positive(request.amount)?;

            let entry = NewEntry {
                amount: request.amount,
                entry_type: request.entry_type,
                status: request.status,
                category: request.category,
                reference: request.reference,
                metadata: request.metadata,
            };

            // A failed row records an attempt without moving money.
            let mut leg = WalletLeg::entry(request.wallet_id, entry);
            if request.status == EntryStatus::Failed {
                leg.balance_delta = Decimal::ZERO;
            }

            changeset.legs.push(leg);
            changeset.bets.extend(request.bets);
            changeset.audit.extend(request.audit);
        }

        let committed = self.store.commit(changeset).await?;
        let mut applied = Vec::with_capacity(committed.legs.len());
        for leg in committed.legs {
            let applied_leg = first_applied(Committed { legs: vec![leg] })?;
            log::debug!(
                "Applied {} {} {} to wallet {} (balance {})",
                applied_leg.transaction.category,
                applied_leg.transaction.entry_type,
                applied_leg.transaction.amount,
                applied_leg.wallet.id,
                applied_leg.balance
            );
            applied.push(applied_leg);
        }

        Ok(applied)
    }

    /// Commit bet order writes and audit records that move no money
    pub async fn record_bet_changes(
        &self,
        bets: Vec<BetOrderWrite>,
        audit: Vec<AuditRecord>,
    ) -> LedgerResult<()> {
        let mut changeset = Changeset::default().audit(audit);
        changeset.bets = bets;
        if changeset.is_empty() {
            return Ok(());
        }
        self.store.commit(changeset).await?;
        Ok(())
    }

    /// Read-only balance projection
    pub async fn get_balance(&self, wallet: WalletRef) -> LedgerResult<Wallet> {
        match wallet {
            WalletRef::Wallet(id) => self.store.wallet(id).await,
            WalletRef::Account(account_id) => self.store.wallet_by_account(account_id).await,
        }
    }

    /// Move funds between two wallets in one atomic unit
    ///
    /// # Errors
    ///
    /// * `LedgerError::OperationNotAllowed` - Source and destination are the same wallet
    /// * `LedgerError::InsufficientBalance` - Source cannot cover the amount
    pub async fn transfer(&self, request: TransferRequest) -> LedgerResult<Transfer> {
        ensure_positive(request.amount)?;
        if request.from == request.to {
            return Err(LedgerError::OperationNotAllowed(
                "transfer to the same wallet".to_string(),
            ));
        }

        let debit = NewEntry {
            amount: request.amount,
            entry_type: EntryType::Debit,
            status: EntryStatus::Completed,
            category: Category::PartnerTransfer,
            reference: request.reference.clone(),
            metadata: EntryMetadata::Transfer(TransferMetadata {
                counterparty_wallet: request.to,
                staff_id: request.staff_id,
                note: request.note.clone(),
            }),
        };
        let credit = NewEntry {
            amount: request.amount,
            entry_type: EntryType::Credit,
            status: EntryStatus::Completed,
            category: Category::PartnerDeposit,
            reference: request.reference.as_ref().map(|r| format!("{r}:credit")),
            metadata: EntryMetadata::Transfer(TransferMetadata {
                counterparty_wallet: request.from,
                staff_id: request.staff_id,
                note: request.note,
            }),
        };

        let committed = self
            .store
            .commit(
                Changeset::default()
                    .leg(WalletLeg::entry(request.from, debit))
                    .leg(WalletLeg::entry(request.to, credit)),
            )
            .await?;

        let mut legs = committed.legs.into_iter();
        let (Some(debit), Some(credit)) = (legs.next(), legs.next()) else {
            return Err(LedgerError::Decode("transfer committed without both legs".to_string()));
        };
        let debit = first_applied(Committed { legs: vec![debit] })?;
        let credit = first_applied(Committed { legs: vec![credit] })?;

        log::info!(
            "Transferred {} from wallet {} to wallet {}",
            request.amount,
            request.from,
            request.to
        );

        Ok(Transfer { debit, credit })
    }

    /// Ledger rows of a wallet, newest first
    pub async fn history(
        &self,
        wallet_id: WalletId,
        limit: i64,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        self.store
            .history(wallet_id, limit.clamp(1, MAX_HISTORY_LIMIT))
            .await
    }
}

pub(crate) fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

fn first_applied(committed: Committed) -> LedgerResult<Applied> {
    let leg = committed
        .legs
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::Decode("commit returned no legs".to_string()))?;
    let transaction = leg
        .entry
        .ok_or_else(|| LedgerError::Decode("commit returned no ledger row".to_string()))?;

    Ok(Applied {
        balance: leg.wallet.balance,
        transaction_id: transaction.id,
        transaction,
        wallet: leg.wallet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStore;

    async fn funded(balance: i64) -> (LedgerManager, Wallet) {
        let manager = LedgerManager::new(Arc::new(MemoryLedgerStore::new()));
        let wallet = manager.create_wallet(1, "INR").await.unwrap();
        if balance > 0 {
            manager
                .apply_transaction(ApplyRequest::credit(
                    wallet.id,
                    Decimal::from(balance),
                    Category::Deposit,
                ))
                .await
                .unwrap();
        }
        (manager, wallet)
    }

    #[tokio::test]
    async fn test_apply_transaction_returns_new_balance() {
        let (manager, wallet) = funded(500).await;

        let applied = manager
            .apply_transaction(
                ApplyRequest::debit(wallet.id, Decimal::from(50), Category::CasinoBet)
                    .reference("tid:T1"),
            )
            .await
            .unwrap();

        assert_eq!(applied.balance, Decimal::from(450));
        assert_eq!(applied.transaction.resulting_balance, Decimal::from(450));
        assert_eq!(applied.transaction.reference.as_deref(), Some("tid:T1"));
        assert!(applied.transaction.completed_at.is_some());
        assert!(applied.wallet.last_transaction_at.is_some());
    }

    #[tokio::test]
    async fn test_debit_below_zero_rejected_and_wallet_unchanged() {
        let (manager, wallet) = funded(30).await;

        let err = manager
            .apply_transaction(ApplyRequest::debit(wallet.id, Decimal::from(31), Category::Bet))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        let after = manager.get_balance(WalletRef::Wallet(wallet.id)).await.unwrap();
        assert_eq!(after.balance, Decimal::from(30));
        assert_eq!(manager.history(wallet.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let (manager, wallet) = funded(0).await;
        let err = manager
            .apply_transaction(ApplyRequest::credit(wallet.id, Decimal::ZERO, Category::Deposit))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_unknown_wallet() {
        let (manager, _) = funded(0).await;
        let err = manager
            .apply_transaction(ApplyRequest::credit(
                uuid::Uuid::new_v4(),
                Decimal::ONE,
                Category::Deposit,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_balance_by_account() {
        let (manager, wallet) = funded(75).await;
        let by_account = manager.get_balance(WalletRef::Account(1)).await.unwrap();
        assert_eq!(by_account.id, wallet.id);
        assert_eq!(by_account.balance, Decimal::from(75));
    }

    #[tokio::test]
    async fn test_transfer_moves_both_legs() {
        let (manager, partner) = funded(100).await;
        let customer = manager.create_wallet(2, "INR").await.unwrap();

        let transfer = manager
            .transfer(TransferRequest {
                from: partner.id,
                to: customer.id,
                amount: Decimal::from(40),
                reference: Some("transfer-1".to_string()),
                staff_id: None,
                note: None,
            })
            .await
            .unwrap();

        assert_eq!(transfer.debit.balance, Decimal::from(60));
        assert_eq!(transfer.credit.balance, Decimal::from(40));
        assert_eq!(transfer.debit.transaction.category, Category::PartnerTransfer);
        assert_eq!(transfer.credit.transaction.category, Category::PartnerDeposit);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_moves_nothing() {
        let (manager, partner) = funded(10).await;
        let customer = manager.create_wallet(2, "INR").await.unwrap();

        let err = manager
            .transfer(TransferRequest {
                from: partner.id,
                to: customer.id,
                amount: Decimal::from(40),
                reference: None,
                staff_id: None,
                note: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        let customer = manager.get_balance(WalletRef::Wallet(customer.id)).await.unwrap();
        assert_eq!(customer.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (manager, wallet) = funded(10).await;
        manager
            .apply_transaction(ApplyRequest::credit(wallet.id, Decimal::from(5), Category::Bonus))
            .await
            .unwrap();

        let history = manager.history(wallet.id, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].category, Category::Bonus);
    }
}
