//! Hold manager: reserve, release and execute withdrawal holds.
//!
//! Holds are PENDING `WITHDRAWAL_HOLD` rows. Creating one moves funds from
//! `balance` into `hold_balance` in the same commit that appends the row, so
//! `hold_balance` always equals the sum of the wallet's pending holds.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::ledger::manager::ensure_positive;
use crate::ledger::{
    AccountId, Category, Changeset, EntryMetadata, EntryStatus, EntryType, HoldExecutionMetadata,
    HoldMetadata, HoldReleaseMetadata, HoldSettlement, LedgerError, LedgerResult, LedgerStore,
    LedgerTransaction, NewEntry, StaffMetadata, TransactionId, Wallet, WalletLeg,
};

/// Balances after a hold operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldOutcome {
    /// Hold row id, or the debit row id on the direct withdrawal path
    pub hold_id: TransactionId,
    pub balance: Decimal,
    pub hold_balance: Decimal,
}

impl HoldOutcome {
    fn new(hold_id: TransactionId, wallet: &Wallet) -> Self {
        Self {
            hold_id,
            balance: wallet.balance,
            hold_balance: wallet.hold_balance,
        }
    }
}

/// Staff confirmation that a withdrawal left the system
#[derive(Debug, Clone)]
pub struct ExecuteHold {
    /// Hold to settle; `None` debits the wallet directly
    pub hold_id: Option<TransactionId>,
    pub account_id: AccountId,
    /// Only used on the direct debit path
    pub amount: Decimal,
    pub staff_id: i64,
    pub description: Option<String>,
    pub ticket_id: Option<i64>,
    /// Makes the direct debit path idempotent
    pub idempotency_key: Option<String>,
}

/// Hold manager
#[derive(Clone)]
pub struct HoldManager {
    store: Arc<dyn LedgerStore>,
}

impl HoldManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Reserve `amount` of an account's balance
    ///
    /// Replaying the same `reference` returns the existing hold with current balances.
    ///
    /// # Errors
    ///
    /// * `LedgerError::WalletNotFound` - Account has no wallet
    /// * `LedgerError::InsufficientAvailableBalance` - Balance below `amount`
    pub async fn create_hold(
        &self,
        account_id: AccountId,
        amount: Decimal,
        reference: Option<String>,
        metadata: HoldMetadata,
    ) -> LedgerResult<HoldOutcome> {
        ensure_positive(amount)?;
        let wallet = self.store.wallet_by_account(account_id).await?;

        if let Some(reference) = &reference {
            if let Some(existing) = self.store.find_by_reference(reference).await? {
                if existing.wallet_id == wallet.id
                    && existing.category == Category::WithdrawalHold
                {
                    return Ok(HoldOutcome::new(existing.id, &wallet));
                }
                return Err(LedgerError::DuplicateReference(reference.clone()));
            }
        }

        if wallet.balance < amount {
            return Err(LedgerError::InsufficientAvailableBalance {
                available: wallet.balance,
                required: amount,
            });
        }

        let leg = WalletLeg {
            wallet_id: wallet.id,
            balance_delta: -amount,
            hold_delta: amount,
            settle_hold: None,
            entry: Some(NewEntry {
                amount,
                entry_type: EntryType::Debit,
                status: EntryStatus::Pending,
                category: Category::WithdrawalHold,
                reference,
                metadata: EntryMetadata::Hold(metadata),
            }),
        };

        let committed = self
            .store
            .commit(Changeset::default().leg(leg))
            .await
            .map_err(|e| match e {
                // The pre-check raced a concurrent debit.
                LedgerError::InsufficientBalance {
                    available,
                    required,
                } => LedgerError::InsufficientAvailableBalance {
                    available,
                    required,
                },
                other => other,
            })?;

        let (wallet, hold) = single_leg(committed)?;
        let hold = hold.ok_or_else(|| LedgerError::Decode("hold row missing".to_string()))?;
        log::info!(
            "Created hold {} of {} on wallet {} (balance {}, held {})",
            hold.id,
            amount,
            wallet.id,
            wallet.balance,
            wallet.hold_balance
        );

        Ok(HoldOutcome::new(hold.id, &wallet))
    }

    /// Return a pending hold to the spendable balance
    ///
    /// The hold row is marked `REVERSED` and a `WITHDRAWAL_RELEASE` credit
    /// referencing it is appended, in one commit.
    ///
    /// # Errors
    ///
    /// * `LedgerError::HoldNotFound` - No pending hold with this id
    /// * `LedgerError::InsufficientHoldBalance` - Wallet holds less than the hold amount
    pub async fn release_hold(
        &self,
        hold_id: TransactionId,
        reason: &str,
        staff_id: Option<i64>,
    ) -> LedgerResult<HoldOutcome> {
        let hold = self.pending_hold(hold_id).await?;
        let wallet = self.store.wallet(hold.wallet_id).await?;

        if wallet.hold_balance < hold.amount {
            return Err(LedgerError::InsufficientHoldBalance {
                held: wallet.hold_balance,
                required: hold.amount,
            });
        }

        let leg = WalletLeg {
            wallet_id: wallet.id,
            balance_delta: hold.amount,
            hold_delta: -hold.amount,
            settle_hold: Some(HoldSettlement {
                hold_id,
                status: EntryStatus::Reversed,
                category: Category::WithdrawalHold,
                metadata: hold.metadata.clone(),
            }),
            entry: Some(NewEntry {
                amount: hold.amount,
                entry_type: EntryType::Credit,
                status: EntryStatus::Completed,
                category: Category::WithdrawalRelease,
                reference: Some(format!("release:{hold_id}")),
                metadata: EntryMetadata::HoldRelease(HoldReleaseMetadata {
                    hold_id,
                    reason: reason.to_string(),
                    staff_id,
                }),
            }),
        };

        let committed = self
            .store
            .commit(Changeset::default().leg(leg))
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent release.
                LedgerError::DuplicateReference(_) => LedgerError::HoldNotFound(hold_id),
                other => other,
            })?;

        let (wallet, _) = single_leg(committed)?;
        log::info!("Released hold {} on wallet {}: {}", hold_id, wallet.id, reason);

        Ok(HoldOutcome::new(hold_id, &wallet))
    }

    /// Settle a withdrawal that staff confirmed as paid out
    ///
    /// The hold row becomes `COMPLETED`/`WITHDRAWAL` and `hold_balance` drops by
    /// its amount in the same commit. Executing an already executed hold
    /// returns the current balances without changing anything.
    ///
    /// # Errors
    ///
    /// * `LedgerError::HoldNotFound` - Hold missing, released, or owned by another account
    /// * `LedgerError::InsufficientHoldBalance` - Wallet holds less than the hold amount
    /// * `LedgerError::InsufficientBalance` - Direct debit path cannot be covered
    pub async fn execute_hold(&self, request: ExecuteHold) -> LedgerResult<HoldOutcome> {
        let Some(hold_id) = request.hold_id else {
            return self.direct_withdrawal(request).await;
        };

        let hold = self
            .store
            .transaction(hold_id)
            .await?
            .ok_or(LedgerError::HoldNotFound(hold_id))?;

        // The hold must sit on the wallet of the account the caller named.
        let owner = self.store.wallet_by_account(request.account_id).await?;
        if hold.wallet_id != owner.id {
            return Err(LedgerError::HoldNotFound(hold_id));
        }

        if is_executed(&hold) {
            let wallet = self.store.wallet(hold.wallet_id).await?;
            return Ok(HoldOutcome::new(hold_id, &wallet));
        }
        if !hold.is_pending_hold() {
            return Err(LedgerError::HoldNotFound(hold_id));
        }

        let wallet = self.store.wallet(hold.wallet_id).await?;
        if wallet.hold_balance < hold.amount {
            return Err(LedgerError::InsufficientHoldBalance {
                held: wallet.hold_balance,
                required: hold.amount,
            });
        }

        let original = match &hold.metadata {
            EntryMetadata::Hold(meta) => meta.clone(),
            _ => HoldMetadata::default(),
        };
        let leg = WalletLeg {
            wallet_id: wallet.id,
            balance_delta: Decimal::ZERO,
            hold_delta: -hold.amount,
            settle_hold: Some(HoldSettlement {
                hold_id,
                status: EntryStatus::Completed,
                category: Category::Withdrawal,
                metadata: EntryMetadata::HoldExecution(HoldExecutionMetadata {
                    request: original,
                    staff_id: request.staff_id,
                    description: request.description,
                    ticket_id: request.ticket_id,
                    completed_at: Utc::now(),
                }),
            }),
            entry: None,
        };

        match self.store.commit(Changeset::default().leg(leg)).await {
            Ok(committed) => {
                let (wallet, _) = single_leg(committed)?;
                log::info!(
                    "Executed hold {} on wallet {} by staff {}",
                    hold_id,
                    wallet.id,
                    request.staff_id
                );
                Ok(HoldOutcome::new(hold_id, &wallet))
            }
            Err(LedgerError::HoldNotFound(_)) => {
                // A concurrent execution of the same hold wins; echo its result.
                match self.store.transaction(hold_id).await? {
                    Some(settled) if is_executed(&settled) => {
                        let wallet = self.store.wallet(settled.wallet_id).await?;
                        Ok(HoldOutcome::new(hold_id, &wallet))
                    }
                    _ => Err(LedgerError::HoldNotFound(hold_id)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Pending holds of an account
    pub async fn pending_holds(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let wallet = self.store.wallet_by_account(account_id).await?;
        self.store.pending_holds(wallet.id).await
    }

    async fn pending_hold(&self, hold_id: TransactionId) -> LedgerResult<LedgerTransaction> {
        self.store
            .transaction(hold_id)
            .await?
            .filter(LedgerTransaction::is_pending_hold)
            .ok_or(LedgerError::HoldNotFound(hold_id))
    }

    async fn direct_withdrawal(&self, request: ExecuteHold) -> LedgerResult<HoldOutcome> {
        ensure_positive(request.amount)?;
        let wallet = self.store.wallet_by_account(request.account_id).await?;
        let reference = request.idempotency_key.map(|key| format!("staff:{key}"));

        if let Some(reference) = &reference {
            if let Some(existing) = self.store.find_by_reference(reference).await? {
                let wallet = self.store.wallet(existing.wallet_id).await?;
                return Ok(HoldOutcome::new(existing.id, &wallet));
            }
        }

        let entry = NewEntry {
            amount: request.amount,
            entry_type: EntryType::Debit,
            status: EntryStatus::Completed,
            category: Category::Withdrawal,
            reference,
            metadata: EntryMetadata::Staff(StaffMetadata {
                staff_id: request.staff_id,
                ticket_id: request.ticket_id,
                description: request.description,
            }),
        };

        let committed = self
            .store
            .commit(Changeset::default().leg(WalletLeg::entry(wallet.id, entry)))
            .await?;
        let (wallet, entry) = single_leg(committed)?;
        let entry = entry.ok_or_else(|| LedgerError::Decode("withdrawal row missing".to_string()))?;
        log::info!(
            "Direct withdrawal {} of {} on wallet {} by staff {}",
            entry.id,
            entry.amount,
            wallet.id,
            request.staff_id
        );

        Ok(HoldOutcome::new(entry.id, &wallet))
    }
}

fn is_executed(tx: &LedgerTransaction) -> bool {
    tx.status == EntryStatus::Completed
        && tx.category == Category::Withdrawal
        && matches!(tx.metadata, EntryMetadata::HoldExecution(_))
}

fn single_leg(
    committed: crate::ledger::Committed,
) -> LedgerResult<(Wallet, Option<LedgerTransaction>)> {
    committed
        .legs
        .into_iter()
        .next()
        .map(|leg| (leg.wallet, leg.entry))
        .ok_or_else(|| LedgerError::Decode("commit returned no legs".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ApplyRequest, LedgerManager, MemoryLedgerStore};

    async fn setup(balance: i64) -> (HoldManager, Arc<dyn LedgerStore>, Wallet) {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let ledger = LedgerManager::new(Arc::clone(&store));
        let wallet = ledger.create_wallet(7, "INR").await.unwrap();
        ledger
            .apply_transaction(ApplyRequest::credit(
                wallet.id,
                Decimal::from(balance),
                Category::Deposit,
            ))
            .await
            .unwrap();
        (HoldManager::new(Arc::clone(&store)), store, wallet)
    }

    #[tokio::test]
    async fn test_create_hold_moves_funds() {
        let (holds, store, wallet) = setup(200).await;

        let outcome = holds
            .create_hold(7, Decimal::from(150), None, HoldMetadata::default())
            .await
            .unwrap();

        assert_eq!(outcome.balance, Decimal::from(50));
        assert_eq!(outcome.hold_balance, Decimal::from(150));
        let hold = store.transaction(outcome.hold_id).await.unwrap().unwrap();
        assert!(hold.is_pending_hold());
        assert_eq!(hold.resulting_balance, Decimal::from(50));
        assert_eq!(store.pending_holds(wallet.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_hold_insufficient() {
        let (holds, _, _) = setup(100).await;
        let err = holds
            .create_hold(7, Decimal::from(101), None, HoldMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAvailableBalance { .. }));
    }

    #[tokio::test]
    async fn test_create_hold_replay_by_reference() {
        let (holds, _, _) = setup(100).await;
        let first = holds
            .create_hold(7, Decimal::from(40), Some("wr-1".into()), HoldMetadata::default())
            .await
            .unwrap();
        let second = holds
            .create_hold(7, Decimal::from(40), Some("wr-1".into()), HoldMetadata::default())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_release_round_trip() {
        let (holds, store, wallet) = setup(200).await;
        let hold = holds
            .create_hold(7, Decimal::from(100), None, HoldMetadata::default())
            .await
            .unwrap();

        let released = holds.release_hold(hold.hold_id, "rejected", Some(3)).await.unwrap();

        assert_eq!(released.balance, Decimal::from(200));
        assert_eq!(released.hold_balance, Decimal::ZERO);
        let row = store.transaction(hold.hold_id).await.unwrap().unwrap();
        assert_eq!(row.status, EntryStatus::Reversed);
        assert_eq!(row.category, Category::WithdrawalHold);
        assert!(store.pending_holds(wallet.id).await.unwrap().is_empty());

        let again = holds.release_hold(hold.hold_id, "rejected", None).await;
        assert!(matches!(again, Err(LedgerError::HoldNotFound(_))));
    }

    #[tokio::test]
    async fn test_execute_hold_settles_in_place() {
        let (holds, store, _) = setup(200).await;
        let hold = holds
            .create_hold(7, Decimal::from(80), None, HoldMetadata::default())
            .await
            .unwrap();

        let request = ExecuteHold {
            hold_id: Some(hold.hold_id),
            account_id: 7,
            amount: Decimal::ZERO,
            staff_id: 11,
            description: Some("bank transfer".into()),
            ticket_id: Some(5),
            idempotency_key: None,
        };
        let executed = holds.execute_hold(request.clone()).await.unwrap();
        assert_eq!(executed.balance, Decimal::from(120));
        assert_eq!(executed.hold_balance, Decimal::ZERO);

        let row = store.transaction(hold.hold_id).await.unwrap().unwrap();
        assert_eq!(row.status, EntryStatus::Completed);
        assert_eq!(row.category, Category::Withdrawal);

        let replay = holds.execute_hold(request).await.unwrap();
        assert_eq!(replay, executed);

        let release = holds.release_hold(hold.hold_id, "late", None).await;
        assert!(matches!(release, Err(LedgerError::HoldNotFound(_))));
    }

    #[tokio::test]
    async fn test_execute_released_hold_rejected() {
        let (holds, _, _) = setup(50).await;
        let hold = holds
            .create_hold(7, Decimal::from(50), None, HoldMetadata::default())
            .await
            .unwrap();
        holds.release_hold(hold.hold_id, "cancelled", None).await.unwrap();

        let err = holds
            .execute_hold(ExecuteHold {
                hold_id: Some(hold.hold_id),
                account_id: 7,
                amount: Decimal::ZERO,
                staff_id: 1,
                description: None,
                ticket_id: None,
                idempotency_key: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::HoldNotFound(_)));
    }

    #[tokio::test]
    async fn test_direct_withdrawal_is_idempotent_by_key() {
        let (holds, _, _) = setup(100).await;
        let request = ExecuteHold {
            hold_id: None,
            account_id: 7,
            amount: Decimal::from(30),
            staff_id: 2,
            description: None,
            ticket_id: None,
            idempotency_key: Some("w-9".into()),
        };

        let first = holds.execute_hold(request.clone()).await.unwrap();
        let second = holds.execute_hold(request).await.unwrap();
        assert_eq!(first.balance, Decimal::from(70));
        assert_eq!(second, first);
    }
}
