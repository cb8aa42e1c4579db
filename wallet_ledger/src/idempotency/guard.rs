//! Replay detection for external wallet events.
//!
//! Resolution order:
//! 1. exact replay, a completed row already carries the event's reference
//! 2. semantic replay, a completed row carries the same provider action key
//!    and must match the inbound parameters
//! 3. fresh event
//!
//! The unique constraint on `reference` backs this up when two deliveries of
//! the same event race past step 1.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::ledger::{
    CasinoActionKey, EntryStatus, EntryType, LedgerError, LedgerResult, LedgerStore,
    LedgerTransaction, Wallet,
};

/// Subtype under which a replay may flip debit/credit
pub const CANCEL_SUBTYPE: &str = "cancel";

/// Inbound debit or credit as seen by the guard
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub reference: String,
    pub key: CasinoActionKey,
    pub external_player_id: String,
    pub currency: String,
    pub amount: Decimal,
    pub entry_type: EntryType,
}

/// How an inbound event relates to what is already recorded
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    ExactReplay(LedgerTransaction),
    SemanticReplay(LedgerTransaction),
    Fresh,
}

impl Resolution {
    pub fn is_replay(&self) -> bool {
        !matches!(self, Resolution::Fresh)
    }
}

/// Idempotency guard
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn LedgerStore>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Resolve an inbound event against the ledger
    ///
    /// # Errors
    ///
    /// * `LedgerError::ParameterMismatch` - Semantic replay with divergent parameters
    pub async fn resolve(&self, event: &InboundEvent) -> LedgerResult<Resolution> {
        if let Some(existing) = self.check_reference(&event.reference).await? {
            return Ok(Resolution::ExactReplay(existing));
        }

        match self.store.find_casino_action(&event.key).await? {
            Some(existing) => {
                verify_replay(&existing, event)?;
                Ok(Resolution::SemanticReplay(existing))
            }
            None => Ok(Resolution::Fresh),
        }
    }

    /// Completed row carrying this reference, if any
    pub async fn check_reference(
        &self,
        reference: &str,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        Ok(self
            .store
            .find_by_reference(reference)
            .await?
            .filter(|tx| tx.status == EntryStatus::Completed))
    }
}

/// Compare a stored action with its replay
pub fn verify_replay(existing: &LedgerTransaction, event: &InboundEvent) -> LedgerResult<()> {
    let Some(meta) = existing.metadata.as_casino() else {
        return Err(LedgerError::ParameterMismatch { field: "kind" });
    };

    if meta.external_player_id != event.external_player_id {
        return Err(LedgerError::ParameterMismatch {
            field: "external_player_id",
        });
    }
    if meta.currency != event.currency {
        return Err(LedgerError::ParameterMismatch { field: "currency" });
    }
    if existing.amount != event.amount {
        return Err(LedgerError::ParameterMismatch { field: "amount" });
    }
    if existing.entry_type != event.entry_type
        && event.key.subtype.as_deref() != Some(CANCEL_SUBTYPE)
    {
        return Err(LedgerError::ParameterMismatch { field: "type" });
    }
    Ok(())
}

/// Funds check for a fresh debit
pub fn ensure_funds(wallet: &Wallet, amount: Decimal) -> LedgerResult<()> {
    if wallet.balance <= Decimal::ZERO || wallet.balance < amount {
        return Err(LedgerError::InsufficientBalance {
            available: wallet.balance,
            required: amount,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        CasinoMetadata, Category, Changeset, EntryMetadata, MemoryLedgerStore, NewEntry, WalletLeg,
    };

    fn event(tid: &str, action: &str, amount: i64, entry_type: EntryType) -> InboundEvent {
        InboundEvent {
            reference: format!("tid:{tid}"),
            key: CasinoActionKey {
                game_id: "G1".into(),
                action_id: action.into(),
                subtype: None,
            },
            external_player_id: "player-1".into(),
            currency: "INR".into(),
            amount: Decimal::from(amount),
            entry_type,
        }
    }

    async fn recorded(event: &InboundEvent) -> (IdempotencyGuard, Arc<dyn LedgerStore>) {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let wallet = store.create_wallet(1, "INR").await.unwrap();
        let entry = NewEntry {
            amount: event.amount,
            entry_type: EntryType::Credit,
            status: EntryStatus::Completed,
            category: Category::CasinoWin,
            reference: Some(event.reference.clone()),
            metadata: EntryMetadata::Casino(CasinoMetadata {
                game_id: event.key.game_id.clone(),
                action_id: event.key.action_id.clone(),
                subtype: event.key.subtype.clone(),
                game_desc: None,
                external_player_id: event.external_player_id.clone(),
                currency: event.currency.clone(),
            }),
        };
        store
            .commit(Changeset::default().leg(WalletLeg::entry(wallet.id, entry)))
            .await
            .unwrap();
        (IdempotencyGuard::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_exact_replay() {
        let original = event("T1", "A1", 50, EntryType::Credit);
        let (guard, _) = recorded(&original).await;

        let resolution = guard.resolve(&original).await.unwrap();
        assert!(matches!(resolution, Resolution::ExactReplay(_)));
    }

    #[tokio::test]
    async fn test_semantic_replay_under_new_tid() {
        let original = event("T1", "A1", 50, EntryType::Credit);
        let (guard, _) = recorded(&original).await;

        let resolution = guard
            .resolve(&event("T2", "A1", 50, EntryType::Credit))
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::SemanticReplay(_)));
    }

    #[tokio::test]
    async fn test_semantic_replay_amount_mismatch() {
        let original = event("T1", "A1", 50, EntryType::Credit);
        let (guard, _) = recorded(&original).await;

        let err = guard
            .resolve(&event("T2", "A1", 51, EntryType::Credit))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ParameterMismatch { field: "amount" }));
    }

    #[tokio::test]
    async fn test_type_flip_allowed_only_for_cancel() {
        let mut original = event("T1", "A1", 50, EntryType::Credit);
        original.key.subtype = Some(CANCEL_SUBTYPE.into());
        let (guard, _) = recorded(&original).await;

        let mut flipped = event("T2", "A1", 50, EntryType::Debit);
        flipped.key.subtype = Some(CANCEL_SUBTYPE.into());
        assert!(guard.resolve(&flipped).await.unwrap().is_replay());

        let plain = event("T3", "A9", 50, EntryType::Debit);
        assert_eq!(guard.resolve(&plain).await.unwrap(), Resolution::Fresh);
    }

    #[tokio::test]
    async fn test_key_without_subtype_matches_any_subtype() {
        let mut original = event("T1", "A1", 50, EntryType::Credit);
        original.key.subtype = Some(CANCEL_SUBTYPE.into());
        let (guard, _) = recorded(&original).await;

        let plain = event("T2", "A1", 50, EntryType::Debit);
        let err = guard.resolve(&plain).await.unwrap_err();
        assert!(matches!(err, LedgerError::ParameterMismatch { field: "type" }));

        let mut other = event("T3", "A1", 50, EntryType::Credit);
        other.key.subtype = Some("bonus".into());
        assert_eq!(guard.resolve(&other).await.unwrap(), Resolution::Fresh);
    }

    #[test]
    fn test_type_mismatch_without_cancel() {
        let original = event("T1", "A1", 50, EntryType::Credit);
        let tx = LedgerTransaction {
            id: uuid::Uuid::new_v4(),
            wallet_id: uuid::Uuid::new_v4(),
            amount: original.amount,
            entry_type: EntryType::Credit,
            status: EntryStatus::Completed,
            category: Category::CasinoWin,
            reference: Some(original.reference.clone()),
            resulting_balance: Decimal::ZERO,
            metadata: EntryMetadata::Casino(CasinoMetadata {
                game_id: "G1".into(),
                action_id: "A1".into(),
                subtype: None,
                game_desc: None,
                external_player_id: "player-1".into(),
                currency: "INR".into(),
            }),
            created_at: chrono::Utc::now(),
            completed_at: None,
        };

        let replay = event("T2", "A1", 50, EntryType::Debit);
        assert!(matches!(
            verify_replay(&tx, &replay),
            Err(LedgerError::ParameterMismatch { field: "type" })
        ));
    }

    #[test]
    fn test_ensure_funds_rejects_zero_balance() {
        let wallet = Wallet {
            id: uuid::Uuid::new_v4(),
            account_id: 1,
            balance: Decimal::ZERO,
            hold_balance: Decimal::ZERO,
            currency: "INR".into(),
            version: 0,
            last_transaction_at: None,
            created_at: chrono::Utc::now(),
        };
        assert!(ensure_funds(&wallet, Decimal::ZERO).is_err());
    }
}
