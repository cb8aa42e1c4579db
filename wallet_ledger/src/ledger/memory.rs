//! In-process ledger backend.
//!
//! A single async mutex serializes commits, so every changeset is atomic with
//! respect to every other one. Used by tests and by the server's memory mode.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::errors::{LedgerError, LedgerResult};
use super::models::{
    AccountId, AuditRecord, CasinoRound, EntryStatus, LedgerTransaction, TransactionId, Wallet,
    WalletId,
};
use super::store::{
    BetOrderWrite, CasinoActionKey, Changeset, Committed, CommittedLeg, HoldSettlement,
    LedgerStore,
};
use crate::bets::{BetLookup, BetOrder};

#[derive(Default)]
struct State {
    wallets: HashMap<WalletId, Wallet>,
    by_account: HashMap<AccountId, WalletId>,
    entries: Vec<LedgerTransaction>,
    entry_index: HashMap<TransactionId, usize>,
    by_reference: HashMap<String, usize>,
    bets: Vec<BetOrder>,
    rounds: HashMap<(String, String), CasinoRound>,
    audit: Vec<AuditRecord>,
}

impl State {
    fn bet_position(&self, bet_id: &str, betslip_id: &str) -> Option<usize> {
        self.bets
            .iter()
            .position(|b| b.bet_id == bet_id && b.betslip_id == betslip_id)
    }
}

/// Memory-backed implementation of [`LedgerStore`]
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_wallet(&self, account_id: AccountId, currency: &str) -> LedgerResult<Wallet> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.by_account.get(&account_id) {
            return Ok(state.wallets[id].clone());
        }

        let wallet = Wallet {
            id: Uuid::new_v4(),
            account_id,
            balance: Decimal::ZERO,
            hold_balance: Decimal::ZERO,
            currency: currency.to_string(),
            version: 0,
            last_transaction_at: None,
            created_at: Utc::now(),
        };
        state.by_account.insert(account_id, wallet.id);
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn wallet(&self, wallet_id: WalletId) -> LedgerResult<Wallet> {
        let state = self.state.lock().await;
        state
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))
    }

    async fn wallet_by_account(&self, account_id: AccountId) -> LedgerResult<Wallet> {
        let state = self.state.lock().await;
        state
            .by_account
            .get(&account_id)
            .and_then(|id| state.wallets.get(id))
            .cloned()
            .ok_or_else(|| LedgerError::WalletNotFound(format!("account {account_id}")))
    }

    async fn commit(&self, changeset: Changeset) -> LedgerResult<Committed> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        // Stage everything first; nothing is written until all checks pass.
        let mut staged: HashMap<WalletId, Wallet> = HashMap::new();
        let mut settlements: Vec<(usize, HoldSettlement)> = Vec::new();
        let mut references: HashSet<String> = HashSet::new();
        let mut legs = Vec::with_capacity(changeset.legs.len());

        for leg in changeset.legs {
            let mut wallet = match staged.get(&leg.wallet_id) {
                Some(wallet) => wallet.clone(),
                None => state
                    .wallets
                    .get(&leg.wallet_id)
                    .cloned()
                    .ok_or_else(|| LedgerError::WalletNotFound(leg.wallet_id.to_string()))?,
            };

            if let Some(settle) = leg.settle_hold {
                let index = state
                    .entry_index
                    .get(&settle.hold_id)
                    .copied()
                    .filter(|&i| {
                        let hold = &state.entries[i];
                        hold.wallet_id == leg.wallet_id && hold.is_pending_hold()
                    })
                    .filter(|&i| settlements.iter().all(|(j, _)| *j != i))
                    .ok_or(LedgerError::HoldNotFound(settle.hold_id))?;
                settlements.push((index, settle));
            }

            let balance = wallet.balance + leg.balance_delta;
            if balance < Decimal::ZERO {
                return Err(LedgerError::InsufficientBalance {
                    available: wallet.balance,
                    required: -leg.balance_delta,
                });
            }
            let hold_balance = wallet.hold_balance + leg.hold_delta;
            if hold_balance < Decimal::ZERO {
                return Err(LedgerError::InsufficientHoldBalance {
                    held: wallet.hold_balance,
                    required: -leg.hold_delta,
                });
            }

            wallet.balance = balance;
            wallet.hold_balance = hold_balance;
            wallet.version += 1;
            wallet.last_transaction_at = Some(now);

            let entry = match leg.entry {
                Some(new) => {
                    if let Some(reference) = &new.reference {
                        if state.by_reference.contains_key(reference)
                            || !references.insert(reference.clone())
                        {
                            return Err(LedgerError::DuplicateReference(reference.clone()));
                        }
                    }
                    Some(LedgerTransaction {
                        id: Uuid::new_v4(),
                        wallet_id: wallet.id,
                        amount: new.amount,
                        entry_type: new.entry_type,
                        status: new.status,
                        category: new.category,
                        reference: new.reference,
                        resulting_balance: balance,
                        metadata: new.metadata,
                        created_at: now,
                        completed_at: (new.status == EntryStatus::Completed).then_some(now),
                    })
                }
                None => None,
            };

            staged.insert(wallet.id, wallet.clone());
            legs.push(CommittedLeg { wallet, entry });
        }

        let mut inserted: Vec<(String, String)> = Vec::new();
        for write in &changeset.bets {
            match write {
                BetOrderWrite::Insert(bet) => {
                    let key = (bet.bet_id.clone(), bet.betslip_id.clone());
                    if state.bet_position(&bet.bet_id, &bet.betslip_id).is_some()
                        || inserted.contains(&key)
                    {
                        return Err(LedgerError::DuplicateBetOrder(format!(
                            "{}/{}",
                            bet.bet_id, bet.betslip_id
                        )));
                    }
                    inserted.push(key);
                }
                BetOrderWrite::Update(bet) => {
                    if !state.bets.iter().any(|b| b.id == bet.id) {
                        return Err(LedgerError::BetOrderNotFound(bet.id.to_string()));
                    }
                }
            }
        }

        // Apply
        for (index, settle) in settlements {
            let hold = &mut state.entries[index];
            hold.status = settle.status;
            hold.category = settle.category;
            hold.metadata = settle.metadata;
            if settle.status == EntryStatus::Completed {
                hold.completed_at = Some(now);
            }
        }
        for (id, wallet) in staged {
            state.wallets.insert(id, wallet);
        }
        for leg in &legs {
            if let Some(entry) = &leg.entry {
                let index = state.entries.len();
                state.entry_index.insert(entry.id, index);
                if let Some(reference) = &entry.reference {
                    state.by_reference.insert(reference.clone(), index);
                }
                state.entries.push(entry.clone());
            }
        }
        for write in changeset.bets {
            match write {
                BetOrderWrite::Insert(bet) => state.bets.push(bet),
                BetOrderWrite::Update(bet) => {
                    if let Some(slot) = state.bets.iter_mut().find(|b| b.id == bet.id) {
                        *slot = bet;
                    }
                }
            }
        }
        state.audit.extend(changeset.audit);

        Ok(Committed { legs })
    }

    async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<LedgerTransaction>> {
        let state = self.state.lock().await;
        Ok(state.entry_index.get(&id).map(|&i| state.entries[i].clone()))
    }

    async fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<LedgerTransaction>> {
        let state = self.state.lock().await;
        Ok(state
            .by_reference
            .get(reference)
            .map(|&i| state.entries[i].clone()))
    }

    async fn find_casino_action(
        &self,
        key: &CasinoActionKey,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .find(|e| {
                e.metadata.as_casino().is_some_and(|meta| {
                    meta.game_id == key.game_id
                        && meta.action_id == key.action_id
                        && key
                            .subtype
                            .as_ref()
                            .is_none_or(|subtype| meta.subtype.as_ref() == Some(subtype))
                })
            })
            .cloned())
    }

    async fn history(
        &self,
        wallet_id: WalletId,
        limit: i64,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.wallet_id == wallet_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn pending_holds(&self, wallet_id: WalletId) -> LedgerResult<Vec<LedgerTransaction>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id && e.is_pending_hold())
            .cloned()
            .collect())
    }

    async fn bet_order(&self, lookup: &BetLookup) -> LedgerResult<Option<BetOrder>> {
        let state = self.state.lock().await;
        Ok(state.bets.iter().find(|b| lookup.matches(b)).cloned())
    }

    async fn upsert_round(&self, round: &CasinoRound) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        state.rounds.insert(
            (round.game_id.clone(), round.user_id.clone()),
            round.clone(),
        );
        Ok(())
    }

    async fn round(&self, game_id: &str, user_id: &str) -> LedgerResult<Option<CasinoRound>> {
        let state = self.state.lock().await;
        Ok(state
            .rounds
            .get(&(game_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn audit_trail(&self, subject_id: Uuid) -> LedgerResult<Vec<AuditRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> LedgerResult<()> {
        Ok(())
    }
}
