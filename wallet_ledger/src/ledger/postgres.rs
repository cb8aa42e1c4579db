//! PostgreSQL ledger backend.
//!
//! Each changeset runs in one database transaction. Wallet rows are locked in
//! ascending id order before any write, balance updates are conditional on the
//! result staying non-negative, and `reference` carries a unique constraint so
//! that two concurrent deliveries of the same event cannot both commit.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::{LedgerError, LedgerResult};
use super::models::{
    AccountId, AuditEvent, AuditRecord, CasinoRound, EntryMetadata, EntryStatus,
    LedgerTransaction, TransactionId, Wallet, WalletId,
};
use super::store::{
    BetOrderWrite, CasinoActionKey, Changeset, Committed, CommittedLeg, LedgerStore, NewEntry,
};
use crate::bets::{BetLookup, BetMetadata, BetOrder, Selection};
use crate::db::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout};

const WALLET_COLUMNS: &str = "id, account_id, balance, hold_balance, currency, version, last_transaction_at, created_at";

const TRANSACTION_COLUMNS: &str = "id, wallet_id, amount, entry_type, status, category, reference, resulting_balance, metadata, created_at, completed_at";

const BET_COLUMNS: &str = "id, account_id, external_player_id, betslip_id, bet_id, order_type, bet_type, status, amount, potential_win, odds, selections, settled_at, finalized_at, rollback_at, metadata, created_at, updated_at";

/// PostgreSQL implementation of [`LedgerStore`]
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
}

impl PgLedgerStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn commit_in_transaction(&self, changeset: Changeset) -> LedgerResult<Committed> {
        let mut tx = self.pool.begin().await?;

        // Lock every touched wallet in a stable order to avoid deadlocks
        // between concurrent multi-leg changesets.
        let mut wallet_ids: Vec<WalletId> = changeset.legs.iter().map(|l| l.wallet_id).collect();
        wallet_ids.sort();
        wallet_ids.dedup();

        let mut current: HashMap<WalletId, Wallet> = HashMap::new();
        for wallet_id in wallet_ids {
            let row = sqlx::query(&format!(
                "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1 FOR UPDATE"
            ))
            .bind(wallet_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;
            current.insert(wallet_id, wallet_from_row(&row)?);
        }

        let mut legs = Vec::with_capacity(changeset.legs.len());
        for leg in changeset.legs {
            if let Some(settle) = &leg.settle_hold {
                let completed = settle.status == EntryStatus::Completed;
                let result = sqlx::query(
                    r#"
                    UPDATE ledger_transactions
                    SET status = $1, category = $2, metadata = $3,
                        completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END
                    WHERE id = $5 AND wallet_id = $6
                      AND status = 'PENDING' AND category = 'WITHDRAWAL_HOLD'
                    "#,
                )
                .bind(settle.status.as_str())
                .bind(settle.category.as_str())
                .bind(Json(&settle.metadata))
                .bind(completed)
                .bind(settle.hold_id)
                .bind(leg.wallet_id)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(LedgerError::HoldNotFound(settle.hold_id));
                }
            }

            // Conditional update: the non-negative invariant is enforced by the
            // store itself, not by an earlier read.
            let updated = sqlx::query(&format!(
                "UPDATE wallets
                 SET balance = balance + $1,
                     hold_balance = hold_balance + $2,
                     version = version + 1,
                     last_transaction_at = NOW(),
                     updated_at = NOW()
                 WHERE id = $3 AND balance + $1 >= 0 AND hold_balance + $2 >= 0
                 RETURNING {WALLET_COLUMNS}"
            ))
            .bind(leg.balance_delta)
            .bind(leg.hold_delta)
            .bind(leg.wallet_id)
            .fetch_optional(&mut *tx)
            .await?;

            let wallet = match updated {
                Some(row) => wallet_from_row(&row)?,
                None => {
                    let before = current
                        .get(&leg.wallet_id)
                        .ok_or_else(|| LedgerError::WalletNotFound(leg.wallet_id.to_string()))?;
                    return Err(if before.balance + leg.balance_delta < Decimal::ZERO {
                        LedgerError::InsufficientBalance {
                            available: before.balance,
                            required: -leg.balance_delta,
                        }
                    } else {
                        LedgerError::InsufficientHoldBalance {
                            held: before.hold_balance,
                            required: -leg.hold_delta,
                        }
                    });
                }
            };
            current.insert(wallet.id, wallet.clone());

            let entry = match leg.entry {
                Some(new) => Some(insert_entry(&mut tx, &wallet, new).await?),
                None => None,
            };
            legs.push(CommittedLeg { wallet, entry });
        }

        for write in changeset.bets {
            match write {
                BetOrderWrite::Insert(bet) => insert_bet(&mut tx, &bet).await?,
                BetOrderWrite::Update(bet) => update_bet(&mut tx, &bet).await?,
            }
        }

        for record in changeset.audit {
            sqlx::query(
                "INSERT INTO audit_log (id, subject_id, event, recorded_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(record.id)
            .bind(record.subject_id)
            .bind(Json(&record.event))
            .bind(record.recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Committed { legs })
    }
}

/// Map a unique violation to a domain error, keep everything else as a database error
fn on_unique_violation(err: sqlx::Error, conflict: impl FnOnce() -> LedgerError) -> LedgerError {
    let is_unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if is_unique {
        conflict()
    } else {
        LedgerError::Database(err)
    }
}

async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &Wallet,
    new: NewEntry,
) -> LedgerResult<LedgerTransaction> {
    let reference = new.reference.clone();
    let row = sqlx::query(&format!(
        "INSERT INTO ledger_transactions
            (id, wallet_id, amount, entry_type, status, category, reference, resulting_balance, metadata, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, CASE WHEN $5 = 'COMPLETED' THEN NOW() ELSE NULL END)
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(wallet.id)
    .bind(new.amount)
    .bind(new.entry_type.as_str())
    .bind(new.status.as_str())
    .bind(new.category.as_str())
    .bind(&new.reference)
    .bind(wallet.balance)
    .bind(Json(&new.metadata))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        on_unique_violation(e, || {
            LedgerError::DuplicateReference(reference.unwrap_or_default())
        })
    })?;

    transaction_from_row(&row)
}

async fn insert_bet(tx: &mut Transaction<'_, Postgres>, bet: &BetOrder) -> LedgerResult<()> {
    sqlx::query(&format!(
        "INSERT INTO bet_orders ({BET_COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
    ))
    .bind(bet.id)
    .bind(bet.account_id)
    .bind(&bet.external_player_id)
    .bind(&bet.betslip_id)
    .bind(&bet.bet_id)
    .bind(bet.order_type.as_str())
    .bind(bet.bet_type.map(|side| side.as_str()))
    .bind(bet.status.as_str())
    .bind(bet.amount)
    .bind(bet.potential_win)
    .bind(bet.odds)
    .bind(Json(&bet.selections))
    .bind(bet.settled_at)
    .bind(bet.finalized_at)
    .bind(bet.rollback_at)
    .bind(Json(&bet.metadata))
    .bind(bet.created_at)
    .bind(bet.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        on_unique_violation(e, || {
            LedgerError::DuplicateBetOrder(format!("{}/{}", bet.bet_id, bet.betslip_id))
        })
    })?;
    Ok(())
}

async fn update_bet(tx: &mut Transaction<'_, Postgres>, bet: &BetOrder) -> LedgerResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE bet_orders
        SET status = $1, settled_at = $2, finalized_at = $3, rollback_at = $4,
            metadata = $5, updated_at = $6
        WHERE id = $7
        "#,
    )
    .bind(bet.status.as_str())
    .bind(bet.settled_at)
    .bind(bet.finalized_at)
    .bind(bet.rollback_at)
    .bind(Json(&bet.metadata))
    .bind(bet.updated_at)
    .bind(bet.id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::BetOrderNotFound(bet.id.to_string()));
    }
    Ok(())
}

fn wallet_from_row(row: &PgRow) -> LedgerResult<Wallet> {
    Ok(Wallet {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        balance: row.try_get("balance")?,
        hold_balance: row.try_get("hold_balance")?,
        currency: row.try_get("currency")?,
        version: row.try_get("version")?,
        last_transaction_at: row.try_get("last_transaction_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> LedgerResult<LedgerTransaction> {
    Ok(LedgerTransaction {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        amount: row.try_get("amount")?,
        entry_type: row.try_get::<String, _>("entry_type")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        category: row.try_get::<String, _>("category")?.parse()?,
        reference: row.try_get("reference")?,
        resulting_balance: row.try_get("resulting_balance")?,
        metadata: row.try_get::<Json<EntryMetadata>, _>("metadata")?.0,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn bet_from_row(row: &PgRow) -> LedgerResult<BetOrder> {
    let bet_type: Option<String> = row.try_get("bet_type")?;
    Ok(BetOrder {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        external_player_id: row.try_get("external_player_id")?,
        betslip_id: row.try_get("betslip_id")?,
        bet_id: row.try_get("bet_id")?,
        order_type: row.try_get::<String, _>("order_type")?.parse()?,
        bet_type: bet_type.map(|s| s.parse()).transpose()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        amount: row.try_get("amount")?,
        potential_win: row.try_get("potential_win")?,
        odds: row.try_get("odds")?,
        selections: row.try_get::<Json<Vec<Selection>>, _>("selections")?.0,
        settled_at: row.try_get("settled_at")?,
        finalized_at: row.try_get("finalized_at")?,
        rollback_at: row.try_get("rollback_at")?,
        metadata: row.try_get::<Json<BetMetadata>, _>("metadata")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_wallet(&self, account_id: AccountId, currency: &str) -> LedgerResult<Wallet> {
        with_default_timeout(
            sqlx::query(
                "INSERT INTO wallets (id, account_id, currency) VALUES ($1, $2, $3)
                 ON CONFLICT (account_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(account_id)
            .bind(currency)
            .execute(self.pool.as_ref()),
        )
        .await?;

        self.wallet_by_account(account_id).await
    }

    async fn wallet(&self, wallet_id: WalletId) -> LedgerResult<Wallet> {
        let row = with_default_timeout(
            sqlx::query(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1"))
                .bind(wallet_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or_else(|| LedgerError::WalletNotFound(wallet_id.to_string()))?;

        wallet_from_row(&row)
    }

    async fn wallet_by_account(&self, account_id: AccountId) -> LedgerResult<Wallet> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {WALLET_COLUMNS} FROM wallets WHERE account_id = $1"
            ))
            .bind(account_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or_else(|| LedgerError::WalletNotFound(format!("account {account_id}")))?;

        wallet_from_row(&row)
    }

    async fn commit(&self, changeset: Changeset) -> LedgerResult<Committed> {
        with_timeout(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.commit_in_transaction(changeset),
        )
        .await
    }

    async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<LedgerTransaction>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM ledger_transactions WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<LedgerTransaction>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM ledger_transactions WHERE reference = $1"
            ))
            .bind(reference)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn find_casino_action(
        &self,
        key: &CasinoActionKey,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM ledger_transactions
                 WHERE metadata->>'kind' = 'casino'
                   AND metadata->>'game_id' = $1
                   AND metadata->>'action_id' = $2
                   AND ($3::text IS NULL OR metadata->>'subtype' = $3)
                   AND status = 'COMPLETED'
                 ORDER BY seq ASC
                 LIMIT 1"
            ))
            .bind(&key.game_id)
            .bind(&key.action_id)
            .bind(&key.subtype)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn history(
        &self,
        wallet_id: WalletId,
        limit: i64,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM ledger_transactions
                 WHERE wallet_id = $1
                 ORDER BY seq DESC
                 LIMIT $2"
            ))
            .bind(wallet_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn pending_holds(&self, wallet_id: WalletId) -> LedgerResult<Vec<LedgerTransaction>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM ledger_transactions
                 WHERE wallet_id = $1 AND status = 'PENDING' AND category = 'WITHDRAWAL_HOLD'
                 ORDER BY seq ASC"
            ))
            .bind(wallet_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn bet_order(&self, lookup: &BetLookup) -> LedgerResult<Option<BetOrder>> {
        let by_bet =
            format!("SELECT {BET_COLUMNS} FROM bet_orders WHERE bet_id = $1 AND betslip_id = $2");
        let by_event = format!(
            "SELECT {BET_COLUMNS} FROM bet_orders
             WHERE betslip_id = $1 AND selections @> $2
             ORDER BY created_at ASC
             LIMIT 1"
        );

        let query = match lookup {
            BetLookup::ByBet { bet_id, betslip_id } => sqlx::query(&by_bet)
                .bind(bet_id.clone())
                .bind(betslip_id.clone()),
            BetLookup::ByBetslipEvent {
                betslip_id,
                event_id,
            } => sqlx::query(&by_event)
                .bind(betslip_id.clone())
                .bind(Json(serde_json::json!([{ "event_id": event_id }]))),
        };

        let row = with_default_timeout(query.fetch_optional(self.pool.as_ref())).await?;
        row.as_ref().map(bet_from_row).transpose()
    }

    async fn upsert_round(&self, round: &CasinoRound) -> LedgerResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO casino_rounds (game_id, user_id, game_desc, actions, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (game_id, user_id)
                DO UPDATE SET game_desc = EXCLUDED.game_desc,
                              actions = EXCLUDED.actions,
                              updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&round.game_id)
            .bind(&round.user_id)
            .bind(&round.game_desc)
            .bind(Json(&round.actions))
            .bind(round.updated_at)
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    async fn round(&self, game_id: &str, user_id: &str) -> LedgerResult<Option<CasinoRound>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT game_id, user_id, game_desc, actions, updated_at
                 FROM casino_rounds WHERE game_id = $1 AND user_id = $2",
            )
            .bind(game_id)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.map(|row| {
            Ok(CasinoRound {
                game_id: row.try_get("game_id")?,
                user_id: row.try_get("user_id")?,
                game_desc: row.try_get("game_desc")?,
                actions: row.try_get::<Json<serde_json::Value>, _>("actions")?.0,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn audit_trail(&self, subject_id: Uuid) -> LedgerResult<Vec<AuditRecord>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id, subject_id, event, recorded_at FROM audit_log
                 WHERE subject_id = $1 ORDER BY seq ASC",
            )
            .bind(subject_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AuditRecord {
                    id: row.try_get("id")?,
                    subject_id: row.try_get("subject_id")?,
                    event: row.try_get::<Json<AuditEvent>, _>("event")?.0,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> LedgerResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(self.pool.as_ref())).await?;
        Ok(())
    }
}
