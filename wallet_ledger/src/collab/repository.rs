//! Collaborator traits and their PostgreSQL implementations.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use super::models::{
    AccountRef, AccountRole, ConversationEntry, Ticket, TicketKind, TicketPatch, TicketResolution,
};
use crate::ledger::{AccountId, LedgerError, LedgerResult};

/// Account lookup
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolve a provider-facing player id
    async fn resolve_by_external_player_id(&self, external_player_id: &str)
    -> LedgerResult<AccountRef>;

    /// Get account by ID
    async fn account(&self, account_id: AccountId) -> LedgerResult<AccountRef>;

    /// Register an account, or return the existing one for this player id
    async fn register(
        &self,
        external_player_id: &str,
        role: AccountRole,
    ) -> LedgerResult<AccountRef>;
}

/// Support ticket workflow
#[async_trait]
pub trait TicketService: Send + Sync {
    /// Open a ticket for an account
    async fn open_ticket(&self, account_id: AccountId, kind: TicketKind) -> LedgerResult<Ticket>;

    /// Get ticket by ID
    async fn get_ticket(&self, ticket_id: i64) -> LedgerResult<Ticket>;

    /// Apply a partial update
    async fn update_ticket(&self, ticket_id: i64, patch: TicketPatch) -> LedgerResult<Ticket>;

    /// Append a conversation line
    async fn append_conversation(&self, ticket_id: i64, entry: ConversationEntry)
    -> LedgerResult<()>;
}

/// PostgreSQL implementation of `AccountDirectory`
pub struct PgAccountDirectory {
    pool: Arc<PgPool>,
}

impl PgAccountDirectory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &PgRow) -> LedgerResult<AccountRef> {
    Ok(AccountRef {
        id: row.try_get("id")?,
        external_player_id: row.try_get("external_player_id")?,
        role: row.try_get::<String, _>("role")?.parse()?,
    })
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn resolve_by_external_player_id(
        &self,
        external_player_id: &str,
    ) -> LedgerResult<AccountRef> {
        let row = sqlx::query(
            "SELECT id, external_player_id, role FROM accounts WHERE external_player_id = $1",
        )
        .bind(external_player_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(external_player_id.to_string()))?;

        account_from_row(&row)
    }

    async fn account(&self, account_id: AccountId) -> LedgerResult<AccountRef> {
        let row = sqlx::query("SELECT id, external_player_id, role FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        account_from_row(&row)
    }

    async fn register(
        &self,
        external_player_id: &str,
        role: AccountRole,
    ) -> LedgerResult<AccountRef> {
        sqlx::query(
            "INSERT INTO accounts (external_player_id, role) VALUES ($1, $2)
             ON CONFLICT (external_player_id) DO NOTHING",
        )
        .bind(external_player_id)
        .bind(role.as_str())
        .execute(self.pool.as_ref())
        .await?;

        self.resolve_by_external_player_id(external_player_id).await
    }
}

/// PostgreSQL implementation of `TicketService`
pub struct PgTicketService {
    pool: Arc<PgPool>,
}

impl PgTicketService {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

const TICKET_COLUMNS: &str = "id, account_id, kind, status, resolution, created_at, updated_at";

fn ticket_from_row(row: &PgRow) -> LedgerResult<Ticket> {
    Ok(Ticket {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        resolution: row
            .try_get::<Option<Json<TicketResolution>>, _>("resolution")?
            .map(|json| json.0),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TicketService for PgTicketService {
    async fn open_ticket(&self, account_id: AccountId, kind: TicketKind) -> LedgerResult<Ticket> {
        let row = sqlx::query(&format!(
            "INSERT INTO tickets (account_id, kind) VALUES ($1, $2) RETURNING {TICKET_COLUMNS}"
        ))
        .bind(account_id)
        .bind(kind.as_str())
        .fetch_one(self.pool.as_ref())
        .await?;

        ticket_from_row(&row)
    }

    async fn get_ticket(&self, ticket_id: i64) -> LedgerResult<Ticket> {
        let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"))
            .bind(ticket_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(LedgerError::TicketNotFound(ticket_id))?;

        ticket_from_row(&row)
    }

    async fn update_ticket(&self, ticket_id: i64, patch: TicketPatch) -> LedgerResult<Ticket> {
        let row = sqlx::query(&format!(
            "UPDATE tickets
             SET status = COALESCE($1, status),
                 resolution = COALESCE($2, resolution),
                 updated_at = NOW()
             WHERE id = $3
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.resolution.map(Json))
        .bind(ticket_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(LedgerError::TicketNotFound(ticket_id))?;

        ticket_from_row(&row)
    }

    async fn append_conversation(
        &self,
        ticket_id: i64,
        entry: ConversationEntry,
    ) -> LedgerResult<()> {
        sqlx::query(
            "INSERT INTO ticket_conversations (ticket_id, author_id, message) VALUES ($1, $2, $3)",
        )
        .bind(ticket_id)
        .bind(entry.author_id)
        .bind(&entry.message)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| {
            let missing_ticket =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if missing_ticket {
                LedgerError::TicketNotFound(ticket_id)
            } else {
                LedgerError::Database(e)
            }
        })?;
        Ok(())
    }
}
