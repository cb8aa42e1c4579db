//! In-process collaborator implementations.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::{
    AccountRef, AccountRole, ConversationEntry, Ticket, TicketKind, TicketPatch, TicketStatus,
};
use super::repository::{AccountDirectory, TicketService};
use crate::ledger::{AccountId, LedgerError, LedgerResult};

/// Memory-backed `AccountDirectory`
#[derive(Default)]
pub struct MemoryAccountDirectory {
    accounts: RwLock<HashMap<AccountId, AccountRef>>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: AccountRef) -> Self {
        self.accounts.get_mut().insert(account.id, account);
        self
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn resolve_by_external_player_id(
        &self,
        external_player_id: &str,
    ) -> LedgerResult<AccountRef> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| a.external_player_id == external_player_id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(external_player_id.to_string()))
    }

    async fn account(&self, account_id: AccountId) -> LedgerResult<AccountRef> {
        self.accounts
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    async fn register(
        &self,
        external_player_id: &str,
        role: AccountRole,
    ) -> LedgerResult<AccountRef> {
        let mut accounts = self.accounts.write().await;
        if let Some(existing) = accounts
            .values()
            .find(|a| a.external_player_id == external_player_id)
        {
            return Ok(existing.clone());
        }

        let id = accounts.keys().max().copied().unwrap_or(0) + 1;
        let account = AccountRef {
            id,
            external_player_id: external_player_id.to_string(),
            role,
        };
        accounts.insert(id, account.clone());
        Ok(account)
    }
}

#[derive(Default)]
struct TicketState {
    tickets: HashMap<i64, Ticket>,
    conversations: HashMap<i64, Vec<ConversationEntry>>,
    next_id: i64,
}

/// Memory-backed `TicketService`
#[derive(Default)]
pub struct MemoryTicketService {
    state: RwLock<TicketState>,
}

impl MemoryTicketService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket(mut self, ticket: Ticket) -> Self {
        let state = self.state.get_mut();
        state.next_id = state.next_id.max(ticket.id);
        state.tickets.insert(ticket.id, ticket);
        self
    }

    /// Conversation lines of a ticket, oldest first
    pub async fn conversation(&self, ticket_id: i64) -> Vec<ConversationEntry> {
        self.state
            .read()
            .await
            .conversations
            .get(&ticket_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TicketService for MemoryTicketService {
    async fn open_ticket(&self, account_id: AccountId, kind: TicketKind) -> LedgerResult<Ticket> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let now = Utc::now();
        let ticket = Ticket {
            id: state.next_id,
            account_id,
            kind,
            status: TicketStatus::Open,
            resolution: None,
            created_at: now,
            updated_at: now,
        };
        state.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: i64) -> LedgerResult<Ticket> {
        self.state
            .read()
            .await
            .tickets
            .get(&ticket_id)
            .cloned()
            .ok_or(LedgerError::TicketNotFound(ticket_id))
    }

    async fn update_ticket(&self, ticket_id: i64, patch: TicketPatch) -> LedgerResult<Ticket> {
        let mut state = self.state.write().await;
        let ticket = state
            .tickets
            .get_mut(&ticket_id)
            .ok_or(LedgerError::TicketNotFound(ticket_id))?;

        if let Some(status) = patch.status {
            ticket.status = status;
        }
        if let Some(resolution) = patch.resolution {
            ticket.resolution = Some(resolution);
        }
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    async fn append_conversation(
        &self,
        ticket_id: i64,
        entry: ConversationEntry,
    ) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        if !state.tickets.contains_key(&ticket_id) {
            return Err(LedgerError::TicketNotFound(ticket_id));
        }
        state.conversations.entry(ticket_id).or_default().push(entry);
        Ok(())
    }
}
