//! Account and ticket records shared with the surrounding platform.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ledger::{AccountId, LedgerError, TransactionId};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Customer,
    Partner,
    Staff,
    Admin,
}

impl AccountRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountRole::Customer => "customer",
            AccountRole::Partner => "partner",
            AccountRole::Staff => "staff",
            AccountRole::Admin => "admin",
        }
    }
}

impl FromStr for AccountRole {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(AccountRole::Customer),
            "partner" => Ok(AccountRole::Partner),
            "staff" => Ok(AccountRole::Staff),
            "admin" => Ok(AccountRole::Admin),
            other => Err(LedgerError::Decode(format!("account role {other}"))),
        }
    }
}

/// Resolved account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: AccountId,
    pub external_player_id: String,
    pub role: AccountRole,
}

/// Kind of support ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketKind {
    Deposit,
    Withdrawal,
}

impl TicketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketKind::Deposit => "DEPOSIT",
            TicketKind::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl FromStr for TicketKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TicketKind::Deposit),
            "WITHDRAWAL" => Ok(TicketKind::Withdrawal),
            other => Err(LedgerError::Decode(format!("ticket kind {other}"))),
        }
    }
}

/// Ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    Approved,
    Rejected,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::Approved => "APPROVED",
            TicketStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(TicketStatus::Open),
            "IN_PROGRESS" => Ok(TicketStatus::InProgress),
            "APPROVED" => Ok(TicketStatus::Approved),
            "REJECTED" => Ok(TicketStatus::Rejected),
            other => Err(LedgerError::Decode(format!("ticket status {other}"))),
        }
    }
}

/// How staff resolved a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketResolution {
    pub staff_id: i64,
    pub action: String,
    pub amount: Option<Decimal>,
    pub transaction_id: Option<TransactionId>,
    pub note: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Support ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub account_id: AccountId,
    pub kind: TicketKind,
    pub status: TicketStatus,
    pub resolution: Option<TicketResolution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial ticket update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub resolution: Option<TicketResolution>,
}

/// Conversation line appended to a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub author_id: i64,
    pub message: String,
}
