//! Bet order data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::ledger::{AccountId, LedgerError, TransactionId};

/// Bet order ID type
pub type BetOrderId = Uuid;

/// Bet order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    Open,
    Win,
    Lost,
    Completed,
    Rejected,
}

impl BetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BetStatus::Open => "OPEN",
            BetStatus::Win => "WIN",
            BetStatus::Lost => "LOST",
            BetStatus::Completed => "COMPLETED",
            BetStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(BetStatus::Open),
            "WIN" => Ok(BetStatus::Win),
            "LOST" => Ok(BetStatus::Lost),
            "COMPLETED" => Ok(BetStatus::Completed),
            "REJECTED" => Ok(BetStatus::Rejected),
            other => Err(LedgerError::Decode(format!("bet status {other}"))),
        }
    }
}

/// Product the bet was placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Sportsbook,
    Exchange,
    Bonus,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Sportsbook => "SPORTSBOOK",
            OrderType::Exchange => "EXCHANGE",
            OrderType::Bonus => "BONUS",
        }
    }
}

impl FromStr for OrderType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SPORTSBOOK" => Ok(OrderType::Sportsbook),
            "EXCHANGE" => Ok(OrderType::Exchange),
            "BONUS" => Ok(OrderType::Bonus),
            other => Err(LedgerError::Decode(format!("order type {other}"))),
        }
    }
}

/// Exchange side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetSide {
    Back,
    Lay,
}

impl BetSide {
    pub fn as_str(self) -> &'static str {
        match self {
            BetSide::Back => "BACK",
            BetSide::Lay => "LAY",
        }
    }
}

impl FromStr for BetSide {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BACK" => Ok(BetSide::Back),
            "LAY" => Ok(BetSide::Lay),
            other => Err(LedgerError::Decode(format!("bet side {other}"))),
        }
    }
}

/// Event/market/outcome descriptor of one leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub event_id: String,
    pub market_id: String,
    pub outcome_id: String,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub market_name: Option<String>,
    #[serde(default)]
    pub outcome_name: Option<String>,
    #[serde(default)]
    pub odds: Option<Decimal>,
}

/// Outcome recorded by the first settlement call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementInfo {
    pub ext_transaction_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Money moved by the payout call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutInfo {
    pub ext_transaction_id: String,
    pub transaction_id: Option<TransactionId>,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Provider-side bookkeeping attached to a bet order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetMetadata {
    pub placement_reference: Option<String>,
    pub settlement: Option<SettlementInfo>,
    pub payout: Option<PayoutInfo>,
    pub rollback_count: u32,
    pub bonus_id: Option<String>,
}

/// Bet order model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetOrder {
    pub id: BetOrderId,
    pub account_id: AccountId,
    pub external_player_id: String,
    pub betslip_id: String,
    pub bet_id: String,
    pub order_type: OrderType,
    pub bet_type: Option<BetSide>,
    pub status: BetStatus,
    pub amount: Decimal,
    pub potential_win: Decimal,
    pub odds: Decimal,
    pub selections: Vec<Selection>,
    pub settled_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub rollback_at: Option<DateTime<Utc>>,
    pub metadata: BetMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New bet order as placed by the provider
#[derive(Debug, Clone)]
pub struct NewBetOrder {
    pub account_id: AccountId,
    pub external_player_id: String,
    pub betslip_id: String,
    pub bet_id: String,
    pub order_type: OrderType,
    pub bet_type: Option<BetSide>,
    pub amount: Decimal,
    pub potential_win: Decimal,
    pub odds: Decimal,
    pub selections: Vec<Selection>,
}

impl BetOrder {
    /// Create an OPEN bet order
    pub fn open(new: NewBetOrder, placement_reference: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            external_player_id: new.external_player_id,
            betslip_id: new.betslip_id,
            bet_id: new.bet_id,
            order_type: new.order_type,
            bet_type: new.bet_type,
            status: BetStatus::Open,
            amount: new.amount,
            potential_win: new.potential_win,
            odds: new.odds,
            selections: new.selections,
            settled_at: None,
            finalized_at: None,
            rollback_at: None,
            metadata: BetMetadata {
                placement_reference,
                ..BetMetadata::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any selection refers to the given event
    pub fn covers_event(&self, event_id: &str) -> bool {
        self.selections.iter().any(|s| s.event_id == event_id)
    }
}

/// How to find a bet order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BetLookup {
    /// Primary key used by current provider payloads
    ByBet { bet_id: String, betslip_id: String },
    /// Legacy sportsbook records that only carry the slip and event
    ByBetslipEvent { betslip_id: String, event_id: String },
}

impl BetLookup {
    pub fn matches(&self, bet: &BetOrder) -> bool {
        match self {
            BetLookup::ByBet { bet_id, betslip_id } => {
                &bet.bet_id == bet_id && &bet.betslip_id == betslip_id
            }
            BetLookup::ByBetslipEvent {
                betslip_id,
                event_id,
            } => &bet.betslip_id == betslip_id && bet.covers_event(event_id),
        }
    }
}

impl std::fmt::Display for BetLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetLookup::ByBet { bet_id, betslip_id } => write!(f, "bet {bet_id}/{betslip_id}"),
            BetLookup::ByBetslipEvent {
                betslip_id,
                event_id,
            } => write!(f, "betslip {betslip_id} event {event_id}"),
        }
    }
}
