//! Sportsbook and exchange wire shapes. Amounts are integer minor units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bets::{BetSide, Selection};
use crate::wire;

/// Sportsbook operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    PlaceBet,
    PlaceExchangeBet,
    SettleWin,
    SettleLoss,
    SettleExchange,
    Rollback,
    BonusPayout,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::PlaceBet => "place_bet",
            Operation::PlaceExchangeBet => "place_exchange_bet",
            Operation::SettleWin => "settle_win",
            Operation::SettleLoss => "settle_loss",
            Operation::SettleExchange => "settle_exchange",
            Operation::Rollback => "rollback",
            Operation::BonusPayout => "bonus_payout",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selection as sent by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionPayload {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub event_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub market_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub outcome_id: String,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub market_name: Option<String>,
    #[serde(default)]
    pub outcome_name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub odds: Option<String>,
}

impl SelectionPayload {
    pub fn into_selection(self) -> Selection {
        Selection {
            event_id: self.event_id,
            market_id: self.market_id,
            outcome_id: self.outcome_id,
            event_name: self.event_name,
            market_name: self.market_name,
            outcome_name: self.outcome_name,
            odds: self.odds.as_deref().and_then(wire::parse_decimal),
        }
    }
}

/// Sportsbook or exchange bet placement
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBetRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub ext_transaction_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub user_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub betslip_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub bet_id: String,
    /// Stake
    #[serde(deserialize_with = "wire::minor_units")]
    pub amount: i64,
    #[serde(default, deserialize_with = "wire::opt_minor_units")]
    pub potential_win: Option<i64>,
    #[serde(deserialize_with = "wire::decimal")]
    pub odds: Decimal,
    pub currency: String,
    #[serde(default)]
    pub selections: Vec<SelectionPayload>,
    /// Exchange only
    #[serde(default)]
    pub bet_type: Option<BetSide>,
    /// Exchange lay bets debit the liability instead of the stake
    #[serde(default, deserialize_with = "wire::opt_minor_units")]
    pub liability: Option<i64>,
}

/// Win or loss notification, sent twice: status first, then payout
#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub ext_transaction_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub user_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub betslip_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub bet_id: String,
    #[serde(default)]
    pub is_payout: bool,
    /// Payout on the win path
    #[serde(default, deserialize_with = "wire::opt_minor_units")]
    pub amount: Option<i64>,
    pub currency: String,
}

/// Exchange settlement outcome of one bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeOutcome {
    Win,
    Lost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettlementItem {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub betslip_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub bet_id: String,
    pub outcome: ExchangeOutcome,
    #[serde(default, deserialize_with = "wire::opt_minor_units")]
    pub amount: Option<i64>,
}

/// Batch exchange settlement; each bet settles and pays in one call
#[derive(Debug, Clone, Deserialize)]
pub struct SettleExchangeRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub ext_transaction_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub user_id: String,
    pub currency: String,
    pub settlements: Vec<ExchangeSettlementItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollbackItem {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub betslip_id: String,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub bet_id: Option<String>,
    /// Locates legacy sportsbook records that lack a bet id
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub event_id: Option<String>,
}

/// Batch rollback with an optional debit adjustment
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub ext_transaction_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub user_id: String,
    pub currency: String,
    pub bets: Vec<RollbackItem>,
    #[serde(default, deserialize_with = "wire::opt_minor_units")]
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BonusRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub ext_transaction_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub user_id: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub bonus_id: String,
    #[serde(deserialize_with = "wire::minor_units")]
    pub amount: i64,
    pub currency: String,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub betslip_id: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub bet_id: Option<String>,
}

/// Common success shape, balances in minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportsbookReceipt {
    pub id: String,
    pub ext_transaction_id: String,
    pub user_id: String,
    pub operation: Operation,
    pub amount: i64,
    pub currency: String,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// Response envelope, always delivered with HTTP 200
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportsbookResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: Option<SportsbookReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl SportsbookResponse {
    pub fn ok(receipt: SportsbookReceipt) -> Self {
        Self {
            success: true,
            receipt: Some(receipt),
            error: None,
        }
    }

    pub fn failed(code: &str, message: String) -> Self {
        Self {
            success: false,
            receipt: None,
            error: Some(WireError {
                code: code.to_string(),
                message,
            }),
        }
    }
}
