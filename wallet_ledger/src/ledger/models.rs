//! Ledger data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::errors::LedgerError;
use crate::bets::BetStatus;

/// Account ID type (owned by the identity system)
pub type AccountId = i64;

/// Wallet ID type
pub type WalletId = Uuid;

/// Ledger transaction ID type
pub type TransactionId = Uuid;

/// Wallet model
///
/// `balance` never includes held funds: a hold moves money from `balance`
/// into `hold_balance` in the same atomic step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub account_id: AccountId,
    pub balance: Decimal,
    pub hold_balance: Decimal,
    pub currency: String,
    pub version: i64,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    /// Signed delta this entry applies to a balance
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            EntryType::Credit => amount,
            EntryType::Debit => -amount,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Credit => "CREDIT",
            EntryType::Debit => "DEBIT",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(EntryType::Credit),
            "DEBIT" => Ok(EntryType::Debit),
            other => Err(LedgerError::Decode(format!("entry type {other}"))),
        }
    }
}

/// Entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Failed => "FAILED",
            EntryStatus::Reversed => "REVERSED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EntryStatus::Pending),
            "COMPLETED" => Ok(EntryStatus::Completed),
            "FAILED" => Ok(EntryStatus::Failed),
            "REVERSED" => Ok(EntryStatus::Reversed),
            other => Err(LedgerError::Decode(format!("entry status {other}"))),
        }
    }
}

/// Entry category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Deposit,
    Withdrawal,
    WithdrawalHold,
    WithdrawalRelease,
    CasinoBet,
    CasinoWin,
    Bet,
    Winnings,
    ExchangeBet,
    ExchangeSettlement,
    Bonus,
    Rollback,
    PartnerTransfer,
    PartnerDeposit,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Deposit => "DEPOSIT",
            Category::Withdrawal => "WITHDRAWAL",
            Category::WithdrawalHold => "WITHDRAWAL_HOLD",
            Category::WithdrawalRelease => "WITHDRAWAL_RELEASE",
            Category::CasinoBet => "CASINO_BET",
            Category::CasinoWin => "CASINO_WIN",
            Category::Bet => "BET",
            Category::Winnings => "WINNINGS",
            Category::ExchangeBet => "EXCHANGE_BET",
            Category::ExchangeSettlement => "EXCHANGE_SETTLEMENT",
            Category::Bonus => "BONUS",
            Category::Rollback => "ROLLBACK",
            Category::PartnerTransfer => "PARTNER_TRANSFER",
            Category::PartnerDeposit => "PARTNER_DEPOSIT",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match s {
            "DEPOSIT" => Category::Deposit,
            "WITHDRAWAL" => Category::Withdrawal,
            "WITHDRAWAL_HOLD" => Category::WithdrawalHold,
            "WITHDRAWAL_RELEASE" => Category::WithdrawalRelease,
            "CASINO_BET" => Category::CasinoBet,
            "CASINO_WIN" => Category::CasinoWin,
            "BET" => Category::Bet,
            "WINNINGS" => Category::Winnings,
            "EXCHANGE_BET" => Category::ExchangeBet,
            "EXCHANGE_SETTLEMENT" => Category::ExchangeSettlement,
            "BONUS" => Category::Bonus,
            "ROLLBACK" => Category::Rollback,
            "PARTNER_TRANSFER" => Category::PartnerTransfer,
            "PARTNER_DEPOSIT" => Category::PartnerDeposit,
            other => return Err(LedgerError::Decode(format!("category {other}"))),
        };
        Ok(category)
    }
}

/// Staff-initiated movement details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMetadata {
    pub staff_id: i64,
    pub ticket_id: Option<i64>,
    pub description: Option<String>,
}

/// Withdrawal request details carried by a hold row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldMetadata {
    pub ticket_id: Option<i64>,
    pub note: Option<String>,
}

/// Release of a hold back to the spendable balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldReleaseMetadata {
    pub hold_id: TransactionId,
    pub reason: String,
    pub staff_id: Option<i64>,
}

/// Staff confirmation that a held withdrawal left the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldExecutionMetadata {
    pub request: HoldMetadata,
    pub staff_id: i64,
    pub description: Option<String>,
    pub ticket_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

/// Casino one-wallet identifiers used for semantic replay detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasinoMetadata {
    pub game_id: String,
    pub action_id: String,
    pub subtype: Option<String>,
    pub game_desc: Option<String>,
    pub external_player_id: String,
    pub currency: String,
}

/// Sportsbook/exchange identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportsbookMetadata {
    pub ext_transaction_id: String,
    pub external_player_id: String,
    pub operation: String,
    pub betslip_id: Option<String>,
    pub bet_ids: Vec<String>,
}

/// Two-leg transfer details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub counterparty_wallet: WalletId,
    pub staff_id: Option<i64>,
    pub note: Option<String>,
}

/// Per-category metadata payload
///
/// The store treats this as opaque; each producer only reads the variant it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryMetadata {
    None,
    Staff(StaffMetadata),
    Hold(HoldMetadata),
    HoldRelease(HoldReleaseMetadata),
    HoldExecution(HoldExecutionMetadata),
    Casino(CasinoMetadata),
    Sportsbook(SportsbookMetadata),
    Transfer(TransferMetadata),
}

impl EntryMetadata {
    pub fn as_casino(&self) -> Option<&CasinoMetadata> {
        match self {
            EntryMetadata::Casino(meta) => Some(meta),
            _ => None,
        }
    }
}

/// Ledger transaction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub category: Category,
    pub reference: Option<String>,
    pub resulting_balance: Decimal,
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LedgerTransaction {
    /// Whether this row is a hold that can still be released or executed
    pub fn is_pending_hold(&self) -> bool {
        self.status == EntryStatus::Pending && self.category == Category::WithdrawalHold
    }

    /// Signed effect of this row on the wallet balance
    ///
    /// Failed rows never moved money.
    pub fn balance_effect(&self) -> Decimal {
        match self.status {
            EntryStatus::Failed => Decimal::ZERO,
            _ => self.entry_type.signed(self.amount),
        }
    }
}

/// Reason a bet order changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    Settlement,
    Payout,
    Rollback,
}

/// Audit trail event
///
/// Non-monetary facts live here instead of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    BetStatusChanged {
        from: BetStatus,
        to: BetStatus,
        reason: TransitionReason,
    },
    LossFinalized {
        ext_transaction_id: Option<String>,
        stake: Decimal,
    },
}

/// Audit log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub event: AuditEvent,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(subject_id: Uuid, event: AuditEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            event,
            recorded_at: Utc::now(),
        }
    }
}

/// Round details reported by the casino provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasinoRound {
    pub game_id: String,
    pub user_id: String,
    pub game_desc: Option<String>,
    pub actions: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_db_text() {
        for category in [
            Category::Deposit,
            Category::WithdrawalHold,
            Category::CasinoWin,
            Category::ExchangeSettlement,
            Category::PartnerDeposit,
        ] {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("LOTTERY".parse::<Category>().is_err());
    }

    #[test]
    fn test_metadata_is_tagged() {
        let meta = EntryMetadata::Hold(HoldMetadata {
            ticket_id: Some(7),
            note: None,
        });
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "hold");
        assert_eq!(json["ticket_id"], 7);
    }

    #[test]
    fn test_failed_rows_have_no_balance_effect() {
        let mut tx = LedgerTransaction {
            id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            amount: Decimal::new(500, 2),
            entry_type: EntryType::Debit,
            status: EntryStatus::Completed,
            category: Category::Bet,
            reference: None,
            resulting_balance: Decimal::ZERO,
            metadata: EntryMetadata::None,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert_eq!(tx.balance_effect(), Decimal::new(-500, 2));
        tx.status = EntryStatus::Failed;
        assert_eq!(tx.balance_effect(), Decimal::ZERO);
    }
}
