//! Staff-facing request shapes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::hold::HoldOutcome;
use crate::ledger::{AccountId, TransactionId};

/// Staff or admin deposit
#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub staff_id: i64,
    #[serde(default)]
    pub description: Option<String>,
    /// Replaying a deposit with the same reference returns the recorded one
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<i64>,
}

/// Staff or admin withdrawal execution
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub account_id: AccountId,
    /// Hold created by the withdrawal request; absent on the direct debit path
    #[serde(default)]
    pub hold_id: Option<TransactionId>,
    /// Required on the direct debit path
    #[serde(default)]
    pub amount: Option<Decimal>,
    pub staff_id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<i64>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectWithdrawalRequest {
    pub hold_id: TransactionId,
    pub staff_id: i64,
    pub reason: String,
    #[serde(default)]
    pub ticket_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectDepositRequest {
    pub ticket_id: i64,
    pub staff_id: i64,
    pub reason: String,
}

/// Customer withdrawal request: reserves the amount until staff act on it
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalHoldRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    /// Opens a new withdrawal ticket when absent
    #[serde(default)]
    pub ticket_id: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalRequested {
    pub ticket_id: i64,
    #[serde(flatten)]
    pub hold: HoldOutcome,
}

/// Partner to customer transfer
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerTransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub staff_id: i64,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}
