//! Sportsbook adapter errors.

use thiserror::Error;

use crate::ledger::LedgerError;

/// Sportsbook protocol errors
#[derive(Debug, Error)]
pub enum SportsbookError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Bet not found: {0}")]
    BetNotFound(String),

    #[error("Bet already placed: {0}")]
    DuplicateBet(String),

    #[error("Invalid bet state: {0}")]
    InvalidState(String),

    #[error("Transaction already processed with different parameters: {0}")]
    TransactionConflict(String),

    #[error(transparent)]
    Ledger(LedgerError),
}

impl SportsbookError {
    /// Error code sent to the provider
    pub fn code(&self) -> &'static str {
        match self {
            SportsbookError::InvalidRequest(_) => "INVALID_REQUEST",
            SportsbookError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            SportsbookError::UserNotFound(_) => "USER_NOT_FOUND",
            SportsbookError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            SportsbookError::BetNotFound(_) => "BET_NOT_FOUND",
            SportsbookError::DuplicateBet(_) => "DUPLICATE_BET",
            SportsbookError::InvalidState(_) => "INVALID_BET_STATE",
            SportsbookError::TransactionConflict(_) => "TRANSACTION_CONFLICT",
            SportsbookError::Ledger(_) => "INTERNAL_ERROR",
        }
    }

    /// Message sent to the provider
    pub fn wire_message(&self) -> String {
        match self {
            SportsbookError::Ledger(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<LedgerError> for SportsbookError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound(id) | LedgerError::WalletNotFound(id) => {
                SportsbookError::UserNotFound(id)
            }
            LedgerError::InsufficientBalance { .. }
            | LedgerError::InsufficientAvailableBalance { .. } => {
                SportsbookError::InsufficientFunds
            }
            LedgerError::UnsupportedCurrency(currency) => {
                SportsbookError::UnsupportedCurrency(currency)
            }
            LedgerError::BetOrderNotFound(id) => SportsbookError::BetNotFound(id),
            LedgerError::DuplicateBetOrder(id) => SportsbookError::DuplicateBet(id),
            LedgerError::DuplicateReference(reference) => {
                SportsbookError::TransactionConflict(reference)
            }
            LedgerError::InvalidStateTransition { from, to } => {
                SportsbookError::InvalidState(format!("{from} -> {to}"))
            }
            LedgerError::InvalidAmount(amount) => {
                SportsbookError::InvalidRequest(format!("amount {amount}"))
            }
            other => SportsbookError::Ledger(other),
        }
    }
}
