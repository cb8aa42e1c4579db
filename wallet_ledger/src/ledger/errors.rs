//! Ledger error types.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store operation exceeded its deadline
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Stored row could not be decoded
    #[error("Corrupt ledger row: {0}")]
    Decode(String),

    /// Wallet not found
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// A debit would drive the balance negative
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },

    /// Not enough spendable balance to place a hold
    #[error("Insufficient available balance: available {available}, required {required}")]
    InsufficientAvailableBalance {
        available: Decimal,
        required: Decimal,
    },

    /// Hold balance smaller than the hold being released or executed
    #[error("Insufficient hold balance: held {held}, required {required}")]
    InsufficientHoldBalance { held: Decimal, required: Decimal },

    /// Hold missing or no longer pending
    #[error("Hold not found or not pending: {0}")]
    HoldNotFound(Uuid),

    /// Replayed event carries different parameters than the recorded one
    #[error("Parameter mismatch on replay: {field}")]
    ParameterMismatch { field: &'static str },

    /// Signature verification failed
    #[error("Invalid signature")]
    InvalidSignature,

    /// Currency not accepted by this wallet
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Role restriction
    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    /// Bet order not found
    #[error("Bet order not found: {0}")]
    BetOrderNotFound(String),

    /// Bet order already exists for this bet/betslip pair
    #[error("Duplicate bet order: {0}")]
    DuplicateBetOrder(String),

    /// Reference already used by another ledger entry
    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    /// Amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Bet order cannot move between these states
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Ticket not found
    #[error("Ticket not found: {0}")]
    TicketNotFound(i64),
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure, and identifiers are redacted.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Decode(_) | LedgerError::Timeout(_) => {
                "Internal server error".to_string()
            }
            LedgerError::WalletNotFound(_) => "Wallet not found".to_string(),
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            LedgerError::HoldNotFound(_) => "Hold not found".to_string(),
            LedgerError::BetOrderNotFound(_) => "Bet order not found".to_string(),
            LedgerError::TicketNotFound(_) => "Ticket not found".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the error comes from the store rather than from business rules
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            LedgerError::Database(_) | LedgerError::Decode(_) | LedgerError::Timeout(_)
        )
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_redacts_ids() {
        let err = LedgerError::WalletNotFound("account 42".to_string());
        assert_eq!(err.client_message(), "Wallet not found");

        let err = LedgerError::HoldNotFound(Uuid::new_v4());
        assert_eq!(err.client_message(), "Hold not found");
    }

    #[test]
    fn test_client_message_keeps_business_errors() {
        let err = LedgerError::InsufficientBalance {
            available: Decimal::new(1000, 2),
            required: Decimal::new(2500, 2),
        };
        assert!(err.client_message().contains("10.00"));
        assert!(!err.is_internal());
        assert!(LedgerError::Timeout(Duration::from_secs(1)).is_internal());
    }
}
