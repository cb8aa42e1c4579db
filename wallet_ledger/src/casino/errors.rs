//! Casino adapter errors and their wire messages.

use thiserror::Error;

use crate::ledger::LedgerError;

/// Casino protocol errors
#[derive(Debug, Error)]
pub enum CasinoError {
    /// Signature missing or wrong
    #[error("Authentication failed")]
    Authentication,

    /// Shared secret unusable as an HMAC key
    #[error("Invalid signing key")]
    InvalidKey,

    /// Body could not be parsed into a known request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Transaction parameter mismatch: {0}")]
    ParameterMismatch(&'static str),

    #[error(transparent)]
    Ledger(LedgerError),
}

impl CasinoError {
    /// Message sent to the provider
    pub fn wire_message(&self) -> &'static str {
        match self {
            CasinoError::Authentication => "Authentication failed",
            CasinoError::InvalidRequest(_) => "Invalid request",
            CasinoError::UnsupportedCurrency(_) => "Unsupported currency",
            CasinoError::UserNotFound(_) => "User not found",
            CasinoError::InsufficientFunds => "Insufficient funds",
            CasinoError::ParameterMismatch(_) => "Transaction parameter mismatch",
            CasinoError::InvalidKey | CasinoError::Ledger(_) => "Internal error",
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            CasinoError::Authentication => "authentication",
            CasinoError::InvalidKey => "invalid_key",
            CasinoError::InvalidRequest(_) => "invalid_request",
            CasinoError::UnsupportedCurrency(_) => "unsupported_currency",
            CasinoError::UserNotFound(_) => "user_not_found",
            CasinoError::InsufficientFunds => "insufficient_funds",
            CasinoError::ParameterMismatch(_) => "parameter_mismatch",
            CasinoError::Ledger(_) => "internal",
        }
    }
}

impl From<LedgerError> for CasinoError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidSignature => CasinoError::Authentication,
            LedgerError::UnsupportedCurrency(currency) => {
                CasinoError::UnsupportedCurrency(currency)
            }
            LedgerError::AccountNotFound(id) | LedgerError::WalletNotFound(id) => {
                CasinoError::UserNotFound(id)
            }
            LedgerError::InsufficientBalance { .. }
            | LedgerError::InsufficientAvailableBalance { .. } => CasinoError::InsufficientFunds,
            LedgerError::ParameterMismatch { field } => CasinoError::ParameterMismatch(field),
            LedgerError::InvalidAmount(amount) => {
                CasinoError::InvalidRequest(format!("amount {amount}"))
            }
            other => CasinoError::Ledger(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_ledger_errors_map_to_wire_messages() {
        let err: CasinoError = LedgerError::InsufficientBalance {
            available: Decimal::ONE,
            required: Decimal::TEN,
        }
        .into();
        assert_eq!(err.wire_message(), "Insufficient funds");

        let err: CasinoError = LedgerError::ParameterMismatch { field: "amount" }.into();
        assert_eq!(err.wire_message(), "Transaction parameter mismatch");

        let err: CasinoError = LedgerError::Decode("bad row".into()).into();
        assert_eq!(err.wire_message(), "Internal error");
    }
}
