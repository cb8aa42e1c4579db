//! Staff, admin and wallet API handlers.
//!
//! These endpoints sit behind the platform's back office and use conventional
//! status codes, unlike the provider endpoints.
//!
//! # Examples
//!
//! Staff deposit:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/staff/deposits \
//!   -H "Content-Type: application/json" \
//!   -d '{"account_id": 1, "amount": "100.00", "staff_id": 7, "ticket_id": 12}'
//! ```
//!
//! Wallet balance:
//! ```bash
//! curl http://localhost:8080/api/v1/wallets/1
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use wallet_ledger::{
    AccountRef, AccountRole, Applied, HoldOutcome, LedgerError, LedgerTransaction, Wallet,
    WalletRef,
    collab::Ticket,
    coordinator::{
        DepositRequest, PartnerTransferRequest, RejectDepositRequest, RejectWithdrawalRequest,
        WithdrawalHoldRequest, WithdrawalRequest, WithdrawalRequested,
    },
    ledger::{AccountId, Transfer},
};

use super::AppState;
use crate::metrics;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a ledger error onto a status code and a client-safe body
fn error_response(e: LedgerError) -> ApiError {
    let (status, code) = match &e {
        LedgerError::WalletNotFound(_)
        | LedgerError::AccountNotFound(_)
        | LedgerError::HoldNotFound(_)
        | LedgerError::BetOrderNotFound(_)
        | LedgerError::TicketNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        LedgerError::InsufficientBalance { .. }
        | LedgerError::InsufficientAvailableBalance { .. }
        | LedgerError::InsufficientHoldBalance { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_FUNDS")
        }
        LedgerError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
        LedgerError::ParameterMismatch { .. } => (StatusCode::BAD_REQUEST, "PARAMETER_MISMATCH"),
        LedgerError::InvalidStateTransition { .. } => {
            (StatusCode::BAD_REQUEST, "INVALID_STATE_TRANSITION")
        }
        LedgerError::UnsupportedCurrency(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_CURRENCY"),
        LedgerError::InvalidSignature => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
        LedgerError::OperationNotAllowed(_) => (StatusCode::FORBIDDEN, "OPERATION_NOT_ALLOWED"),
        LedgerError::DuplicateReference(_) | LedgerError::DuplicateBetOrder(_) => {
            (StatusCode::CONFLICT, "DUPLICATE")
        }
        LedgerError::Database(_) | LedgerError::Decode(_) | LedgerError::Timeout(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
        }
    };

    if e.is_internal() {
        log::error!("Back-office request failed: {}", e);
    } else {
        log::info!("Back-office request rejected: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.client_message(),
            code: Some(code),
        }),
    )
}

/// Staff deposit into a customer account.
///
/// # Response
///
/// Returns `200 OK` with the applied entry and resulting balance.
///
/// # Errors
///
/// - `403 Forbidden`: Target is a partner account
/// - `404 Not Found`: Account or wallet does not exist
/// - `409 Conflict`: Reference already used for a different deposit
pub async fn staff_deposit(
    State(state): State<AppState>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Applied>, ApiError> {
    let applied = state
        .coordinator
        .staff_deposit(request)
        .await
        .map_err(error_response)?;
    metrics::ledger_transactions_total("staff", "deposit");
    Ok(Json(applied))
}

/// Admin deposit, partner accounts included.
pub async fn admin_deposit(
    State(state): State<AppState>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Applied>, ApiError> {
    let applied = state
        .coordinator
        .admin_deposit(request)
        .await
        .map_err(error_response)?;
    metrics::ledger_transactions_total("admin", "deposit");
    Ok(Json(applied))
}

/// Staff execution of a withdrawal, from a hold or directly.
///
/// # Errors
///
/// - `400 Bad Request`: Neither a hold nor an amount was given
/// - `404 Not Found`: Hold missing or already released
/// - `422 Unprocessable Entity`: Direct withdrawal exceeds the balance
pub async fn staff_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<HoldOutcome>, ApiError> {
    let from_hold = request.hold_id.is_some();
    let outcome = state
        .coordinator
        .staff_withdrawal(request)
        .await
        .map_err(error_response)?;
    record_withdrawal("staff", from_hold);
    Ok(Json(outcome))
}

/// Admin execution of a withdrawal, partner accounts included.
pub async fn admin_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<Json<HoldOutcome>, ApiError> {
    let from_hold = request.hold_id.is_some();
    let outcome = state
        .coordinator
        .admin_withdrawal(request)
        .await
        .map_err(error_response)?;
    record_withdrawal("admin", from_hold);
    Ok(Json(outcome))
}

fn record_withdrawal(source: &str, from_hold: bool) {
    if from_hold {
        metrics::holds_total("executed");
    }
    metrics::ledger_transactions_total(source, "withdrawal");
}

/// Reject a withdrawal and return the held funds.
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<RejectWithdrawalRequest>,
) -> Result<Json<HoldOutcome>, ApiError> {
    let outcome = state
        .coordinator
        .reject_withdrawal(request)
        .await
        .map_err(error_response)?;
    metrics::holds_total("released");
    Ok(Json(outcome))
}

/// Reject a deposit ticket. No money moves.
pub async fn reject_deposit(
    State(state): State<AppState>,
    Json(request): Json<RejectDepositRequest>,
) -> Result<Json<Ticket>, ApiError> {
    state
        .coordinator
        .reject_deposit(request)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Customer withdrawal request: reserves the amount until staff act on it.
///
/// # Response
///
/// Returns `201 Created` with the ticket id and the hold balances.
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalHoldRequest>,
) -> Result<(StatusCode, Json<WithdrawalRequested>), ApiError> {
    let requested = state
        .coordinator
        .request_withdrawal(request)
        .await
        .map_err(error_response)?;
    metrics::holds_total("created");
    Ok((StatusCode::CREATED, Json(requested)))
}

/// Move funds out of a partner account.
pub async fn partner_transfer(
    State(state): State<AppState>,
    Json(request): Json<PartnerTransferRequest>,
) -> Result<Json<Transfer>, ApiError> {
    let transfer = state
        .coordinator
        .partner_transfer(request)
        .await
        .map_err(error_response)?;
    metrics::ledger_transactions_total("admin", "transfer");
    Ok(Json(transfer))
}

#[derive(Debug, Deserialize)]
pub struct RegisterAccountRequest {
    pub external_player_id: String,
    #[serde(default = "default_role")]
    pub role: AccountRole,
    pub currency: Option<String>,
}

fn default_role() -> AccountRole {
    AccountRole::Customer
}

#[derive(Debug, Serialize)]
pub struct RegisteredAccount {
    pub account: AccountRef,
    pub wallet: Wallet,
}

/// Provision an account and its wallet. Repeating the call returns both unchanged.
pub async fn register_account(
    State(state): State<AppState>,
    Json(request): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<RegisteredAccount>), ApiError> {
    let account = state
        .accounts
        .register(&request.external_player_id, request.role)
        .await
        .map_err(error_response)?;
    let currency = request.currency.as_deref().unwrap_or(&state.currency);
    let wallet = state
        .ledger
        .create_wallet(account.id, currency)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(RegisteredAccount { account, wallet })))
}

/// Balance projection of an account's wallet.
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Wallet>, ApiError> {
    state
        .ledger
        .get_balance(WalletRef::Account(account_id))
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Ledger rows of an account's wallet, newest first.
///
/// The `limit` query parameter defaults to 50 and is clamped to the ledger maximum.
pub async fn get_history(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LedgerTransaction>>, ApiError> {
    let wallet = state
        .ledger
        .get_balance(WalletRef::Account(account_id))
        .await
        .map_err(error_response)?;
    state
        .ledger
        .history(wallet.id, query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
        .map(Json)
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_error_status_mapping() {
        let (status, Json(body)) = error_response(LedgerError::HoldNotFound(Uuid::new_v4()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Hold not found");

        let (status, _) = error_response(LedgerError::InsufficientBalance {
            available: Decimal::ONE,
            required: Decimal::TEN,
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = error_response(LedgerError::OperationNotAllowed("partner".into()));
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, Json(body)) = error_response(LedgerError::DuplicateReference("r".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, Some("DUPLICATE"));
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let (status, Json(body)) = error_response(LedgerError::Decode("bad row 17".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }
}
