//! Sportsbook and exchange endpoints. Every reply is `200 OK` with an envelope.

use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use wallet_ledger::sportsbook::{Operation, SportsbookResponse};

use super::AppState;
use crate::metrics;

async fn dispatch(state: &AppState, operation: Operation, body: &[u8]) -> Json<SportsbookResponse> {
    let response = match serde_json::from_slice::<Value>(body) {
        Ok(value) => state.sportsbook.handle(operation, value).await,
        Err(e) => {
            SportsbookResponse::failed("INVALID_REQUEST", format!("malformed JSON: {e}"))
        }
    };

    metrics::sportsbook_requests_total(operation.as_str(), response.success);
    if let Some(error) = &response.error {
        metrics::provider_errors_total("sportsbook", &error.code);
    }

    Json(response)
}

pub async fn place_bet(State(state): State<AppState>, body: Bytes) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::PlaceBet, &body).await
}

pub async fn place_exchange_bet(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::PlaceExchangeBet, &body).await
}

pub async fn settle_win(State(state): State<AppState>, body: Bytes) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::SettleWin, &body).await
}

pub async fn settle_loss(State(state): State<AppState>, body: Bytes) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::SettleLoss, &body).await
}

pub async fn settle_exchange(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::SettleExchange, &body).await
}

pub async fn rollback(State(state): State<AppState>, body: Bytes) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::Rollback, &body).await
}

pub async fn bonus_payout(State(state): State<AppState>, body: Bytes) -> Json<SportsbookResponse> {
    dispatch(&state, Operation::BonusPayout, &body).await
}
