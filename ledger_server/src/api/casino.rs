//! Casino one-wallet endpoint.
//!
//! The body is taken as raw bytes so malformed JSON still gets a signed reply.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State},
};
use serde_json::Value;
use wallet_ledger::casino::CasinoOutcome;

use super::AppState;
use super::request_id::RequestId;
use crate::{logging, metrics};

/// Handle one casino request. Always `200 OK`.
pub async fn onewallet(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Json<Value> {
    let reply = state.casino.handle_bytes(&body).await;
    let request_type = reply.request_type.unwrap_or("unknown");

    match reply.outcome {
        CasinoOutcome::Ok => {
            if matches!(request_type, "debit" | "credit") {
                metrics::ledger_transactions_total("casino", request_type);
            }
        }
        CasinoOutcome::ExactReplay => metrics::replays_total("exact"),
        CasinoOutcome::SemanticReplay => metrics::replays_total("semantic"),
        CasinoOutcome::Failed(kind) => {
            match kind {
                "authentication" => {
                    metrics::signature_failures_total();
                    logging::log_security_event(
                        "casino_signature",
                        None,
                        None,
                        &format!(
                            "Casino request {} failed signature verification",
                            request_id.as_str()
                        ),
                    );
                }
                "parameter_mismatch" => metrics::parameter_mismatches_total(),
                _ => {}
            }
            metrics::provider_errors_total("casino", kind);
        }
    }

    Json(reply.body)
}
