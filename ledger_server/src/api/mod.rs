//! HTTP API for the wallet ledger.
//!
//! Thin controllers over the ledger core. Provider endpoints (casino and
//! sportsbook) always answer `200 OK` and carry success or failure in the body,
//! so providers never retry on a status code. Staff endpoints use conventional
//! status codes.
//!
//! # Modules
//!
//! - [`casino`]: Casino one-wallet endpoint
//! - [`sportsbook`]: Sportsbook and exchange endpoints
//! - [`staff`]: Staff, admin and wallet endpoints
//! - [`request_id`]: Request ID and timing middleware
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ledger_server::api::{AppState, create_router};
//! use ledger_server::config::{CasinoConfig, SportsbookConfig};
//! use std::sync::Arc;
//! use wallet_ledger::collab::{MemoryAccountDirectory, MemoryTicketService};
//! use wallet_ledger::ledger::MemoryLedgerStore;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let state = AppState::new(
//!     Arc::new(MemoryLedgerStore::new()),
//!     Arc::new(MemoryAccountDirectory::new()),
//!     Arc::new(MemoryTicketService::new()),
//!     &CasinoConfig { secret: "a-long-shared-secret".into(), currency: "INR".into() },
//!     &SportsbookConfig { currency: "INR".into() },
//! )?;
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod casino;
pub mod request_id;
pub mod sportsbook;
pub mod staff;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use wallet_ledger::{
    CasinoAdapter, HoldManager, LedgerManager, SportsbookAdapter, TransactionCoordinator,
    casino::{CasinoError, Signer},
    collab::{AccountDirectory, TicketService},
    ledger::LedgerStore,
};

use crate::config::{CasinoConfig, SportsbookConfig};

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a handle over shared state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerManager,
    pub coordinator: TransactionCoordinator,
    pub casino: CasinoAdapter,
    pub sportsbook: SportsbookAdapter,
    pub accounts: Arc<dyn AccountDirectory>,
    /// Currency of wallets provisioned through the admin API
    pub currency: String,
}

impl AppState {
    /// Wire the core components over one store
    ///
    /// # Errors
    ///
    /// Returns `CasinoError::InvalidKey` if the casino secret cannot key the MAC.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        accounts: Arc<dyn AccountDirectory>,
        tickets: Arc<dyn TicketService>,
        casino: &CasinoConfig,
        sportsbook: &SportsbookConfig,
    ) -> Result<Self, CasinoError> {
        let ledger = LedgerManager::new(store.clone());
        let holds = HoldManager::new(store);
        let signer = Signer::new(&casino.secret)?;

        Ok(Self {
            coordinator: TransactionCoordinator::new(
                ledger.clone(),
                holds,
                accounts.clone(),
                tickets,
            ),
            casino: CasinoAdapter::new(
                ledger.clone(),
                accounts.clone(),
                signer,
                casino.currency.clone(),
            ),
            sportsbook: SportsbookAdapter::new(
                ledger.clone(),
                accounts.clone(),
                sportsbook.currency.clone(),
            ),
            accounts,
            currency: casino.currency.clone(),
            ledger,
        })
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET  /health                                  - Health check
/// POST /casino/onewallet                        - Casino one-wallet protocol
/// POST /sportsbook/bet/place                    - Place sportsbook bet
/// POST /sportsbook/exchange/place               - Place exchange bet
/// POST /sportsbook/settle/win                   - Win status, then payout
/// POST /sportsbook/settle/loss                  - Loss status, then finalize
/// POST /sportsbook/exchange/settle              - Batch exchange settlement
/// POST /sportsbook/rollback                     - Batch rollback
/// POST /sportsbook/bonus                        - Bonus payout
/// POST /api/v1/staff/deposits                   - Staff deposit
/// POST /api/v1/staff/withdrawals                - Staff withdrawal execution
/// POST /api/v1/staff/withdrawals/reject         - Reject withdrawal, release hold
/// POST /api/v1/staff/deposits/reject            - Reject deposit ticket
/// POST /api/v1/admin/deposits                   - Admin deposit
/// POST /api/v1/admin/withdrawals                - Admin withdrawal execution
/// POST /api/v1/admin/transfers                  - Partner transfer
/// POST /api/v1/admin/accounts                   - Provision account and wallet
/// POST /api/v1/withdrawals/request              - Customer withdrawal request
/// GET  /api/v1/wallets/{account_id}             - Wallet balance
/// GET  /api/v1/wallets/{account_id}/transactions - Transaction history
/// ```
pub fn create_router(state: AppState) -> Router {
    let provider_routes = Router::new()
        .route("/casino/onewallet", post(casino::onewallet))
        .route("/sportsbook/bet/place", post(sportsbook::place_bet))
        .route("/sportsbook/exchange/place", post(sportsbook::place_exchange_bet))
        .route("/sportsbook/settle/win", post(sportsbook::settle_win))
        .route("/sportsbook/settle/loss", post(sportsbook::settle_loss))
        .route("/sportsbook/exchange/settle", post(sportsbook::settle_exchange))
        .route("/sportsbook/rollback", post(sportsbook::rollback))
        .route("/sportsbook/bonus", post(sportsbook::bonus_payout));

    Router::new()
        .route("/health", get(health_check))
        .merge(provider_routes)
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/staff/deposits", post(staff::staff_deposit))
        .route("/staff/withdrawals", post(staff::staff_withdrawal))
        .route("/staff/withdrawals/reject", post(staff::reject_withdrawal))
        .route("/staff/deposits/reject", post(staff::reject_deposit))
        .route("/admin/deposits", post(staff::admin_deposit))
        .route("/admin/withdrawals", post(staff::admin_withdrawal))
        .route("/admin/transfers", post(staff::partner_transfer))
        .route("/admin/accounts", post(staff::register_account))
        .route("/withdrawals/request", post(staff::request_withdrawal))
        .route("/wallets/{account_id}", get(staff::get_wallet))
        .route("/wallets/{account_id}/transactions", get(staff::get_history))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the store is reachable, or `503 Service Unavailable` otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","store":true,"version":"1.0.0","timestamp":"2025-11-22T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = match state.ledger.store().health_check().await {
        Ok(()) => true,
        Err(e) => {
            log::error!("Health check failed: {}", e);
            false
        }
    };

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
