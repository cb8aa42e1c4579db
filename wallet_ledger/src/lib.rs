//! # Wallet Ledger
//!
//! Double-entry style wallet ledger with withdrawal holds and settlement
//! adapters for a casino one-wallet provider and a sportsbook/exchange provider.
//!
//! Every money movement goes through [`LedgerStore::commit`], which applies a
//! changeset as one atomic unit: balance and hold deltas, appended ledger rows,
//! bet order writes and audit records either all land or none do.
//!
//! ## Core Modules
//!
//! - [`ledger`]: Data model, error taxonomy, storage backends and [`LedgerManager`]
//! - [`hold`]: Reserve, release and execute withdrawal holds
//! - [`idempotency`]: Exact and semantic replay detection for provider events
//! - [`bets`]: Bet orders and their lifecycle state machine
//! - [`casino`]: Signed casino one-wallet protocol
//! - [`sportsbook`]: Sportsbook and exchange settlement protocol
//! - [`coordinator`]: Staff workflows with role checks and ticket bookkeeping
//! - [`collab`]: Account directory and ticket service collaborators
//! - [`db`]: PostgreSQL pool, configuration and migrations
//!
//! ## Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use wallet_ledger::{ApplyRequest, Category, LedgerManager, MemoryLedgerStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), wallet_ledger::LedgerError> {
//! let ledger = LedgerManager::new(Arc::new(MemoryLedgerStore::new()));
//! let wallet = ledger.create_wallet(1, "INR").await?;
//!
//! let applied = ledger
//!     .apply_transaction(ApplyRequest::credit(
//!         wallet.id,
//!         Decimal::from(500),
//!         Category::Deposit,
//!     ))
//!     .await?;
//! assert_eq!(applied.balance, Decimal::from(500));
//! # Ok(())
//! # }
//! ```

pub mod bets;
pub mod casino;
pub mod collab;
pub mod coordinator;
pub mod db;
pub mod hold;
pub mod idempotency;
pub mod ledger;
pub mod sportsbook;
pub mod wire;

pub use bets::{BetOrder, BetStatus};
pub use casino::{CasinoAdapter, CasinoError, Signer};
pub use collab::{AccountDirectory, AccountRef, AccountRole, TicketService};
pub use coordinator::TransactionCoordinator;
pub use db::{Database, DatabaseConfig};
pub use hold::{ExecuteHold, HoldManager, HoldOutcome};
pub use idempotency::IdempotencyGuard;
pub use ledger::{
    ApplyRequest, Applied, Category, EntryStatus, EntryType, LedgerError, LedgerManager,
    LedgerResult, LedgerStore, LedgerTransaction, MemoryLedgerStore, PgLedgerStore, Wallet,
    WalletRef,
};
pub use sportsbook::{SportsbookAdapter, SportsbookError};
