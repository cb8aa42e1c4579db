//! Wallet ledger: balances, append-only transaction log, storage backends.

pub mod errors;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use errors::{LedgerError, LedgerResult};
pub use manager::{ApplyRequest, Applied, LedgerManager, Transfer, TransferRequest, WalletRef};
pub use memory::MemoryLedgerStore;
pub use models::{
    AccountId, AuditEvent, AuditRecord, CasinoMetadata, CasinoRound, Category, EntryMetadata,
    EntryStatus, EntryType, HoldExecutionMetadata, HoldMetadata, HoldReleaseMetadata,
    LedgerTransaction, SportsbookMetadata, StaffMetadata, TransactionId, TransferMetadata,
    TransitionReason, Wallet, WalletId,
};
pub use postgres::PgLedgerStore;
pub use store::{
    BetOrderWrite, CasinoActionKey, Changeset, Committed, CommittedLeg, HoldSettlement,
    LedgerStore, NewEntry, WalletLeg,
};
