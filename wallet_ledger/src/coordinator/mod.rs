//! Staff workflows over the ledger and hold manager.

pub mod requests;
pub mod service;

pub use requests::{
    DepositRequest, PartnerTransferRequest, RejectDepositRequest, RejectWithdrawalRequest,
    WithdrawalHoldRequest, WithdrawalRequest, WithdrawalRequested,
};
pub use service::TransactionCoordinator;
