//! Withdrawal holds.

pub mod manager;

pub use manager::{ExecuteHold, HoldManager, HoldOutcome};
