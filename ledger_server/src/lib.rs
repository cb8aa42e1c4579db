//! HTTP front for the wallet ledger.
//!
//! Exposes the casino one-wallet endpoint, the sportsbook and exchange
//! endpoints, and the staff and admin back-office API over one shared store.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
