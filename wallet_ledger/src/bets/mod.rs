//! Bet orders and their lifecycle state machine.

pub mod models;
pub mod state_machine;

pub use models::{
    BetLookup, BetMetadata, BetOrder, BetOrderId, BetSide, BetStatus, NewBetOrder, OrderType,
    PayoutInfo, Selection, SettlementInfo,
};
pub use state_machine::Outcome;
