//! Sportsbook and exchange bet settlement protocol.

pub mod adapter;
pub mod errors;
pub mod messages;
pub mod money;

pub use adapter::SportsbookAdapter;
pub use errors::SportsbookError;
pub use messages::{Operation, SportsbookReceipt, SportsbookResponse};
pub use money::{from_minor, to_minor};
