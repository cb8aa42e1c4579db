//! Casino one-wallet protocol.

pub mod adapter;
pub mod errors;
pub mod messages;
pub mod signature;

pub use adapter::{CasinoAdapter, CasinoOutcome, CasinoReply};
pub use errors::CasinoError;
pub use messages::{CasinoRequest, format_balance};
pub use signature::{SIGNATURE_FIELD, Signer, canonical_message};
