//! At-most-once application of external events.

pub mod guard;

pub use guard::{
    CANCEL_SUBTYPE, IdempotencyGuard, InboundEvent, Resolution, ensure_funds, verify_replay,
};
