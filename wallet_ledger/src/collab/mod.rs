//! Collaborators consumed by the ledger core: account lookup and tickets.

pub mod memory;
pub mod models;
pub mod repository;

pub use memory::{MemoryAccountDirectory, MemoryTicketService};
pub use models::{
    AccountRef, AccountRole, ConversationEntry, Ticket, TicketKind, TicketPatch, TicketResolution,
    TicketStatus,
};
pub use repository::{AccountDirectory, PgAccountDirectory, PgTicketService, TicketService};
