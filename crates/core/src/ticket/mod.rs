//! Ticket records and their append-only progress log.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTicketStore;
pub use store::{TicketError, TicketFilter, TicketStore};
pub use types::{
    NewProgressEntry, ProgressEntry, TicketRecord, DEFAULT_PRIORITY, DEFAULT_TICKET_TYPE,
    STATUS_ACTIVE, STATUS_IN_PROGRESS,
};
