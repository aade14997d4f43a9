//! Ticket storage trait and types.

use std::fmt;

use crate::ticket::{NewProgressEntry, ProgressEntry, TicketRecord};

/// Error type for ticket operations.
#[derive(Debug)]
pub enum TicketError {
    /// Ticket not found.
    NotFound(String),
    /// A ticket with this id already exists.
    AlreadyExists(String),
    /// Database error.
    Database(String),
    /// Stored JSON could not be encoded or decoded.
    Serialization(String),
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketError::NotFound(id) => write!(f, "Ticket not found: {}", id),
            TicketError::AlreadyExists(id) => write!(f, "Ticket already exists: {}", id),
            TicketError::Database(msg) => write!(f, "Database error: {}", msg),
            TicketError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for TicketError {}

impl From<serde_json::Error> for TicketError {
    fn from(err: serde_json::Error) -> Self {
        TicketError::Serialization(err.to_string())
    }
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status.
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for ticket storage backends.
pub trait TicketStore: Send + Sync {
    /// Store a new ticket record.
    fn create(&self, record: TicketRecord) -> Result<TicketRecord, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<TicketRecord>, TicketError>;

    /// Get a ticket by ID, failing with `NotFound` if it does not exist.
    fn load(&self, id: &str) -> Result<TicketRecord, TicketError> {
        self.get(id)?
            .ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    /// List tickets matching the filter, oldest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Replace a ticket's status.
    fn update_status(&self, id: &str, status: &str) -> Result<TicketRecord, TicketError>;

    /// Append a progress entry. The ticket must exist.
    fn append_progress(&self, entry: NewProgressEntry) -> Result<ProgressEntry, TicketError>;

    /// All progress entries of a ticket, in insertion order.
    fn progress(&self, ticket_id: &str) -> Result<Vec<ProgressEntry>, TicketError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        let filter = TicketFilter::new()
            .with_status("active")
            .with_limit(10)
            .with_offset(20);
        assert_eq!(filter.status.as_deref(), Some("active"));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 20);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TicketError::NotFound("T-1".to_string()).to_string(),
            "Ticket not found: T-1"
        );
        let err: TicketError = serde_json::from_str::<Vec<String>>("{").unwrap_err().into();
        assert!(matches!(err, TicketError::Serialization(_)));
    }
}
