//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{NewProgressEntry, ProgressEntry, TicketError, TicketFilter, TicketRecord, TicketStore};

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                tags TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ticket_progress (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL REFERENCES tickets(id),
                agent_type TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_progress_ticket ON ticket_progress(ticket_id);
            "#,
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        let where_clause = match filter.status {
            Some(ref status) => {
                params.push(Box::new(status.clone()));
                "WHERE status = ?".to_string()
            }
            None => String::new(),
        };

        (where_clause, params)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<(TicketRecord, String)> {
        let tags_json: String = row.get(4)?;
        let record = TicketRecord {
            id: row.get(0)?,
            ticket_type: row.get(1)?,
            priority: row.get(2)?,
            status: row.get(3)?,
            tags: Vec::new(),
        };
        Ok((record, tags_json))
    }

    fn decode_record(
        (mut record, tags_json): (TicketRecord, String),
    ) -> Result<TicketRecord, TicketError> {
        record.tags = serde_json::from_str(&tags_json)?;
        Ok(record)
    }

    fn row_to_progress(row: &rusqlite::Row) -> rusqlite::Result<(ProgressEntry, String)> {
        let result_json: String = row.get(4)?;
        let recorded_at_str: String = row.get(5)?;

        let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let entry = ProgressEntry {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            agent_type: row.get(2)?,
            status: row.get(3)?,
            result: serde_json::Value::Null,
            recorded_at,
        };
        Ok((entry, result_json))
    }

    fn exists(conn: &Connection, id: &str) -> Result<bool, TicketError> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tickets WHERE id = ?)",
            params![id],
            |row| row.get(0),
        )
        .map_err(|e| TicketError::Database(e.to_string()))
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, record: TicketRecord) -> Result<TicketRecord, TicketError> {
        let conn = self.conn()?;

        if Self::exists(&conn, &record.id)? {
            return Err(TicketError::AlreadyExists(record.id));
        }

        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&record.tags)?;

        conn.execute(
            "INSERT INTO tickets (id, type, priority, status, tags, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.ticket_type,
                record.priority,
                record.status,
                tags_json,
                now,
                now,
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<TicketRecord>, TicketError> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT id, type, priority, status, tags FROM tickets WHERE id = ?",
            params![id],
            Self::row_to_record,
        );

        match result {
            Ok(row) => Self::decode_record(row).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TicketError::Database(e.to_string())),
        }
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, type, priority, status, tags FROM tickets {} ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_record)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let row = row_result.map_err(|e| TicketError::Database(e.to_string()))?;
            records.push(Self::decode_record(row)?);
        }

        Ok(records)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(count)
    }

    fn update_status(&self, id: &str, status: &str) -> Result<TicketRecord, TicketError> {
        {
            let conn = self.conn()?;
            let changed = conn
                .execute(
                    "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?",
                    params![status, Utc::now().to_rfc3339(), id],
                )
                .map_err(|e| TicketError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(TicketError::NotFound(id.to_string()));
            }
        }

        self.load(id)
    }

    fn append_progress(&self, entry: NewProgressEntry) -> Result<ProgressEntry, TicketError> {
        let conn = self.conn()?;

        if !Self::exists(&conn, &entry.ticket_id)? {
            return Err(TicketError::NotFound(entry.ticket_id));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let result_json = serde_json::to_string(&entry.result)?;

        conn.execute(
            "INSERT INTO ticket_progress (id, ticket_id, agent_type, status, result, recorded_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                entry.ticket_id,
                entry.agent_type,
                entry.status,
                result_json,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(ProgressEntry {
            id,
            ticket_id: entry.ticket_id,
            agent_type: entry.agent_type,
            status: entry.status,
            result: entry.result,
            recorded_at: now,
        })
    }

    fn progress(&self, ticket_id: &str) -> Result<Vec<ProgressEntry>, TicketError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, ticket_id, agent_type, status, result, recorded_at FROM ticket_progress WHERE ticket_id = ? ORDER BY rowid ASC",
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![ticket_id], Self::row_to_progress)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row_result in rows {
            let (mut entry, result_json) =
                row_result.map_err(|e| TicketError::Database(e.to_string()))?;
            entry.result = serde_json::from_str(&result_json)?;
            entries.push(entry);
        }

        Ok(entries)
    }
}
