//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskrelay_core::{
    DispatcherError, ProgressEntry, Task, TaskKey, TicketError, TicketFilter, TicketRecord,
};
use tracing::{info, warn};

use crate::metrics::TICKETS_CREATED_TOTAL;
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of tickets to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for a created ticket
#[derive(Debug, Serialize)]
pub struct CreateTicketResponse {
    pub ticket: TicketRecord,
    /// Tasks the dispatcher queued for the ticket
    pub tasks: Vec<TaskKey>,
}

/// Response for a single ticket
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket: TicketRecord,
    pub progress: Vec<ProgressEntry>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for a ticket's tasks
#[derive(Debug, Serialize)]
pub struct TicketTasksResponse {
    pub ticket_id: String,
    pub tasks: Vec<Task>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<TicketErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(TicketErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn internal_error(e: impl ToString) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
}

// ============================================================================
// Handlers
// ============================================================================

/// Store a ticket and submit it to the dispatcher
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(record): Json<TicketRecord>,
) -> Result<(StatusCode, Json<CreateTicketResponse>), ApiError> {
    if record.id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "ticket id cannot be empty"));
    }

    let ticket = match state.ticket_store().create(record) {
        Ok(ticket) => ticket,
        Err(e @ TicketError::AlreadyExists(_)) => {
            return Err(api_error(StatusCode::CONFLICT, e));
        }
        Err(e) => return Err(internal_error(e)),
    };
    TICKETS_CREATED_TOTAL.inc();

    match state.dispatcher().submit(&ticket).await {
        Ok(tasks) => {
            info!(ticket_id = %ticket.id, tasks = tasks.len(), "Ticket submitted");
            Ok((
                StatusCode::CREATED,
                Json(CreateTicketResponse { ticket, tasks }),
            ))
        }
        Err(e) => {
            warn!(ticket_id = %ticket.id, error = %e, "Ticket stored but not submitted");
            let status = match e {
                DispatcherError::Configuration(_) => StatusCode::BAD_REQUEST,
                DispatcherError::DuplicateTask { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(api_error(status, e))
        }
    }
}

/// Get a ticket by ID with its progress entries
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket = match state.ticket_store().get(&id) {
        Ok(Some(ticket)) => ticket,
        Ok(None) => {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                format!("Ticket not found: {}", id),
            ))
        }
        Err(e) => return Err(internal_error(e)),
    };

    let progress = state.ticket_store().progress(&id).map_err(internal_error)?;

    Ok(Json(TicketResponse { ticket, progress }))
}

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        filter = filter.with_status(status);
    }

    let tickets = state.ticket_store().list(&filter).map_err(internal_error)?;
    let total = state.ticket_store().count(&filter).map_err(internal_error)?;

    Ok(Json(ListTicketsResponse {
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Live and finished task views for a ticket
pub async fn get_ticket_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketTasksResponse>, ApiError> {
    let tasks = state.dispatcher().tasks_for_ticket(&id).await;

    if tasks.is_empty() {
        match state.ticket_store().get(&id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(api_error(
                    StatusCode::NOT_FOUND,
                    format!("Ticket not found: {}", id),
                ))
            }
            Err(e) => return Err(internal_error(e)),
        }
    }

    Ok(Json(TicketTasksResponse {
        ticket_id: id,
        tasks,
    }))
}
