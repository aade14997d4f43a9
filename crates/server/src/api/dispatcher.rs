//! Dispatcher status API handlers.

use axum::{extract::State, Json};
use std::sync::Arc;
use taskrelay_core::DispatcherStatus;

use crate::state::AppState;

/// Current dispatcher status: task counts and per-pool statistics.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<DispatcherStatus> {
    Json(state.dispatcher().status().await)
}
