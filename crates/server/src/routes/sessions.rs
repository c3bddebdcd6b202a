// crates/server/src/routes/sessions.rs
//! Session listing and detail endpoints.

use axum::extract::{Path, State};
use axum::Json;

use agentdeck_types::{SessionDetail, SessionSummary};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.summaries().await)
}

pub async fn session_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionDetail>> {
    state
        .registry
        .detail(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::SessionNotFound(id))
}
