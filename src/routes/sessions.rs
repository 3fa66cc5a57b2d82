use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::live::LiveError;
use crate::state::AppState;

/// Build the session route group: `/sessions/...`
pub fn router() -> Router<AppState> {
    Router::new().route("/sessions/{session_id}", get(get_session))
}

/// `GET /api/v1/sessions/{sessionId}` — Read a session snapshot.
///
/// Serves live in-memory state while the session runs and falls back to the
/// persisted record once it has ended.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    match state.live.snapshot(session_id).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(LiveError::NotFound(msg)) => Err(AppError::NotFound(msg)),
        Err(LiveError::Validation(msg)) => Err(AppError::BadRequest(msg)),
        Err(LiveError::Unauthorized(msg)) => Err(AppError::Unauthorized(msg)),
        Err(LiveError::Internal(err)) => Err(AppError::Internal(err)),
    }
}
