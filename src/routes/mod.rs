mod health;
mod live;
mod sessions;

use axum::Router;

use crate::state::AppState;

/// Build the complete application router.
///
/// Structure:
/// - `GET /health` — lightweight health check (used by the platform)
/// - `GET /api/v1/health` — detailed health check with database connectivity
/// - `GET /api/v1/sessions/{sessionId}` — session snapshot (live or persisted)
/// - `GET /api/v1/live` — `WebSocket` endpoint for the live quiz protocol
pub fn router() -> Router<AppState> {
    let api_v1 = Router::new()
        .merge(health::api_router())
        .merge(sessions::router())
        .merge(live::router());

    Router::new()
        .merge(health::root_router())
        .nest("/api/v1", api_v1)
}
