use super::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /sessions
/// List persisted session summaries, most recent first
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!("Failed to list sessions: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to list sessions: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /sessions/:id
/// Fetch one session summary
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.get(id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", id),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to fetch session {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to fetch session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
