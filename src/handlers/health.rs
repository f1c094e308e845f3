use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Session limits currently in force.
#[derive(Serialize)]
pub struct SessionSettings {
    pub max_sessions_per_user: u32,
    pub session_timeout_minutes: i64,
}

pub async fn session_settings(State(state): State<AppState>) -> Json<SessionSettings> {
    Json(SessionSettings {
        max_sessions_per_user: state.config.max_sessions_per_user,
        session_timeout_minutes: state.config.session_timeout_minutes,
    })
}
