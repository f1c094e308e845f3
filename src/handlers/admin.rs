use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{
    error::Result,
    handlers::auth::SessionView,
    models::session::SessionIdentity,
    state::AppState,
};

/// Scope that unlocks the cross-user session endpoints.
pub const SESSIONS_ADMIN_SCOPE: &str = "sessions:admin";

#[derive(Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

/// Lists every stored session across all users.
pub async fn list_all_sessions(
    State(state): State<AppState>,
    Extension(identity): Extension<SessionIdentity>,
) -> Result<Json<Vec<SessionView>>> {
    identity.require_scope(SESSIONS_ADMIN_SCOPE)?;

    let sessions = state
        .sessions
        .list_sessions(None)
        .await?
        .into_iter()
        .map(|s| SessionView::from_session(s, Some(identity.session_id.as_str())))
        .collect();

    Ok(Json(sessions))
}

/// Runs an expiration sweep now, outside the regular schedule.
pub async fn cleanup_expired(
    State(state): State<AppState>,
    Extension(identity): Extension<SessionIdentity>,
) -> Result<Json<CleanupResponse>> {
    identity.require_scope(SESSIONS_ADMIN_SCOPE)?;

    let removed = state
        .sessions
        .sweep_expired(state.config.session_timeout())
        .await?;
    tracing::info!("🧹 On-demand cleanup by {}: {} removed", identity.username, removed);

    Ok(Json(CleanupResponse { removed }))
}
