use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::SESSION_COOKIE,
    models::session::{Session, SessionIdentity},
    services::auth as auth_service,
    state::AppState,
    validation::auth::validate_username,
};

/// The request payload for user login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by a successful login.
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Idle seconds before the token stops working.
    pub expires_in: i64,
}

/// The response payload for logout requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_closed: Option<u64>,
}

/// A session as shown to its owner.
#[derive(Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub scopes: Vec<String>,
    /// Whether this is the session making the request.
    pub current: bool,
}

impl SessionView {
    pub fn from_session(session: Session, current_id: Option<&str>) -> Self {
        let current = current_id == Some(session.session_id.as_str());
        Self {
            session_id: session.session_id,
            username: session.username,
            created_at: session.created_at,
            last_activity: session.last_activity,
            scopes: session.scopes,
            current,
        }
    }
}

/// Creates the session cookie. Its lifetime mirrors the idle timeout; the
/// server side remains authoritative.
fn create_session_cookie(value: String, max_age_minutes: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::minutes(max_age_minutes));
    cookie.set_path("/");
    cookie
}

fn clear_session_cookie(cookies: &Cookies) {
    let mut session_cookie = Cookie::new(SESSION_COOKIE, "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.username);
    validate_username(&payload.username)?;

    if !auth_service::verify_credentials(&state.config, &payload.username, &payload.password)? {
        return Err(AppError::Authentication("Invalid credentials".to_string()));
    }

    let token = state
        .sessions
        .create(&payload.username, &state.config.api_scopes)
        .await?;

    cookies.add(create_session_cookie(
        token.clone(),
        state.config.session_timeout_minutes,
        state.config.production,
    ));

    tracing::info!("✅ User logged in: {}", payload.username);

    let response = TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        expires_in: state.config.session_timeout().num_seconds(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<SessionIdentity>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", identity.username);

    state.sessions.invalidate(&identity.session_id).await?;
    clear_session_cookie(&cookies);

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
        sessions_closed: None,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Ends every session of the caller, including the current one.
#[axum::debug_handler]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(identity): Extension<SessionIdentity>,
    cookies: Cookies,
) -> Result<Response> {
    let closed = state.sessions.invalidate_all(&identity.username).await?;
    clear_session_cookie(&cookies);

    let response = AuthResponse {
        success: true,
        message: "All sessions closed".to_string(),
        sessions_closed: Some(closed),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the identity behind the presented token.
#[axum::debug_handler]
pub async fn me(Extension(identity): Extension<SessionIdentity>) -> Json<SessionIdentity> {
    Json(identity)
}

/// Lists the caller's own sessions.
#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(identity): Extension<SessionIdentity>,
) -> Result<Json<Vec<SessionView>>> {
    let sessions = state
        .sessions
        .list_sessions(Some(identity.username.as_str()))
        .await?
        .into_iter()
        .map(|s| SessionView::from_session(s, Some(identity.session_id.as_str())))
        .collect();

    Ok(Json(sessions))
}

/// Revokes one of the caller's sessions.
///
/// A session belonging to someone else is reported as not found.
#[axum::debug_handler]
pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(identity): Extension<SessionIdentity>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let owned = state
        .sessions
        .list_sessions(Some(identity.username.as_str()))
        .await?
        .iter()
        .any(|s| s.session_id == session_id);

    if !owned || !state.sessions.invalidate(&session_id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!("✅ Session revoked by owner: {}", identity.username);

    let response = AuthResponse {
        success: true,
        message: "Session revoked".to_string(),
        sessions_closed: Some(1),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
