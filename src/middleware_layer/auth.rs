use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    state::AppState,
};

/// Name of the cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session_token";

/// Extracts the session token from the request.
///
/// An `Authorization: Bearer` header wins over the session cookie.
///
/// # Arguments
///
/// * `request` - The incoming request.
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// An `Option` containing the token if one was presented.
pub fn extract_session_token(request: &Request<Body>, cookies: &Cookies) -> Option<String> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
        })
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        cookies
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// A middleware that requires a valid session to be present.
///
/// Validating also renews the session. An unknown or expired token is
/// rejected with 401; a store failure is surfaced as 503 and never treated
/// as a logout.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an `AppError`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_session_token(&request, &cookies).ok_or_else(|| {
        tracing::warn!("❌ No session token presented");
        AppError::Authentication("Missing session token".to_string())
    })?;

    let identity = state
        .sessions
        .validate_and_renew(&token, state.config.session_timeout())
        .await?
        .ok_or_else(|| {
            tracing::warn!("❌ Invalid or expired session token");
            AppError::Authentication("Invalid or expired session".to_string())
        })?;

    tracing::debug!("✅ User authenticated: {}", identity.username);

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
