use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the application router.
///
/// Transport concerns that need a real socket (CORS, per-IP rate limiting)
/// are layered on in `main`.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/logout-all", post(handlers::auth::logout_all))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/sessions", get(handlers::auth::list_sessions))
        .route(
            "/api/auth/sessions/{session_id}",
            delete(handlers::auth::revoke_session),
        )
        .route(
            "/api/config/sessions",
            get(handlers::health::session_settings),
        )
        .route(
            "/api/admin/sessions",
            get(handlers::admin::list_all_sessions),
        )
        .route(
            "/api/admin/sessions/cleanup",
            post(handlers::admin::cleanup_expired),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
