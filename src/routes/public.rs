use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: the liveness probe and the login gateway.
/// Everything else in the API sits behind the authentication layer.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Monitoring/load-balancer probe, returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // POST /api/login/
        // Credential check and session establishment.
        .route("/api/login/", post(handlers::login))
}
