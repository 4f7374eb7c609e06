use crate::{AppState, handlers};
use axum::{Router, routing::{get, post}};

/// Authenticated Router Module
///
/// Endpoints open to any authenticated caller, whatever the role. The
/// filter endpoint is the one read path the Guest policy row allows; its
/// handler still runs the authorizer with `Operation::Search`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // POST /api/logout/
        // Destroys the caller's session.
        .route("/api/logout/", post(handlers::logout))
        // GET /api/person/filter-people/?first_name=&last_name=&age=&page=
        // Conjunctive search over people, paginated, username redacted.
        .route("/api/person/filter-people/", get(handlers::filter_people))
}
