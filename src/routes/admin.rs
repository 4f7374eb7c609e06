use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// The person CRUD surface. The authentication layer above this router
/// guarantees a resolved identity; each handler then asks the authorizer
/// for its specific operation, which the Guest policy row denies.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/person/ (list, paginated) and POST /api/person/ (create).
        .route(
            "/api/person/",
            get(handlers::list_people).post(handlers::create_person),
        )
        // GET/PATCH/DELETE /api/person/{id}/
        .route(
            "/api/person/{id}/",
            get(handlers::get_person)
                .patch(handlers::update_person)
                .delete(handlers::delete_person),
        )
}
