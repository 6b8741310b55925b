use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Actions a signed-in user performs on their own account. The `auth_middleware` layer
/// added in `create_router` rejects the request before any handler here runs, and each
/// handler takes the caller from its `AuthUser` argument rather than from the path.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /users/avatar
        // Multipart upload; the new image becomes the only active avatar.
        .route("/users/avatar", post(handlers::upload_avatar))
        // POST /users/ticket/{movie_id}
        .route("/users/ticket/{movie_id}", post(handlers::buy_ticket))
        // GET /users/history
        // Movies the caller holds tickets for.
        .route("/users/history", get(handlers::get_history))
}
