use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Registration, login and the catalog CRUD. Mounted under `/api`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /users/sign-up
        // Creates a `USER` account and its default avatar in one transaction.
        .route("/users/sign-up", post(handlers::sign_up))
        // POST /users/sign-in
        // Returns the user, the active avatar and a one-day bearer token.
        .route("/users/sign-in", post(handlers::sign_in))
        // GET /users?page=&size=
        .route("/users", get(handlers::list_users))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Movies ---
        .route(
            "/movies",
            get(handlers::list_movies).post(handlers::create_movie),
        )
        // DELETE requires an ADMIN token; see `handlers::delete_movie`.
        .route(
            "/movies/{id}",
            get(handlers::get_movie)
                .put(handlers::update_movie)
                .delete(handlers::delete_movie),
        )
        // --- Role catalog ---
        .route(
            "/users-type",
            get(handlers::list_roles).post(handlers::create_role),
        )
}
