use crate::{
    AppState,
    auth::{AuthUser, authorize},
    avatar,
    credentials::{hash_password, verify_password},
    error::{ApiError, ErrorBody},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        Avatar, Movie, MovieRequest, NewUser, Role, RoleRequest, SignInRequest, SignInResponse,
        SignUpRequest, SignUpResponse, Ticket, UpdateUserRequest, User, UserEnvelope, UserRole,
    },
    pagination::{Listing, PageQuery, build_page_result},
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};

/// Name of the multipart field carrying the avatar image.
pub const AVATAR_FIELD: &str = "avatar";

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(())
}

// --- Users: registration & login ---

/// sign_up
///
/// [Public Route] Registers a user with role `USER` and the default avatar.
/// The user row and its avatar are created in a single transaction.
#[utoipa::path(
    post,
    path = "/api/users/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Registered", body = SignUpResponse),
        (status = 400, description = "Missing field", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignUpRequest>,
) -> Result<Json<SignUpResponse>, ApiError> {
    require(&payload.name, "name")?;
    require(&payload.email, "email")?;
    require(&payload.password, "password")?;

    let email = payload.email.trim().to_string();
    if state.repo.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict(format!("email {} is already registered", email)));
    }

    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email,
        phone: payload.phone,
        password_hash: hash_password(&payload.password)?,
        role: UserRole::User,
    };

    let (user, avatar) = state
        .repo
        .create_user_with_avatar(new_user, &state.config.default_avatar_url)
        .await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok(Json(SignUpResponse { user, avatar }))
}

/// sign_in
///
/// [Public Route] Exchanges email + password for a bearer token valid for the
/// configured TTL. Unknown email and wrong password produce the same 400 answer.
#[utoipa::path(
    post,
    path = "/api/users/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 400, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    let invalid = || ApiError::validation("invalid email or password");

    let user = state
        .repo
        .get_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "sign-in with wrong password");
        return Err(invalid());
    }

    let token = state.codec.issue_token(user.id)?;
    let avatar = avatar::get_active_avatar(state.repo.as_ref(), user.id).await?;

    tracing::info!(user_id = user.id, "user signed in");
    Ok(Json(SignInResponse {
        user,
        avatar,
        token,
    }))
}

// --- Users: CRUD ---

/// list_users
///
/// [Public Route] `?page=&size=` returns `{totalPages, content}`; without parameters
/// the full list is returned as an array.
#[utoipa::path(
    get,
    path = "/api/users",
    params(PageQuery),
    responses(
        (status = 200, description = "Users (array, or page envelope when paging)", body = [User]),
        (status = 400, description = "Invalid paging parameters", body = ErrorBody)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Listing<User>>, ApiError> {
    match query.window()? {
        Some(window) => {
            let (users, total) = state.repo.page_users(window).await?;
            Ok(Json(Listing::Page(build_page_result(
                total,
                window.limit,
                users,
            ))))
        }
        None => Ok(Json(Listing::All(state.repo.list_users().await?))),
    }
}

/// get_user
///
/// [Public Route] Returns `{user}` for an existing id.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserEnvelope),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<UserEnvelope>, ApiError> {
    match state.repo.get_user(id).await? {
        Some(user) => Ok(Json(UserEnvelope { user })),
        None => Err(ApiError::not_found(format!("user id {} is not exist", id))),
    }
}

/// update_user
///
/// [Public Route] Existence is checked before the payload is validated, so an unknown
/// id is always a 404.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Name missing", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(mut payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let not_found = || ApiError::not_found(format!("user id {} is not exist", id));

    if state.repo.get_user(id).await?.is_none() {
        return Err(not_found());
    }

    require(&payload.name, "name")?;
    if let Some(email) = payload.email.as_deref() {
        require(email, "email")?;
    }
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.map(|email| email.trim().to_string());

    state
        .repo
        .update_user(id, payload)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// delete_user
///
/// [Public Route] Removes the user; avatars and tickets go with it (cascade).
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_user(id).await? {
        tracing::info!(user_id = id, "user deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("user id {} is not exist", id)))
    }
}

// --- Users: authenticated actions ---

/// upload_avatar
///
/// [Authenticated Route] Accepts a multipart body with an image in the `avatar` field,
/// stores it and makes it the caller's only active avatar.
#[utoipa::path(
    post,
    path = "/api/users/avatar",
    request_body(content = String, content_type = "multipart/form-data", description = "Image file in the `avatar` field"),
    responses(
        (status = 200, description = "New active avatar", body = Avatar),
        (status = 400, description = "Missing or invalid file", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn upload_avatar(
    identity: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Avatar>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("could not read avatar: {}", e)))?;
        upload = Some((content_type, filename, bytes));
        break;
    }

    let (content_type, filename, bytes) =
        upload.ok_or_else(|| ApiError::validation("avatar file is required"))?;
    avatar::validate_upload(&content_type, bytes.len(), state.config.max_avatar_bytes)?;

    let key = avatar::object_key(identity.id(), filename.as_deref());
    let stored_key = state
        .storage
        .put_object(&key, &content_type, bytes.to_vec())
        .await?;
    let url = avatar::public_url(&state.config.public_asset_url, &stored_key);

    let avatar = match avatar::set_active_avatar(state.repo.as_ref(), identity.id(), &url).await {
        Ok(avatar) => avatar,
        Err(e) => {
            // No avatar row references the uploaded object.
            if let Err(cleanup) = state.storage.delete_object(&stored_key).await {
                tracing::warn!(key = %stored_key, "orphaned avatar object left behind: {}", cleanup);
            }
            return Err(e);
        }
    };
    Ok(Json(avatar))
}

/// buy_ticket
///
/// [Authenticated Route] Records a ticket purchase for the caller.
#[utoipa::path(
    post,
    path = "/api/users/ticket/{movie_id}",
    params(("movie_id" = i32, Path, description = "Movie ID")),
    responses(
        (status = 200, description = "Ticket created", body = Ticket),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Movie not found", body = ErrorBody)
    )
)]
pub async fn buy_ticket(
    identity: AuthUser,
    State(state): State<AppState>,
    ApiPath(movie_id): ApiPath<i32>,
) -> Result<Json<Ticket>, ApiError> {
    if state.repo.get_movie(movie_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Movie id {} is not exist", movie_id)));
    }

    let ticket = state.repo.create_ticket(movie_id, identity.id()).await?;
    tracing::info!(user_id = identity.id(), movie_id, ticket_id = ticket.id, "ticket purchased");
    Ok(Json(ticket))
}

/// get_history
///
/// [Authenticated Route] Movies the caller holds tickets for.
#[utoipa::path(
    get,
    path = "/api/users/history",
    responses(
        (status = 200, description = "Ticketed movies", body = [Movie]),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn get_history(
    identity: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    Ok(Json(state.repo.get_ticketed_movies(identity.id()).await?))
}

// --- Movies ---

#[utoipa::path(
    post,
    path = "/api/movies",
    request_body = MovieRequest,
    responses(
        (status = 200, description = "Created", body = Movie),
        (status = 400, description = "Name missing", body = ErrorBody)
    )
)]
pub async fn create_movie(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<MovieRequest>,
) -> Result<Json<Movie>, ApiError> {
    require(&payload.name, "name")?;
    payload.name = payload.name.trim().to_string();

    let movie = state.repo.create_movie(payload).await?;
    tracing::info!(movie_id = movie.id, "movie created");
    Ok(Json(movie))
}

#[utoipa::path(
    get,
    path = "/api/movies/{id}",
    params(("id" = i32, Path, description = "Movie ID")),
    responses(
        (status = 200, description = "Found", body = Movie),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_movie(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Movie>, ApiError> {
    state
        .repo
        .get_movie(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Movie id {} is not exist", id)))
}

/// update_movie
///
/// [Public Route] `name` is replaced; absent optional fields keep their value.
#[utoipa::path(
    put,
    path = "/api/movies/{id}",
    params(("id" = i32, Path, description = "Movie ID")),
    request_body = MovieRequest,
    responses(
        (status = 200, description = "Updated", body = Movie),
        (status = 400, description = "Name missing", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_movie(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(mut payload): ApiJson<MovieRequest>,
) -> Result<Json<Movie>, ApiError> {
    require(&payload.name, "name")?;
    payload.name = payload.name.trim().to_string();

    state
        .repo
        .update_movie(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Movie id {} is not exist", id)))
}

/// delete_movie
///
/// [Admin Route] Authentication happens in the `AuthUser` extractor, before this body
/// runs; the role check is the first statement.
#[utoipa::path(
    delete,
    path = "/api/movies/{id}",
    params(("id" = i32, Path, description = "Movie ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_movie(
    identity: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    authorize(&identity, UserRole::Admin)?;

    if state.repo.delete_movie(id).await? {
        tracing::info!(movie_id = id, admin_id = identity.id(), "movie deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Movie id {} is not exist", id)))
    }
}

#[utoipa::path(
    get,
    path = "/api/movies",
    params(PageQuery),
    responses(
        (status = 200, description = "Movies (array, or page envelope when paging)", body = [Movie]),
        (status = 400, description = "Invalid paging parameters", body = ErrorBody)
    )
)]
pub async fn list_movies(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Listing<Movie>>, ApiError> {
    match query.window()? {
        Some(window) => {
            let (movies, total) = state.repo.page_movies(window).await?;
            Ok(Json(Listing::Page(build_page_result(
                total,
                window.limit,
                movies,
            ))))
        }
        None => Ok(Json(Listing::All(state.repo.list_movies().await?))),
    }
}

// --- Role catalog ---

#[utoipa::path(
    post,
    path = "/api/users-type",
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Created", body = Role),
        (status = 400, description = "Missing field", body = ErrorBody)
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> Result<Json<Role>, ApiError> {
    require(&payload.rolename, "rolename")?;
    require(&payload.role_type, "type")?;
    Ok(Json(state.repo.create_role(payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/users-type",
    responses((status = 200, description = "All user types", body = [Role]))
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.repo.list_roles().await?))
}
