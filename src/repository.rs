use crate::models::{
    Avatar, Movie, MovieRequest, NewUser, Role, RoleRequest, Ticket, UpdateUserRequest, User,
};
use crate::pagination::Window;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// RepoError
///
/// Persistence failures, classified at the boundary so callers can tell a duplicate
/// or a dangling reference from a broken database.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("unique constraint {0} violated")]
    Conflict(String),
    #[error("foreign key {0} violated")]
    MissingReference(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return RepoError::Conflict(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return RepoError::MissingReference(constraint);
            }
        }
        RepoError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only see this trait,
/// so tests can swap the Postgres implementation for an in-memory one.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Inserts the user and its first, active avatar in one transaction.
    async fn create_user_with_avatar(
        &self,
        user: NewUser,
        avatar_url: &str,
    ) -> RepoResult<(User, Avatar)>;
    async fn get_user(&self, id: i32) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    // Returns the requested window and the total row count.
    async fn page_users(&self, window: Window) -> RepoResult<(Vec<User>, i64)>;
    // Partial update: `email` / `phone` change only when present.
    async fn update_user(&self, id: i32, changes: UpdateUserRequest) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i32) -> RepoResult<bool>;

    // --- Avatars ---
    /// Creates a new active avatar and deactivates every other avatar of the user,
    /// atomically. Fails with `MissingReference` when the user does not exist.
    async fn replace_active_avatar(&self, user_id: i32, url: &str) -> RepoResult<Avatar>;
    async fn get_active_avatar(&self, user_id: i32) -> RepoResult<Option<Avatar>>;

    // --- Movies ---
    async fn create_movie(&self, movie: MovieRequest) -> RepoResult<Movie>;
    async fn get_movie(&self, id: i32) -> RepoResult<Option<Movie>>;
    async fn list_movies(&self) -> RepoResult<Vec<Movie>>;
    async fn page_movies(&self, window: Window) -> RepoResult<(Vec<Movie>, i64)>;
    async fn update_movie(&self, id: i32, movie: MovieRequest) -> RepoResult<Option<Movie>>;
    async fn delete_movie(&self, id: i32) -> RepoResult<bool>;

    // --- Role catalog ---
    async fn create_role(&self, role: RoleRequest) -> RepoResult<Role>;
    async fn list_roles(&self) -> RepoResult<Vec<Role>>;

    // --- Tickets ---
    async fn create_ticket(&self, movie_id: i32, user_id: i32) -> RepoResult<Ticket>;
    /// Distinct movies the user holds at least one ticket for.
    async fn get_ticketed_movies(&self, user_id: i32) -> RepoResult<Vec<Movie>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, name, phone, email, password, role, created_at, updated_at";
const AVATAR_COLUMNS: &str = "id, user_id, url, is_active, created_at, updated_at";
const MOVIE_COLUMNS: &str =
    "id, name, trailer, poster, description, start_time, evaluate, created_at, updated_at";
const ROLE_COLUMNS: &str = "id, rolename, type, created_at, updated_at";
const TICKET_COLUMNS: &str = "id, movie_id, user_id, created_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Queries are built at runtime
/// with `sqlx::query_as`, so the crate builds without a reachable database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user_with_avatar
    ///
    /// Sign-up must never leave a user without its default avatar, so both inserts
    /// share one transaction.
    async fn create_user_with_avatar(
        &self,
        user: NewUser,
        avatar_url: &str,
    ) -> RepoResult<(User, Avatar)> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, phone, email, password, role) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            "INSERT INTO avatars (user_id, url, is_active) VALUES ($1, $2, TRUE) RETURNING {AVATAR_COLUMNS}"
        ))
        .bind(created.id)
        .bind(avatar_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((created, avatar))
    }

    async fn get_user(&self, id: i32) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn page_users(&self, window: Window) -> RepoResult<(Vec<User>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((users, total))
    }

    /// update_user
    ///
    /// Uses `COALESCE` so that `None` fields keep the stored value.
    async fn update_user(&self, id: i32, changes: UpdateUserRequest) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = $2,
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: i32) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// replace_active_avatar
    ///
    /// The user row is locked first so that concurrent uploads for the same user run one
    /// after the other; the deactivate-then-insert pair commits as a unit.
    async fn replace_active_avatar(&self, user_id: i32, url: &str) -> RepoResult<Avatar> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(RepoError::MissingReference("avatars_user_id_fkey".to_string()));
        }

        sqlx::query(
            "UPDATE avatars SET is_active = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            "INSERT INTO avatars (user_id, url, is_active) VALUES ($1, $2, TRUE) RETURNING {AVATAR_COLUMNS}"
        ))
        .bind(user_id)
        .bind(url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(avatar)
    }

    async fn get_active_avatar(&self, user_id: i32) -> RepoResult<Option<Avatar>> {
        let avatar = sqlx::query_as::<_, Avatar>(&format!(
            "SELECT {AVATAR_COLUMNS} FROM avatars WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(avatar)
    }

    // --- MOVIES ---

    async fn create_movie(&self, movie: MovieRequest) -> RepoResult<Movie> {
        let created = sqlx::query_as::<_, Movie>(&format!(
            r#"
            INSERT INTO movies (name, trailer, poster, description, start_time, evaluate)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MOVIE_COLUMNS}
            "#
        ))
        .bind(&movie.name)
        .bind(&movie.trailer)
        .bind(&movie.poster)
        .bind(&movie.description)
        .bind(movie.start_time)
        .bind(movie.evaluate)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_movie(&self, id: i32) -> RepoResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn list_movies(&self) -> RepoResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn page_movies(&self, window: Window) -> RepoResult<(Vec<Movie>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await?;
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((movies, total))
    }

    async fn update_movie(&self, id: i32, movie: MovieRequest) -> RepoResult<Option<Movie>> {
        let updated = sqlx::query_as::<_, Movie>(&format!(
            r#"
            UPDATE movies
            SET name = $2,
                trailer = COALESCE($3, trailer),
                poster = COALESCE($4, poster),
                description = COALESCE($5, description),
                start_time = COALESCE($6, start_time),
                evaluate = COALESCE($7, evaluate),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MOVIE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&movie.name)
        .bind(&movie.trailer)
        .bind(&movie.poster)
        .bind(&movie.description)
        .bind(movie.start_time)
        .bind(movie.evaluate)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_movie(&self, id: i32) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- ROLE CATALOG ---

    async fn create_role(&self, role: RoleRequest) -> RepoResult<Role> {
        let created = sqlx::query_as::<_, Role>(&format!(
            "INSERT INTO roles (rolename, type) VALUES ($1, $2) RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&role.rolename)
        .bind(&role.role_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    // --- TICKETS ---

    async fn create_ticket(&self, movie_id: i32, user_id: i32) -> RepoResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "INSERT INTO tickets (movie_id, user_id) VALUES ($1, $2) RETURNING {TICKET_COLUMNS}"
        ))
        .bind(movie_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn get_ticketed_movies(&self, user_id: i32) -> RepoResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            r#"
            SELECT {MOVIE_COLUMNS}
            FROM movies
            WHERE id IN (SELECT movie_id FROM tickets WHERE user_id = $1)
            ORDER BY id
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }
}
