#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use cinema_api::{
    AppConfig, AppState, CredentialCodec,
    credentials::hash_password,
    models::{
        Avatar, Movie, MovieRequest, NewUser, Role, RoleRequest, Ticket, UpdateUserRequest, User,
        UserRole,
    },
    pagination::Window,
    repository::{RepoError, RepoResult, Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

// --- In-memory Repository ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    avatars: Vec<Avatar>,
    movies: Vec<Movie>,
    roles: Vec<Role>,
    tickets: Vec<Ticket>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Repository backed by plain vectors. Enforces the same constraints the schema does
/// (unique email, foreign keys, one active avatar) so handler tests see realistic
/// errors.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    /// When set, every avatar write fails before touching any row.
    pub fail_avatar_writes: AtomicBool,
    /// Number of `get_user` calls served.
    pub user_lookups: AtomicUsize,
}

fn window_of<T: Clone>(rows: &[T], window: Window) -> Vec<T> {
    rows.iter()
        .skip(window.offset as usize)
        .take(window.limit as usize)
        .cloned()
        .collect()
}

fn simulated_failure() -> RepoError {
    RepoError::Database(sqlx::Error::PoolTimedOut)
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, name: &str, email: &str, password: &str, role: UserRole) -> User {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            name: name.to_string(),
            phone: None,
            email: email.to_string(),
            password_hash: hash_password(password).unwrap(),
            role,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn seed_movie(&self, name: &str) -> Movie {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let movie = Movie {
            id: tables.next_id(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            ..Movie::default()
        };
        tables.movies.push(movie.clone());
        movie
    }

    pub fn avatars_of(&self, user_id: i32) -> Vec<Avatar> {
        let tables = self.tables.lock().unwrap();
        tables
            .avatars
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn movie(&self, id: i32) -> Option<Movie> {
        let tables = self.tables.lock().unwrap();
        tables.movies.iter().find(|m| m.id == id).cloned()
    }

    pub fn tickets_of(&self, user_id: i32) -> Vec<Ticket> {
        let tables = self.tables.lock().unwrap();
        tables
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user_with_avatar(
        &self,
        user: NewUser,
        avatar_url: &str,
    ) -> RepoResult<(User, Avatar)> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict("users_email_key".into()));
        }
        if self.fail_avatar_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }

        let now = Utc::now();
        let created = User {
            id: tables.next_id(),
            name: user.name,
            phone: user.phone,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        let avatar = Avatar {
            id: tables.next_id(),
            user_id: created.id,
            url: avatar_url.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        tables.avatars.push(avatar.clone());
        Ok((created, avatar))
    }

    async fn get_user(&self, id: i32) -> RepoResult<Option<User>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.tables.lock().unwrap().users.clone())
    }

    async fn page_users(&self, window: Window) -> RepoResult<(Vec<User>, i64)> {
        let tables = self.tables.lock().unwrap();
        Ok((
            window_of(&tables.users, window),
            tables.users.len() as i64,
        ))
    }

    async fn update_user(&self, id: i32, changes: UpdateUserRequest) -> RepoResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(email) = &changes.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::Conflict("users_email_key".into()));
            }
        }
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.name = changes.name;
            if let Some(email) = changes.email {
                user.email = email;
            }
            if let Some(phone) = changes.phone {
                user.phone = Some(phone);
            }
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i32) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.avatars.retain(|a| a.user_id != id);
        tables.tickets.retain(|t| t.user_id != id);
        Ok(true)
    }

    async fn replace_active_avatar(&self, user_id: i32, url: &str) -> RepoResult<Avatar> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(RepoError::MissingReference("avatars_user_id_fkey".into()));
        }
        if self.fail_avatar_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }

        let now = Utc::now();
        for avatar in tables.avatars.iter_mut().filter(|a| a.user_id == user_id) {
            avatar.is_active = false;
            avatar.updated_at = now;
        }
        let avatar = Avatar {
            id: tables.next_id(),
            user_id,
            url: url.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.avatars.push(avatar.clone());
        Ok(avatar)
    }

    async fn get_active_avatar(&self, user_id: i32) -> RepoResult<Option<Avatar>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .avatars
            .iter()
            .find(|a| a.user_id == user_id && a.is_active)
            .cloned())
    }

    async fn create_movie(&self, movie: MovieRequest) -> RepoResult<Movie> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let created = Movie {
            id: tables.next_id(),
            name: movie.name,
            trailer: movie.trailer,
            poster: movie.poster,
            description: movie.description,
            start_time: movie.start_time,
            evaluate: movie.evaluate,
            created_at: now,
            updated_at: now,
        };
        tables.movies.push(created.clone());
        Ok(created)
    }

    async fn get_movie(&self, id: i32) -> RepoResult<Option<Movie>> {
        Ok(self.movie(id))
    }

    async fn list_movies(&self) -> RepoResult<Vec<Movie>> {
        Ok(self.tables.lock().unwrap().movies.clone())
    }

    async fn page_movies(&self, window: Window) -> RepoResult<(Vec<Movie>, i64)> {
        let tables = self.tables.lock().unwrap();
        Ok((
            window_of(&tables.movies, window),
            tables.movies.len() as i64,
        ))
    }

    async fn update_movie(&self, id: i32, changes: MovieRequest) -> RepoResult<Option<Movie>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.movies.iter_mut().find(|m| m.id == id).map(|movie| {
            movie.name = changes.name;
            movie.trailer = changes.trailer.or(movie.trailer.take());
            movie.poster = changes.poster.or(movie.poster.take());
            movie.description = changes.description.or(movie.description.take());
            movie.start_time = changes.start_time.or(movie.start_time);
            movie.evaluate = changes.evaluate.or(movie.evaluate);
            movie.updated_at = Utc::now();
            movie.clone()
        }))
    }

    async fn delete_movie(&self, id: i32) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.movies.len();
        tables.movies.retain(|m| m.id != id);
        let deleted = tables.movies.len() != before;
        if deleted {
            tables.tickets.retain(|t| t.movie_id != id);
        }
        Ok(deleted)
    }

    async fn create_role(&self, role: RoleRequest) -> RepoResult<Role> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let created = Role {
            id: tables.next_id(),
            rolename: role.rolename,
            role_type: role.role_type,
            created_at: now,
            updated_at: now,
        };
        tables.roles.push(created.clone());
        Ok(created)
    }

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        Ok(self.tables.lock().unwrap().roles.clone())
    }

    async fn create_ticket(&self, movie_id: i32, user_id: i32) -> RepoResult<Ticket> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.movies.iter().any(|m| m.id == movie_id) {
            return Err(RepoError::MissingReference("tickets_movie_id_fkey".into()));
        }
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(RepoError::MissingReference("tickets_user_id_fkey".into()));
        }
        let ticket = Ticket {
            id: tables.next_id(),
            movie_id,
            user_id,
            created_at: Utc::now(),
        };
        tables.tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn get_ticketed_movies(&self, user_id: i32) -> RepoResult<Vec<Movie>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .movies
            .iter()
            .filter(|m| {
                tables
                    .tickets
                    .iter()
                    .any(|t| t.user_id == user_id && t.movie_id == m.id)
            })
            .cloned()
            .collect())
    }
}

// --- App State Helpers ---

pub fn test_state(repo: Arc<InMemoryRepository>) -> AppState {
    test_state_with_storage(repo, Arc::new(MockStorageService::new()))
}

pub fn test_state_with_storage(repo: Arc<InMemoryRepository>, storage: StorageState) -> AppState {
    let config = AppConfig::default();
    let codec = CredentialCodec::from_config(&config);
    AppState {
        repo: repo as RepositoryState,
        storage,
        config,
        codec,
    }
}

/// Bearer header value for `user_id`, signed with the test configuration's secret.
pub fn bearer_for(state: &AppState, user_id: i32) -> String {
    format!("Bearer {}", state.codec.issue_token(user_id).unwrap())
}
