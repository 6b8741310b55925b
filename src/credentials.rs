use std::time::{SystemTime, UNIX_EPOCH};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::thread_rng;
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::ApiError};

/// Claims
///
/// Payload of an issued bearer token. `sub` carries the user id as a string, as the
/// JWT registered claim requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    /// Parses the subject back into a user id.
    pub fn user_id(&self) -> Result<i32, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }
}

/// TokenError
///
/// `Expired` and `Invalid` are both "invalid token" outcomes for the caller; they stay
/// apart so the log says which one happened.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or has a bad signature")]
    Invalid,
    #[error("token could not be signed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// hash_password
///
/// Salted argon2id hash in PHC string format. A fresh salt is drawn for every call, so
/// hashing the same plaintext twice never yields the same string.
pub fn hash_password(plaintext: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut thread_rng());
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("password hashing failed: {err}")))
}

/// verify_password
///
/// Returns false on any mismatch, including a stored hash that does not parse.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!("stored password hash is unreadable: {}", err);
            false
        }
    }
}

pub fn now_unix() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as usize)
        .unwrap_or(0)
}

/// CredentialCodec
///
/// Signs and verifies bearer tokens with a server-held HMAC secret. Built once from
/// `AppConfig` at startup and shared through `AppState`.
#[derive(Clone)]
pub struct CredentialCodec {
    enc: EncodingKey,
    dec: DecodingKey,
    ttl_secs: usize,
}

impl CredentialCodec {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
            ttl_secs: ttl_secs as usize,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.token_ttl_secs)
    }

    pub fn ttl_secs(&self) -> usize {
        self.ttl_secs
    }

    /// Issues a token for `user_id` that expires `ttl` seconds from now.
    pub fn issue_token(&self, user_id: i32) -> Result<String, TokenError> {
        self.issue_token_at(user_id, now_unix())
    }

    /// Issues a token as if the current time were `issued_at`.
    pub fn issue_token_at(&self, user_id: i32, issued_at: usize) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".into());

        encode(&header, &claims, &self.enc).map_err(TokenError::Encoding)
    }

    /// verify_token
    ///
    /// Checks signature, algorithm and expiry (no leeway). Does not consult the user
    /// store: a valid token for a deleted user still verifies here.
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &self.dec, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }
}
