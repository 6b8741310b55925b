use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    credentials::CredentialCodec,
    error::ApiError,
    models::{User, UserRole},
    repository::RepositoryState,
};

/// AuthUser
///
/// The identity of an authenticated request: the full user record resolved from the
/// bearer token. It only exists for the duration of one request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.0.id
    }

    pub fn role(&self) -> UserRole {
        self.0.role
    }

    /// Strict equality; an admin does not satisfy a `User` check.
    pub fn has_role(&self, required: UserRole) -> bool {
        self.0.role == required
    }
}

/// authorize
///
/// Role gate for handlers, called with the identity produced by the extractor.
/// Strict equality; a mismatch is a 403.
pub fn authorize(identity: &AuthUser, required: UserRole) -> Result<(), ApiError> {
    if identity.has_role(required) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = identity.id(),
            role = %identity.role(),
            required = %required,
            "role check failed"
        );
        Err(ApiError::forbidden("Can't access"))
    }
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument; when extraction fails the handler
/// body never runs.
///
/// 0. Reuse: an identity already resolved by `auth_middleware` is taken from the
///    request extensions as is.
/// 1. Token Extraction: `Authorization: Bearer <token>`.
/// 2. Token Verification: signature and expiry through the `CredentialCodec`.
/// 3. DB Lookup: the user must still exist.
///
/// Rejection: `ApiError::Unauthenticated` (401); a store failure during the lookup is a
/// 500.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    CredentialCodec: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<AuthUser>() {
            return Ok(identity.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let codec = CredentialCodec::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("missing Authorization header");
                ApiError::unauthenticated("missing bearer token")
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                tracing::warn!("malformed Authorization header");
                ApiError::unauthenticated("malformed Authorization header")
            })?;

        let claims = codec.verify_token(token).map_err(|e| {
            tracing::warn!("token rejected: {}", e);
            ApiError::from(e)
        })?;
        let user_id = claims.user_id()?;

        // A token outlives its user when the account is deleted before expiry.
        let user = repo.get_user(user_id).await?.ok_or_else(|| {
            tracing::warn!(user_id, "token subject no longer exists");
            ApiError::unauthenticated("unknown user")
        })?;

        Ok(AuthUser(user))
    }
}
