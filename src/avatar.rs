//! Avatar activation policy: every user has at most one active avatar, and the most
//! recently uploaded one wins.

use uuid::Uuid;

use crate::{error::ApiError, models::Avatar, repository::Repository};

/// set_active_avatar
///
/// Records `url` as the user's new avatar and deactivates all others. The repository
/// does both in one transaction, so a failure leaves the previous avatar active.
pub async fn set_active_avatar(
    repo: &dyn Repository,
    user_id: i32,
    url: &str,
) -> Result<Avatar, ApiError> {
    if url.trim().is_empty() {
        return Err(ApiError::validation("avatar url is required"));
    }

    let avatar = repo.replace_active_avatar(user_id, url).await?;
    tracing::info!(user_id, avatar_id = avatar.id, "active avatar replaced");
    Ok(avatar)
}

/// get_active_avatar
///
/// The avatar currently displayed for the user, if any.
pub async fn get_active_avatar(
    repo: &dyn Repository,
    user_id: i32,
) -> Result<Option<Avatar>, ApiError> {
    Ok(repo.get_active_avatar(user_id).await?)
}

/// validate_upload
///
/// Only non-empty images up to `max_bytes` are accepted.
pub fn validate_upload(content_type: &str, len: usize, max_bytes: usize) -> Result<(), ApiError> {
    if !content_type.starts_with("image/") {
        return Err(ApiError::validation(format!(
            "avatar must be an image, got {}",
            content_type
        )));
    }
    if len == 0 {
        return Err(ApiError::validation("avatar file is empty"));
    }
    if len > max_bytes {
        return Err(ApiError::validation(format!(
            "avatar exceeds the {} byte limit",
            max_bytes
        )));
    }
    Ok(())
}

/// object_key
///
/// `avatars/{user_id}/{uuid}.{ext}`. Only the extension of the client filename is kept,
/// and only if it is short and alphanumeric.
pub fn object_key(user_id: i32, filename: Option<&str>) -> String {
    let extension = filename
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), extension)
}

/// public_url
///
/// Joins the public asset base and an object key with exactly one slash.
pub fn public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
