mod common;

use axum::http::StatusCode;
use cinema_api::{
    avatar::{get_active_avatar, object_key, public_url, set_active_avatar, validate_upload},
    models::UserRole,
};
use common::InMemoryRepository;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_new_avatar_becomes_the_only_active_one() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user("Bob", "bob@example.com", "pw", UserRole::User);

    let first = set_active_avatar(&repo, user.id, "https://cdn/a.png")
        .await
        .unwrap();
    let second = set_active_avatar(&repo, user.id, "https://cdn/b.png")
        .await
        .unwrap();

    assert!(second.is_active);
    let avatars = repo.avatars_of(user.id);
    assert_eq!(avatars.len(), 2);
    assert_eq!(avatars.iter().filter(|a| a.is_active).count(), 1);
    assert!(!avatars.iter().find(|a| a.id == first.id).unwrap().is_active);

    let active = get_active_avatar(&repo, user.id).await.unwrap().unwrap();
    assert_eq!(active.id, second.id);
    assert_eq!(active.url, "https://cdn/b.png");
}

#[tokio::test]
async fn test_avatars_of_other_users_are_untouched() {
    let repo = InMemoryRepository::new();
    let bob = repo.seed_user("Bob", "bob@example.com", "pw", UserRole::User);
    let eve = repo.seed_user("Eve", "eve@example.com", "pw", UserRole::User);

    set_active_avatar(&repo, eve.id, "https://cdn/eve.png")
        .await
        .unwrap();
    set_active_avatar(&repo, bob.id, "https://cdn/bob.png")
        .await
        .unwrap();

    let eve_active = get_active_avatar(&repo, eve.id).await.unwrap().unwrap();
    assert_eq!(eve_active.url, "https://cdn/eve.png");
}

#[tokio::test]
async fn test_failed_write_keeps_previous_avatar_active() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user("Bob", "bob@example.com", "pw", UserRole::User);
    let original = set_active_avatar(&repo, user.id, "https://cdn/a.png")
        .await
        .unwrap();

    repo.fail_avatar_writes.store(true, Ordering::SeqCst);
    let err = set_active_avatar(&repo, user.id, "https://cdn/b.png")
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let active = get_active_avatar(&repo, user.id).await.unwrap().unwrap();
    assert_eq!(active.id, original.id);
    assert_eq!(repo.avatars_of(user.id).len(), 1);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let repo = InMemoryRepository::new();
    let err = set_active_avatar(&repo, 404, "https://cdn/a.png")
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_url_is_rejected_before_any_write() {
    let repo = InMemoryRepository::new();
    let user = repo.seed_user("Bob", "bob@example.com", "pw", UserRole::User);

    let err = set_active_avatar(&repo, user.id, "  ").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert!(repo.avatars_of(user.id).is_empty());
}

#[test]
fn test_validate_upload() {
    assert!(validate_upload("image/png", 10, 100).is_ok());
    assert!(validate_upload("image/jpeg", 100, 100).is_ok());

    for (content_type, len) in [("text/plain", 10), ("image/png", 0), ("image/png", 101)] {
        let err = validate_upload(content_type, len, 100).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

#[test]
fn test_object_key_keeps_only_a_safe_extension() {
    let key = object_key(5, Some("../../me.PNG"));
    assert!(key.starts_with("avatars/5/"));
    assert!(key.ends_with(".png"));
    assert!(!key.contains(".."));

    assert!(object_key(5, Some("photo")).ends_with(".bin"));
    assert!(object_key(5, Some("x.p/ng")).ends_with(".bin"));
    assert!(object_key(5, None).ends_with(".bin"));
    assert_ne!(object_key(5, None), object_key(5, None));
}

#[test]
fn test_public_url_joins_with_single_slash() {
    assert_eq!(
        public_url("http://cdn/bucket/", "/avatars/1/a.png"),
        "http://cdn/bucket/avatars/1/a.png"
    );
    assert_eq!(
        public_url("http://cdn/bucket", "avatars/1/a.png"),
        "http://cdn/bucket/avatars/1/a.png"
    );
}
