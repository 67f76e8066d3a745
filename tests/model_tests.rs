//! Repository-level tests against an in-memory SQLite database.

mod common;

use common::{create_message, create_user, test_pool, PASSWORD};
use warbler::db::messages::FEED_LIMIT;
use warbler::db::{
    FollowRepository, LikeRepository, MessageRepository, NewUser, ProfileUpdate,
    SessionRepository, UserRepository,
};
use warbler::error::AppError;

#[tokio::test]
async fn test_new_user_has_no_messages_or_followers() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let mut conn = pool.acquire().await.unwrap();

    assert_eq!(MessageRepository::count_by_user(&mut conn, u1.id).await.unwrap(), 0);
    assert!(FollowRepository::followers(&mut conn, u1.id).await.unwrap().is_empty());
    assert_eq!(u1.image_url, "/static/images/default-pic.png");
    assert_ne!(u1.password_hash, PASSWORD);
}

#[tokio::test]
async fn test_authenticate() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let mut conn = pool.acquire().await.unwrap();

    let found = UserRepository::authenticate(&mut conn, "u1", "password")
        .await
        .unwrap();
    assert_eq!(found.map(|u| u.id), Some(u1.id));

    assert!(UserRepository::authenticate(&mut conn, "u1", "wrong")
        .await
        .unwrap()
        .is_none());
    assert!(UserRepository::authenticate(&mut conn, "nobody", "password")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_signup_leaves_users_unchanged() {
    let pool = test_pool().await;
    create_user(&pool, "u1").await;
    let mut conn = pool.acquire().await.unwrap();
    let before = UserRepository::count(&mut conn).await.unwrap();

    let same_username = UserRepository::signup(
        &mut conn,
        NewUser {
            username: "u1".to_string(),
            email: "fresh@email.com".to_string(),
            password: "password".to_string(),
            image_url: None,
        },
    )
    .await;
    assert!(matches!(same_username, Err(AppError::Conflict(_))));

    let same_email = UserRepository::signup(
        &mut conn,
        NewUser {
            username: "fresh".to_string(),
            email: "u1@email.com".to_string(),
            password: "password".to_string(),
            image_url: None,
        },
    )
    .await;
    assert!(matches!(same_email, Err(AppError::Conflict(_))));

    assert_eq!(UserRepository::count(&mut conn).await.unwrap(), before);
}

#[tokio::test]
async fn test_following_is_asymmetric() {
    let pool = test_pool().await;
    let a = create_user(&pool, "a").await;
    let b = create_user(&pool, "b").await;
    let mut conn = pool.acquire().await.unwrap();

    FollowRepository::follow(&mut conn, a.id, b.id).await.unwrap();

    assert!(FollowRepository::is_following(&mut conn, a.id, b.id).await.unwrap());
    assert!(!FollowRepository::is_following(&mut conn, b.id, a.id).await.unwrap());
    assert!(FollowRepository::is_followed_by(&mut conn, b.id, a.id).await.unwrap());

    let following = FollowRepository::following(&mut conn, a.id).await.unwrap();
    let followers = FollowRepository::followers(&mut conn, b.id).await.unwrap();
    assert_eq!(following.iter().map(|u| u.id).collect::<Vec<_>>(), vec![b.id]);
    assert_eq!(followers.iter().map(|u| u.id).collect::<Vec<_>>(), vec![a.id]);
    assert_eq!(FollowRepository::counts(&mut conn, a.id).await.unwrap(), (1, 0));
}

#[tokio::test]
async fn test_duplicate_follow_is_rejected_and_unfollow_is_forgiving() {
    let pool = test_pool().await;
    let a = create_user(&pool, "a").await;
    let b = create_user(&pool, "b").await;
    let mut conn = pool.acquire().await.unwrap();

    FollowRepository::follow(&mut conn, a.id, b.id).await.unwrap();
    assert!(matches!(
        FollowRepository::follow(&mut conn, a.id, b.id).await,
        Err(AppError::Conflict(_))
    ));

    assert!(FollowRepository::unfollow(&mut conn, a.id, b.id).await.unwrap());
    assert!(!FollowRepository::unfollow(&mut conn, a.id, b.id).await.unwrap());
}

#[tokio::test]
async fn test_message_requires_existing_user() {
    let pool = test_pool().await;
    let mut conn = pool.acquire().await.unwrap();

    let result = MessageRepository::create(&mut conn, 9999, "orphan").await;
    assert!(matches!(result, Err(AppError::Database(_))));
}

#[tokio::test]
async fn test_toggle_like_is_its_own_inverse() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let u2 = create_user(&pool, "u2").await;
    let m1 = create_message(&pool, &u1, "m1-text").await;
    let mut conn = pool.acquire().await.unwrap();

    LikeRepository::create(&mut conn, u2.id, m1.id).await.unwrap();

    assert!(!LikeRepository::toggle(&mut conn, u2.id, m1.id).await.unwrap());
    assert!(!LikeRepository::exists(&mut conn, u2.id, m1.id).await.unwrap());

    assert!(LikeRepository::toggle(&mut conn, u2.id, m1.id).await.unwrap());
    assert!(LikeRepository::exists(&mut conn, u2.id, m1.id).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_like_fails_at_storage() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let m1 = create_message(&pool, &u1, "m1-text").await;
    let mut conn = pool.acquire().await.unwrap();

    LikeRepository::create(&mut conn, u1.id, m1.id).await.unwrap();
    assert!(matches!(
        LikeRepository::create(&mut conn, u1.id, m1.id).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_feed_includes_self_and_followed_only() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let u2 = create_user(&pool, "u2").await;
    let u3 = create_user(&pool, "u3").await;
    let own = create_message(&pool, &u1, "mine").await;
    let followed = create_message(&pool, &u2, "followed").await;
    create_message(&pool, &u3, "stranger").await;

    let mut conn = pool.acquire().await.unwrap();
    FollowRepository::follow(&mut conn, u1.id, u2.id).await.unwrap();

    let feed = MessageRepository::feed(&mut conn, u1.id, FEED_LIMIT).await.unwrap();
    let ids: Vec<_> = feed.iter().map(|m| m.id).collect();

    // Same-second timestamps fall back to id order, newest first.
    assert_eq!(ids, vec![followed.id, own.id]);
}

#[tokio::test]
async fn test_feed_is_limited() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    for i in 0..5 {
        create_message(&pool, &u1, &format!("message {}", i)).await;
    }

    let mut conn = pool.acquire().await.unwrap();
    let feed = MessageRepository::feed(&mut conn, u1.id, 3).await.unwrap();

    assert_eq!(feed.len(), 3);
    assert_eq!(feed[0].text, "message 4");
}

#[tokio::test]
async fn test_liked_among_only_reports_requested_ids() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let m1 = create_message(&pool, &u1, "one").await;
    let m2 = create_message(&pool, &u1, "two").await;
    let m3 = create_message(&pool, &u1, "three").await;

    let mut conn = pool.acquire().await.unwrap();
    LikeRepository::create(&mut conn, u1.id, m1.id).await.unwrap();
    LikeRepository::create(&mut conn, u1.id, m3.id).await.unwrap();

    let liked = LikeRepository::liked_among(&mut conn, u1.id, &[m1.id, m2.id])
        .await
        .unwrap();
    assert_eq!(liked, vec![m1.id]);
    assert!(LikeRepository::liked_among(&mut conn, u1.id, &[])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_liked_messages_are_paginated() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let u2 = create_user(&pool, "u2").await;
    let mut message_ids = Vec::new();
    for i in 0..3 {
        message_ids.push(create_message(&pool, &u1, &format!("m{}", i)).await.id);
    }

    let mut conn = pool.acquire().await.unwrap();
    for id in &message_ids {
        LikeRepository::create(&mut conn, u2.id, *id).await.unwrap();
    }

    let first = LikeRepository::liked_messages(&mut conn, u2.id, 0).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].id, message_ids[2]);

    let second = LikeRepository::liked_messages(&mut conn, u2.id, 1).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_delete_message_removes_its_likes() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let u2 = create_user(&pool, "u2").await;
    let m1 = create_message(&pool, &u1, "m1-text").await;

    let mut conn = pool.acquire().await.unwrap();
    LikeRepository::create(&mut conn, u2.id, m1.id).await.unwrap();

    MessageRepository::delete(&mut conn, m1.id).await.unwrap();

    assert!(MessageRepository::get_by_id(&mut conn, m1.id).await.unwrap().is_none());
    assert_eq!(LikeRepository::count_by_user(&mut conn, u2.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_user_removes_exactly_their_content() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let u2 = create_user(&pool, "u2").await;
    let m1 = create_message(&pool, &u1, "m1-text").await;
    let m2 = create_message(&pool, &u1, "test_text2").await;
    let m3 = create_message(&pool, &u2, "u2 stays").await;

    let mut conn = pool.acquire().await.unwrap();
    LikeRepository::create(&mut conn, u2.id, m1.id).await.unwrap();
    LikeRepository::create(&mut conn, u2.id, m2.id).await.unwrap();
    LikeRepository::create(&mut conn, u2.id, m3.id).await.unwrap();
    LikeRepository::create(&mut conn, u1.id, m3.id).await.unwrap();
    FollowRepository::follow(&mut conn, u1.id, u2.id).await.unwrap();
    FollowRepository::follow(&mut conn, u2.id, u1.id).await.unwrap();

    UserRepository::delete(&mut conn, u1.id).await.unwrap();

    assert!(UserRepository::get_by_id(&mut conn, u1.id).await.unwrap().is_none());
    assert_eq!(MessageRepository::count_by_user(&mut conn, u1.id).await.unwrap(), 0);
    assert!(MessageRepository::get_by_id(&mut conn, m1.id).await.unwrap().is_none());
    assert!(MessageRepository::get_by_id(&mut conn, m2.id).await.unwrap().is_none());

    // u2 keeps their account, their message, and their like on it; u1's like is gone.
    assert!(UserRepository::get_by_id(&mut conn, u2.id).await.unwrap().is_some());
    assert!(MessageRepository::get_by_id(&mut conn, m3.id).await.unwrap().is_some());
    assert_eq!(LikeRepository::count_by_user(&mut conn, u2.id).await.unwrap(), 1);
    assert!(LikeRepository::exists(&mut conn, u2.id, m3.id).await.unwrap());
    assert_eq!(FollowRepository::counts(&mut conn, u2.id).await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_update_profile_and_conflict() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    create_user(&pool, "u2").await;
    let mut conn = pool.acquire().await.unwrap();

    let updated = UserRepository::update_profile(
        &mut conn,
        u1.id,
        ProfileUpdate {
            username: "u1".to_string(),
            email: "test.u1@email.com".to_string(),
            bio: Some("Test bio info change".to_string()),
            ..ProfileUpdate::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.email, "test.u1@email.com");
    assert_eq!(updated.bio.as_deref(), Some("Test bio info change"));
    assert_eq!(updated.header_image_url, "/static/images/warbler-hero.jpg");

    let taken = UserRepository::update_profile(
        &mut conn,
        u1.id,
        ProfileUpdate {
            username: "u2".to_string(),
            email: "test.u1@email.com".to_string(),
            ..ProfileUpdate::default()
        },
    )
    .await;
    assert!(matches!(taken, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_search_matches_substring_literally() {
    let pool = test_pool().await;
    create_user(&pool, "alice").await;
    create_user(&pool, "malice_x").await;
    create_user(&pool, "bob").await;
    let mut conn = pool.acquire().await.unwrap();

    let hits = UserRepository::search(&mut conn, Some("lic")).await.unwrap();
    assert_eq!(
        hits.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
        vec!["alice", "malice_x"]
    );

    let underscore = UserRepository::search(&mut conn, Some("_")).await.unwrap();
    assert_eq!(underscore.len(), 1);

    assert_eq!(UserRepository::search(&mut conn, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_liked_messages_far_past_the_end_is_empty() {
    let pool = test_pool().await;
    let u1 = create_user(&pool, "u1").await;
    let m1 = create_message(&pool, &u1, "m1-text").await;
    let mut conn = pool.acquire().await.unwrap();
    LikeRepository::create(&mut conn, u1.id, m1.id).await.unwrap();

    let page = LikeRepository::liked_messages(&mut conn, u1.id, i64::MAX)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_new_session_purges_expired_ones() {
    let pool = test_pool().await;
    let mut conn = pool.acquire().await.unwrap();

    let stale = SessionRepository::create(&mut conn, None, -1).await.unwrap();
    assert!(SessionRepository::get_by_token(&mut conn, &stale.token)
        .await
        .unwrap()
        .is_none());

    let fresh = SessionRepository::create(&mut conn, None, 24).await.unwrap();

    let tokens = sqlx::query_scalar::<_, String>("SELECT token FROM sessions")
        .fetch_all(&mut *conn)
        .await
        .unwrap();
    assert_eq!(tokens, vec![fresh.token]);
    assert_eq!(SessionRepository::cleanup_expired(&mut conn).await.unwrap(), 0);
}
