//! Shared fixtures: an in-memory database per test, users, and request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use sqlx::SqlitePool;
use tower::ServiceExt;

use warbler::api::{create_router, AppState};
use warbler::config::Config;
use warbler::db::{
    self, Message, MessageRepository, NewUser, Session, SessionRepository, User, UserRepository,
};

pub const PASSWORD: &str = "password";

pub async fn test_pool() -> SqlitePool {
    db::connect_in_memory().await.expect("in-memory database")
}

pub async fn create_user(pool: &SqlitePool, username: &str) -> User {
    let mut conn = pool.acquire().await.unwrap();
    UserRepository::signup(
        &mut conn,
        NewUser {
            username: username.to_string(),
            email: format!("{}@email.com", username),
            password: PASSWORD.to_string(),
            image_url: None,
        },
    )
    .await
    .unwrap()
}

pub async fn create_message(pool: &SqlitePool, user: &User, text: &str) -> Message {
    let mut conn = pool.acquire().await.unwrap();
    MessageRepository::create(&mut conn, user.id, text).await.unwrap()
}

pub fn app(pool: &SqlitePool) -> Router {
    create_router(AppState {
        db: pool.clone(),
        config: Arc::new(Config::default()),
    })
}

/// A session row as if the browser had logged in (or not, for `None`).
pub async fn session_for(pool: &SqlitePool, user: Option<&User>) -> Session {
    let mut conn = pool.acquire().await.unwrap();
    SessionRepository::create(&mut conn, user.map(|u| u.id), 1)
        .await
        .unwrap()
}

pub fn get(uri: &str, session: &Session) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("warbler_session={}", session.token))
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, session: &Session, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, format!("warbler_session={}", session.token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Form body carrying just the session's anti-forgery token.
pub fn csrf_body(session: &Session) -> String {
    format!("csrf_token={}", session.csrf_token)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub set_cookie: Option<String>,
    pub body: String,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let header_str = |name: header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let location = header_str(header::LOCATION);
    let set_cookie = header_str(header::SET_COOKIE);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        location,
        set_cookie,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// Send, then follow a redirect with the same session, like a browser would.
pub async fn send_following(
    app: &Router,
    request: Request<Body>,
    session: &Session,
) -> TestResponse {
    let first = send(app, request).await;
    match (&first.location, first.status.is_redirection()) {
        (Some(location), true) => send(app, get(location, session)).await,
        _ => first,
    }
}
