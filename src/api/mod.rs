pub mod auth;
pub mod forms;
pub mod gate;
pub mod home;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod users;
pub mod views;

pub use middleware::RequestContext;
pub use state::AppState;

use axum::{
    http::{header, HeaderValue},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    services::ServeDir, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Authentication
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", post(auth::logout))

        // Users
        .route("/users", get(users::list_users))
        .route("/users/profile", get(users::profile_form).post(users::update_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/users/follow/:id", post(users::start_following))
        .route("/users/stop-following/:id", post(users::stop_following))
        .route("/users/:id", get(users::show_user))
        .route("/users/:id/following", get(users::show_following))
        .route("/users/:id/followers", get(users::show_followers))
        .route("/users/:id/likes", get(users::show_likes))

        // Messages
        .route("/messages/new", get(messages::new_message_form).post(messages::create_message))
        .route("/messages/:id", get(messages::show_message))
        .route("/messages/:id/delete", post(messages::delete_message))
        .route("/messages/:id/toggle-like", post(messages::toggle_like))

        .route("/", get(home::homepage))

        // Every route above sees a session
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))

        .route("/health", get(home::health))
        .nest_service("/static", static_files)
        .fallback(home::not_found)

        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
