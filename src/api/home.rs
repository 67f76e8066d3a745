use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use crate::api::middleware::RequestContext;
use crate::api::state::AppState;
use crate::api::views::{self, Page};
use crate::db::messages::FEED_LIMIT;
use crate::db::{FollowRepository, LikeRepository, MessageRepository, SessionRepository};
use crate::error::AppError;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// GET /
///
/// Anonymous visitors get the landing page; members get their feed.
pub async fn homepage(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let mut tx = state.db.begin().await?;
    let flash = SessionRepository::take_flash(&mut tx, ctx.token()).await?;

    let Some(user) = ctx.user() else {
        tx.commit().await?;
        let page = Page::new(&ctx, flash);
        return Ok(Html(views::home_anon(&page)).into_response());
    };

    let messages = MessageRepository::feed(&mut tx, user.id, FEED_LIMIT).await?;
    let ids: Vec<_> = messages.iter().map(|m| m.id).collect();
    let liked = LikeRepository::liked_among(&mut tx, user.id, &ids).await?;
    let message_count = MessageRepository::count_by_user(&mut tx, user.id).await?;
    let (following, followers) = FollowRepository::counts(&mut tx, user.id).await?;
    tx.commit().await?;

    let page = Page::new(&ctx, flash);
    let counts = (message_count, following, followers);
    Ok(Html(views::home(&page, user, counts, &messages, &liked)).into_response())
}

/// Fallback for unknown routes.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
