use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::Serialize;

use crate::api::forms::{self, CsrfForm, FieldErrors, MessageForm};
use crate::api::gate;
use crate::api::middleware::RequestContext;
use crate::api::state::AppState;
use crate::api::views::{self, Page};
use crate::db::models::MessageId;
use crate::db::{LikeRepository, MessageRepository, SessionRepository};
use crate::error::AppError;

pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

/// GET /messages/new
pub async fn new_message_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    if gate::require_user(&ctx).is_err() {
        return gate::access_unauthorized(&state, &ctx).await;
    }

    let mut conn = state.db.acquire().await?;
    let flash = SessionRepository::take_flash(&mut conn, ctx.token()).await?;

    let page = Page::new(&ctx, flash);
    Ok(Html(views::message_new(&page, "", &FieldErrors::new())).into_response())
}

/// POST /messages/new
pub async fn create_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    form: Option<Form<MessageForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let Ok(current) = gate::authorize(&ctx, form.csrf_token.as_deref()) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    if let Err(errors) = forms::check(&form) {
        let page = Page::new(&ctx, None);
        return Ok(Html(views::message_new(&page, &form.text, &errors)).into_response());
    }

    let mut tx = state.db.begin().await?;
    let message = MessageRepository::create(&mut tx, current.id, &form.text).await?;
    tx.commit().await?;

    tracing::debug!(message_id = message.id, user_id = current.id, "📝 Message posted");
    Ok(Redirect::to(&format!("/users/{}", current.id)).into_response())
}

/// GET /messages/:id
pub async fn show_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(message_id): Path<MessageId>,
) -> Result<Response, AppError> {
    let Ok(current) = gate::require_user(&ctx) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let message = MessageRepository::require(&mut tx, message_id).await?;
    let liked = LikeRepository::exists(&mut tx, current.id, message.id).await?;
    let flash = SessionRepository::take_flash(&mut tx, ctx.token()).await?;
    tx.commit().await?;

    let page = Page::new(&ctx, flash);
    Ok(Html(views::message_show(&page, &message, liked)).into_response())
}

/// POST /messages/:id/delete
///
/// Someone else's message is left alone; the redirect is the same either way.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(message_id): Path<MessageId>,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AppError> {
    let submitted = form.and_then(|Form(f)| f.csrf_token);
    let Ok(current) = gate::authorize(&ctx, submitted.as_deref()) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let message = MessageRepository::require(&mut tx, message_id).await?;

    if message.user_id == current.id {
        MessageRepository::delete(&mut tx, message.id).await?;
        SessionRepository::set_flash(&mut tx, ctx.token(), "success", "message deleted").await?;
    }
    tx.commit().await?;

    Ok(Redirect::to(&format!("/users/{}", current.id)).into_response())
}

/// POST /messages/:id/toggle-like
///
/// Called from script, so it answers in JSON. The token may come from the
/// form body or the `X-CSRF-Token` header.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(message_id): Path<MessageId>,
    headers: HeaderMap,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AppError> {
    let submitted = form
        .and_then(|Form(f)| f.csrf_token)
        .or_else(|| {
            headers
                .get(CSRF_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        });

    let Ok(current) = gate::authorize(&ctx, submitted.as_deref()) else {
        let body = ToggleLikeResponse {
            status: "Unauthorized",
            liked: None,
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response());
    };

    let mut tx = state.db.begin().await?;
    let message = MessageRepository::require(&mut tx, message_id).await?;
    let liked = LikeRepository::toggle(&mut tx, current.id, message.id).await?;
    tx.commit().await?;

    let body = ToggleLikeResponse {
        status: "ok",
        liked: Some(liked),
    };
    Ok(Json(body).into_response())
}
