//! Authorization checks shared by every route.
//!
//! Reads need an authenticated session. Writes additionally need the
//! submitted anti-forgery token to match the one issued to the session,
//! checked in that order.

use axum::response::{IntoResponse, Redirect, Response};

use crate::api::middleware::RequestContext;
use crate::api::state::AppState;
use crate::crypto::tokens_match;
use crate::db::{SessionRepository, User};
use crate::error::AppError;

pub const ACCESS_UNAUTHORIZED: &str = "Access unauthorized.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    Anonymous,
    BadToken,
}

/// The acting user, if the session is authenticated.
pub fn require_user(ctx: &RequestContext) -> Result<&User, Denied> {
    ctx.user().ok_or(Denied::Anonymous)
}

/// Does `submitted` match the session's anti-forgery token?
pub fn check_token(ctx: &RequestContext, submitted: Option<&str>) -> bool {
    submitted.is_some_and(|token| tokens_match(ctx.csrf_token(), token))
}

/// Gate for state-mutating routes: authenticated first, then token.
pub fn authorize<'a>(ctx: &'a RequestContext, submitted: Option<&str>) -> Result<&'a User, Denied> {
    let user = require_user(ctx)?;
    if !check_token(ctx, submitted) {
        tracing::warn!(user_id = user.id, "🚫 Anti-forgery token mismatch");
        return Err(Denied::BadToken);
    }
    Ok(user)
}

/// Flash "Access unauthorized." and send the visitor home.
pub async fn access_unauthorized(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<Response, AppError> {
    flash(state, ctx, "danger", ACCESS_UNAUTHORIZED).await?;
    Ok(Redirect::to("/").into_response())
}

/// Queue a flash message outside any handler transaction.
pub async fn flash(
    state: &AppState,
    ctx: &RequestContext,
    category: &str,
    message: &str,
) -> Result<(), AppError> {
    let mut conn = state.db.acquire().await?;
    SessionRepository::set_flash(&mut conn, ctx.token(), category, message).await
}
