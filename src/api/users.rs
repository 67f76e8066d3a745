use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use sqlx::SqliteConnection;

use crate::api::forms::{self, CsrfForm, FieldErrors, PageQuery, ProfileForm, SearchQuery};
use crate::api::gate;
use crate::api::middleware::RequestContext;
use crate::api::state::AppState;
use crate::api::views::{self, Page, ProfileView, Relations};
use crate::db::likes::LIKES_PAGE_SIZE;
use crate::db::models::UserId;
use crate::db::{
    FollowRepository, LikeRepository, MessageRepository, SessionRepository, UserRepository,
};
use crate::error::AppError;

/// Profile stats: (messages, following, followers, likes).
async fn profile_counts(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<(i64, i64, i64, i64), AppError> {
    let messages = MessageRepository::count_by_user(conn, user_id).await?;
    let (following, followers) = FollowRepository::counts(conn, user_id).await?;
    let likes = LikeRepository::count_by_user(conn, user_id).await?;
    Ok((messages, following, followers, likes))
}

/// GET /users?q=
pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let Ok(current) = gate::require_user(&ctx) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let users = UserRepository::search(&mut tx, query.q.as_deref()).await?;
    let following_ids = FollowRepository::following_ids(&mut tx, current.id).await?;
    let flash = SessionRepository::take_flash(&mut tx, ctx.token()).await?;
    tx.commit().await?;

    let page = Page::new(&ctx, flash);
    let relations = Relations {
        following_ids: &following_ids,
    };
    Ok(Html(views::users_index(&page, &relations, &users)).into_response())
}

/// GET /users/:id
pub async fn show_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(user_id): Path<UserId>,
) -> Result<Response, AppError> {
    let Ok(current) = gate::require_user(&ctx) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let user = UserRepository::require(&mut tx, user_id).await?;
    let messages = MessageRepository::by_user(&mut tx, user.id).await?;
    let ids: Vec<_> = messages.iter().map(|m| m.id).collect();
    let liked = LikeRepository::liked_among(&mut tx, current.id, &ids).await?;
    let counts = profile_counts(&mut tx, user.id).await?;
    let following_ids = FollowRepository::following_ids(&mut tx, current.id).await?;
    let flash = SessionRepository::take_flash(&mut tx, ctx.token()).await?;
    tx.commit().await?;

    let page = Page::new(&ctx, flash);
    let view = ProfileView {
        user: &user,
        counts,
        relations: Relations {
            following_ids: &following_ids,
        },
    };
    Ok(Html(views::user_show(&page, &view, &messages, &liked)).into_response())
}

enum Direction {
    Following,
    Followers,
}

async fn show_relations(
    state: AppState,
    ctx: RequestContext,
    user_id: UserId,
    direction: Direction,
) -> Result<Response, AppError> {
    let Ok(current) = gate::require_user(&ctx) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let user = UserRepository::require(&mut tx, user_id).await?;
    let users = match direction {
        Direction::Following => FollowRepository::following(&mut tx, user.id).await?,
        Direction::Followers => FollowRepository::followers(&mut tx, user.id).await?,
    };
    let counts = profile_counts(&mut tx, user.id).await?;
    let following_ids = FollowRepository::following_ids(&mut tx, current.id).await?;
    let flash = SessionRepository::take_flash(&mut tx, ctx.token()).await?;
    tx.commit().await?;

    let page = Page::new(&ctx, flash);
    let view = ProfileView {
        user: &user,
        counts,
        relations: Relations {
            following_ids: &following_ids,
        },
    };
    let html = match direction {
        Direction::Following => views::following(&page, &view, &users),
        Direction::Followers => views::followers(&page, &view, &users),
    };
    Ok(Html(html).into_response())
}

/// GET /users/:id/following
pub async fn show_following(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(user_id): Path<UserId>,
) -> Result<Response, AppError> {
    show_relations(state, ctx, user_id, Direction::Following).await
}

/// GET /users/:id/followers
pub async fn show_followers(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(user_id): Path<UserId>,
) -> Result<Response, AppError> {
    show_relations(state, ctx, user_id, Direction::Followers).await
}

/// POST /users/follow/:id
pub async fn start_following(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(target_id): Path<UserId>,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AppError> {
    let submitted = form.and_then(|Form(f)| f.csrf_token);
    let Ok(current) = gate::authorize(&ctx, submitted.as_deref()) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let target = UserRepository::require(&mut tx, target_id).await?;

    // Following yourself would only duplicate your own messages in the feed.
    if target.id != current.id
        && !FollowRepository::is_following(&mut tx, current.id, target.id).await?
    {
        FollowRepository::follow(&mut tx, current.id, target.id).await?;
    }
    tx.commit().await?;

    Ok(Redirect::to(&format!("/users/{}/following", current.id)).into_response())
}

/// POST /users/stop-following/:id
pub async fn stop_following(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(target_id): Path<UserId>,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AppError> {
    let submitted = form.and_then(|Form(f)| f.csrf_token);
    let Ok(current) = gate::authorize(&ctx, submitted.as_deref()) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    let target = UserRepository::require(&mut tx, target_id).await?;
    FollowRepository::unfollow(&mut tx, current.id, target.id).await?;
    tx.commit().await?;

    Ok(Redirect::to(&format!("/users/{}/following", current.id)).into_response())
}

/// GET /users/profile
pub async fn profile_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    let Ok(current) = gate::require_user(&ctx) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut conn = state.db.acquire().await?;
    let flash = SessionRepository::take_flash(&mut conn, ctx.token()).await?;

    let page = Page::new(&ctx, flash);
    let form = ProfileForm::from_user(current);
    Ok(Html(views::profile_edit(&page, &form, &FieldErrors::new())).into_response())
}

/// POST /users/profile
///
/// Changes apply only after the current password re-authenticates.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    form: Option<Form<ProfileForm>>,
) -> Result<Response, AppError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let Ok(current) = gate::authorize(&ctx, form.csrf_token.as_deref()) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    if let Err(errors) = forms::check(&form) {
        return Ok(render_profile(&ctx, &form, &errors));
    }

    let mut tx = state.db.begin().await?;

    if UserRepository::authenticate(&mut tx, &current.username, &form.password)
        .await?
        .is_none()
    {
        tx.rollback().await?;
        let mut errors = FieldErrors::new();
        forms::push_error(&mut errors, "password", "Incorrect password");
        return Ok(render_profile(&ctx, &form, &errors));
    }

    let user = match UserRepository::update_profile(&mut tx, current.id, form.to_update()).await {
        Ok(user) => user,
        Err(AppError::Conflict(msg)) => {
            tx.rollback().await?;
            let mut errors = FieldErrors::new();
            forms::push_error(&mut errors, "username", &msg);
            return Ok(render_profile(&ctx, &form, &errors));
        }
        Err(e) => return Err(e),
    };
    tx.commit().await?;

    tracing::info!(user_id = user.id, "✏️ Profile updated");
    Ok(Redirect::to(&format!("/users/{}", user.id)).into_response())
}

fn render_profile(ctx: &RequestContext, form: &ProfileForm, errors: &FieldErrors) -> Response {
    let page = Page::new(ctx, None);
    Html(views::profile_edit(&page, form, errors)).into_response()
}

/// POST /users/delete
///
/// Always deletes the acting user, never anyone else.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AppError> {
    let submitted = form.and_then(|Form(f)| f.csrf_token);
    let Ok(current) = gate::authorize(&ctx, submitted.as_deref()) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let mut tx = state.db.begin().await?;
    UserRepository::delete(&mut tx, current.id).await?;
    tx.commit().await?;

    Ok(Redirect::to("/signup").into_response())
}

/// GET /users/:id/likes?page=
pub async fn show_likes(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(user_id): Path<UserId>,
    Query(paging): Query<PageQuery>,
) -> Result<Response, AppError> {
    let Ok(current) = gate::require_user(&ctx) else {
        return gate::access_unauthorized(&state, &ctx).await;
    };

    let index = paging.index();

    let mut tx = state.db.begin().await?;
    let user = UserRepository::require(&mut tx, user_id).await?;
    let messages = LikeRepository::liked_messages(&mut tx, user.id, index).await?;
    let ids: Vec<_> = messages.iter().map(|m| m.id).collect();
    let liked = LikeRepository::liked_among(&mut tx, current.id, &ids).await?;
    let counts = profile_counts(&mut tx, user.id).await?;
    let following_ids = FollowRepository::following_ids(&mut tx, current.id).await?;
    let flash = SessionRepository::take_flash(&mut tx, ctx.token()).await?;
    tx.commit().await?;

    let page = Page::new(&ctx, flash);
    let view = ProfileView {
        user: &user,
        counts,
        relations: Relations {
            following_ids: &following_ids,
        },
    };
    let has_next = messages.len() as i64 == LIKES_PAGE_SIZE;
    Ok(Html(views::likes(&page, &view, &messages, &liked, index + 1, has_next)).into_response())
}
