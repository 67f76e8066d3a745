use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};

use crate::api::forms::{self, CsrfForm, FieldErrors, LoginForm, SignupForm, CSRF_ERROR};
use crate::api::gate;
use crate::api::middleware::RequestContext;
use crate::api::state::AppState;
use crate::api::views::{self, Page};
use crate::db::{Flash, SessionRepository, UserRepository};
use crate::error::AppError;

pub const MALFORMED_FORM: &str = "Malformed form submission.";

/// Signing up starts from a logged-out session.
async fn log_out(state: &AppState, mut ctx: RequestContext) -> Result<RequestContext, AppError> {
    if let Some(user) = ctx.user.take() {
        let mut conn = state.db.acquire().await?;
        SessionRepository::set_user(&mut conn, ctx.token(), None).await?;
        ctx.session.user_id = None;
        tracing::info!(user_id = user.id, "👋 User logged out for signup");
    }
    Ok(ctx)
}

/// GET /signup
pub async fn signup_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Html<String>, AppError> {
    let ctx = log_out(&state, ctx).await?;

    let mut conn = state.db.acquire().await?;
    let flash = SessionRepository::take_flash(&mut conn, ctx.token()).await?;

    let page = Page::new(&ctx, flash);
    Ok(Html(views::signup(&page, &SignupForm::default(), &FieldErrors::new())))
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    form: Option<Form<SignupForm>>,
) -> Result<Response, AppError> {
    let ctx = log_out(&state, ctx).await?;
    let Some(Form(form)) = form else {
        return Err(AppError::Validation(MALFORMED_FORM.to_string()));
    };

    let mut errors = forms::check(&form).err().unwrap_or_default();
    if !gate::check_token(&ctx, form.csrf_token.as_deref()) {
        forms::push_error(&mut errors, "csrf_token", CSRF_ERROR);
    }
    if !errors.is_empty() {
        return Ok(render_signup(&ctx, &form, &errors));
    }

    let mut tx = state.db.begin().await?;

    let user = match UserRepository::signup(&mut tx, form.clone().into_new_user()).await {
        Ok(user) => user,
        Err(AppError::Conflict(msg)) => {
            tx.rollback().await?;
            let mut errors = FieldErrors::new();
            forms::push_error(&mut errors, "username", &msg);
            return Ok(render_signup(&ctx, &form, &errors));
        }
        Err(e) => return Err(e),
    };

    SessionRepository::set_user(&mut tx, ctx.token(), Some(user.id)).await?;
    tx.commit().await?;

    Ok(Redirect::to("/").into_response())
}

fn render_signup(ctx: &RequestContext, form: &SignupForm, errors: &FieldErrors) -> Response {
    let page = Page::new(ctx, None);
    Html(views::signup(&page, form, errors)).into_response()
}

/// GET /login
pub async fn login_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, AppError> {
    if ctx.user().is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let mut conn = state.db.acquire().await?;
    let flash = SessionRepository::take_flash(&mut conn, ctx.token()).await?;

    let page = Page::new(&ctx, flash);
    Ok(Html(views::login(&page, "", &FieldErrors::new())).into_response())
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    form: Option<Form<LoginForm>>,
) -> Result<Response, AppError> {
    if ctx.user().is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let Some(Form(form)) = form else {
        return Err(AppError::Validation(MALFORMED_FORM.to_string()));
    };

    let mut errors = forms::check(&form).err().unwrap_or_default();
    if !gate::check_token(&ctx, form.csrf_token.as_deref()) {
        forms::push_error(&mut errors, "csrf_token", CSRF_ERROR);
    }
    if !errors.is_empty() {
        let page = Page::new(&ctx, None);
        return Ok(Html(views::login(&page, &form.username, &errors)).into_response());
    }

    let mut tx = state.db.begin().await?;

    let Some(user) = UserRepository::authenticate(&mut tx, &form.username, &form.password).await?
    else {
        tx.rollback().await?;
        tracing::info!("🔒 Failed login attempt");
        let page = Page::new(&ctx, Some(danger("Invalid credentials.")));
        return Ok(Html(views::login(&page, &form.username, &FieldErrors::new())).into_response());
    };

    SessionRepository::set_user(&mut tx, ctx.token(), Some(user.id)).await?;
    SessionRepository::set_flash(
        &mut tx,
        ctx.token(),
        "success",
        &format!("Hello, {}!", user.username),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "🔓 User logged in");
    Ok(Redirect::to("/").into_response())
}

/// POST /logout
///
/// Unlike the other writes, a failed check here is a hard 401.
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    form: Option<Form<CsrfForm>>,
) -> Result<Response, AppError> {
    let submitted = form.and_then(|Form(f)| f.csrf_token);
    let user = gate::authorize(&ctx, submitted.as_deref()).map_err(|_| AppError::Unauthorized)?;

    let mut tx = state.db.begin().await?;
    SessionRepository::set_user(&mut tx, ctx.token(), None).await?;
    SessionRepository::set_flash(&mut tx, ctx.token(), "success", "Logout Successful").await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "👋 User logged out");
    Ok(Redirect::to("/").into_response())
}

fn danger(message: &str) -> Flash {
    Flash {
        category: "danger".to_string(),
        message: message.to_string(),
    }
}
