use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::api::state::AppState;
use crate::db::{Session, SessionRepository, User, UserRepository};
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "warbler_session";

/// Per-request identity, attached by [`session_middleware`] and handed to
/// every handler as an `Extension`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: Session,
    pub user: Option<User>,
}

impl RequestContext {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> &str {
        &self.session.token
    }

    pub fn csrf_token(&self) -> &str {
        &self.session.csrf_token
    }
}

/// Session middleware - loads the session named by the cookie, or starts an
/// anonymous one and sets the cookie on the way out.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let presented = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let (ctx, is_new) = {
        let mut conn = state.db.acquire().await?;

        let existing = match presented {
            Some(token) => SessionRepository::get_by_token(&mut conn, &token).await?,
            None => None,
        };

        let (session, is_new) = match existing {
            Some(session) => (session, false),
            None => {
                let session = SessionRepository::create(
                    &mut conn,
                    None,
                    state.config.session_expiry_hours,
                )
                .await?;
                tracing::debug!("🍪 Started anonymous session");
                (session, true)
            }
        };

        // A session can outlive its user row only if the delete raced; treat it as anonymous.
        let user = match session.user_id {
            Some(user_id) => UserRepository::get_by_id(&mut conn, user_id).await?,
            None => None,
        };

        (RequestContext { session, user }, is_new)
    };

    let token = ctx.session.token.clone();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;

    if is_new {
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(state.config.secure_cookies)
            .build();

        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| AppError::Internal(format!("Invalid session cookie: {}", e)))?;
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    Ok(response)
}
