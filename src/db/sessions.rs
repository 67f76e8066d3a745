use sqlx::SqliteConnection;

use crate::crypto::{generate_csrf_token, generate_session_token};
use crate::db::models::{Flash, Session, UserId};
use crate::error::AppError;

pub struct SessionRepository;

impl SessionRepository {
    /// Start a session. `user_id` is `None` for an anonymous visitor.
    ///
    /// Expired rows are purged first, so cookieless traffic only keeps
    /// unexpired sessions around between cleanup runs.
    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: Option<UserId>,
        expiry_hours: i64,
    ) -> Result<Session, AppError> {
        Self::cleanup_expired(conn).await?;

        let token = generate_session_token();
        let csrf_token = generate_csrf_token();
        let created_at = chrono::Utc::now().timestamp();
        let expires_at = created_at + (expiry_hours * 3600);

        let session = sqlx::query_as::<_, Session>(
            r#"
INSERT INTO sessions (token, user_id, csrf_token, created_at, expires_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(&csrf_token)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(session)
    }

    pub async fn get_by_token(
        conn: &mut SqliteConnection,
        token: &str,
    ) -> Result<Option<Session>, AppError> {
        let now = chrono::Utc::now().timestamp();

        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Move the session between Anonymous (`None`) and Authenticated.
    pub async fn set_user(
        conn: &mut SqliteConnection,
        token: &str,
        user_id: Option<UserId>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET user_id = ? WHERE token = ?")
            .bind(user_id)
            .bind(token)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Log `user_id` out of every session it holds.
    pub async fn detach_user(conn: &mut SqliteConnection, user_id: UserId) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET user_id = NULL WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Queue a one-shot message for the next rendered page. Replaces any pending one.
    pub async fn set_flash(
        conn: &mut SqliteConnection,
        token: &str,
        category: &str,
        message: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET flash_category = ?, flash_message = ? WHERE token = ?")
            .bind(category)
            .bind(message)
            .bind(token)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Read and clear the pending flash message.
    pub async fn take_flash(
        conn: &mut SqliteConnection,
        token: &str,
    ) -> Result<Option<Flash>, AppError> {
        let pending = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            "SELECT flash_category, flash_message FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((Some(category), Some(message))) = pending else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE sessions SET flash_category = NULL, flash_message = NULL WHERE token = ?",
        )
        .bind(token)
        .execute(&mut *conn)
        .await?;

        Ok(Some(Flash { category, message }))
    }

    pub async fn cleanup_expired(conn: &mut SqliteConnection) -> Result<u64, AppError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
