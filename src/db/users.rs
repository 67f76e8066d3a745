use sqlx::SqliteConnection;
use tracing::instrument;

use crate::crypto::{hash_password, verify_password};
use crate::db::models::{
    NewUser, ProfileUpdate, User, UserId, DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL,
};
use crate::db::{FollowRepository, LikeRepository, MessageRepository, SessionRepository};
use crate::error::{map_unique_violation, AppError};

pub struct UserRepository;

impl UserRepository {
    /// Hash the password and insert a new user.
    ///
    /// A taken username or email comes back as `AppError::Conflict`.
    #[instrument(skip(conn, new_user), fields(username = %new_user.username))]
    pub async fn signup(conn: &mut SqliteConnection, new_user: NewUser) -> Result<User, AppError> {
        let password_hash = hash_password(&new_user.password)?;
        let created_at = chrono::Utc::now().timestamp();
        let image_url = new_user
            .image_url
            .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (username, email, password_hash, image_url, header_image_url, created_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(&image_url)
        .bind(DEFAULT_HEADER_IMAGE_URL)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, "Username already taken"))?;

        tracing::info!(user_id = user.id, "👤 User signed up");
        Ok(user)
    }

    /// Look up `username` and check the password.
    ///
    /// Bad credentials are `Ok(None)`; only storage or hash failures are errors.
    #[instrument(skip(conn, password))]
    pub async fn authenticate(
        conn: &mut SqliteConnection,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(user) = Self::get_by_username(conn, username).await? else {
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn get_by_username(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(user)
    }

    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        id: UserId,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(user)
    }

    pub async fn require(conn: &mut SqliteConnection, id: UserId) -> Result<User, AppError> {
        Self::get_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    /// All users, or those whose username contains `search`.
    pub async fn search(
        conn: &mut SqliteConnection,
        search: Option<&str>,
    ) -> Result<Vec<User>, AppError> {
        let users = match search.filter(|s| !s.is_empty()) {
            Some(term) => {
                sqlx::query_as::<_, User>(
                    r#"
SELECT * FROM users
WHERE username LIKE '%' || ? || '%' ESCAPE '\'
ORDER BY username
                    "#,
                )
                .bind(escape_like(term))
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        Ok(users)
    }

    /// Apply a profile edit. Empty image fields fall back to the defaults.
    #[instrument(skip(conn, update))]
    pub async fn update_profile(
        conn: &mut SqliteConnection,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
UPDATE users
SET username = ?, email = ?, image_url = ?, header_image_url = ?, bio = ?, location = ?
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(&update.username)
        .bind(&update.email)
        .bind(update.image_url.as_deref().unwrap_or(DEFAULT_IMAGE_URL))
        .bind(
            update
                .header_image_url
                .as_deref()
                .unwrap_or(DEFAULT_HEADER_IMAGE_URL),
        )
        .bind(&update.bio)
        .bind(&update.location)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, "Username already taken"))?
        .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;

        Ok(user)
    }

    /// Delete a user and everything that references them.
    ///
    /// Foreign keys carry no ON DELETE CASCADE, so dependents go first:
    /// likes given and received, follow edges, messages, sessions, then the row.
    #[instrument(skip(conn))]
    pub async fn delete(conn: &mut SqliteConnection, id: UserId) -> Result<(), AppError> {
        LikeRepository::delete_by_user(conn, id).await?;
        LikeRepository::delete_on_messages_of(conn, id).await?;
        FollowRepository::delete_all_for(conn, id).await?;
        MessageRepository::delete_by_user(conn, id).await?;
        SessionRepository::detach_user(conn, id).await?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {}", id)));
        }

        tracing::info!(user_id = id, "🗑️ User deleted");
        Ok(())
    }

    pub async fn count(conn: &mut SqliteConnection) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
