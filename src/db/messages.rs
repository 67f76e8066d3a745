use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::models::{Message, MessageId, UserId};
use crate::db::LikeRepository;
use crate::error::AppError;

/// Most recent messages shown on the home feed.
pub const FEED_LIMIT: i64 = 100;

pub struct MessageRepository;

impl MessageRepository {
    #[instrument(skip(conn, text))]
    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: UserId,
        text: &str,
    ) -> Result<Message, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        let id = sqlx::query_scalar::<_, MessageId>(
            r#"
INSERT INTO messages (text, user_id, created_at)
VALUES (?, ?, ?)
RETURNING id
            "#,
        )
        .bind(text)
        .bind(user_id)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;

        // Fetch with author fields joined
        let message = Self::get_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created message".to_string()))?;

        Ok(message)
    }

    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        id: MessageId,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
SELECT m.id, m.user_id, u.username, u.image_url, m.text, m.created_at
FROM messages m
JOIN users u ON m.user_id = u.id
WHERE m.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(message)
    }

    pub async fn require(conn: &mut SqliteConnection, id: MessageId) -> Result<Message, AppError> {
        Self::get_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {}", id)))
    }

    /// A user's own messages, newest first.
    pub async fn by_user(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT m.id, m.user_id, u.username, u.image_url, m.text, m.created_at
FROM messages m
JOIN users u ON m.user_id = u.id
WHERE m.user_id = ?
ORDER BY m.created_at DESC, m.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(messages)
    }

    /// Messages by `user_id` and everyone they follow, newest first.
    #[instrument(skip(conn))]
    pub async fn feed(
        conn: &mut SqliteConnection,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT m.id, m.user_id, u.username, u.image_url, m.text, m.created_at
FROM messages m
JOIN users u ON m.user_id = u.id
WHERE m.user_id = ?
   OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)
ORDER BY m.created_at DESC, m.id DESC
LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(messages)
    }

    /// Delete one message after removing its likes.
    #[instrument(skip(conn))]
    pub async fn delete(conn: &mut SqliteConnection, id: MessageId) -> Result<(), AppError> {
        LikeRepository::delete_by_message(conn, id).await?;

        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Bulk delete for account removal. Likes on these messages must already be gone.
    pub async fn delete_by_user(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_by_user(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}
