use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use crate::db::models::{Message, MessageId, UserId};
use crate::error::{map_unique_violation, AppError};

/// Page size for a user's liked messages.
pub const LIKES_PAGE_SIZE: i64 = 50;

pub struct LikeRepository;

impl LikeRepository {
    pub async fn exists(
        conn: &mut SqliteConnection,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ? AND message_id = ?)",
        )
        .bind(user_id)
        .bind(message_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists)
    }

    /// Insert a like. A duplicate `(user, message)` pair is `AppError::Conflict`.
    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO likes (user_id, message_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(message_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_unique_violation(e, "Already liked"))?;

        Ok(())
    }

    pub async fn delete(
        conn: &mut SqliteConnection,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND message_id = ?")
            .bind(user_id)
            .bind(message_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove the like if it exists, otherwise create it. Returns `true` when
    /// the message is liked afterwards.
    ///
    /// Read-then-act with no locking; a concurrent duplicate insert is
    /// rejected by the composite key.
    #[instrument(skip(conn))]
    pub async fn toggle(
        conn: &mut SqliteConnection,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<bool, AppError> {
        if Self::exists(conn, user_id, message_id).await? {
            Self::delete(conn, user_id, message_id).await?;
            Ok(false)
        } else {
            Self::create(conn, user_id, message_id).await?;
            Ok(true)
        }
    }

    /// Which of `message_ids` has `user_id` liked.
    pub async fn liked_among(
        conn: &mut SqliteConnection,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> Result<Vec<MessageId>, AppError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT message_id FROM likes WHERE user_id = ");
        builder.push_bind(user_id);
        builder.push(" AND message_id IN (");
        let mut ids = builder.separated(", ");
        for id in message_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        let liked = builder
            .build_query_scalar::<MessageId>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(liked)
    }

    /// One page of the messages `user_id` has liked, newest first.
    pub async fn liked_messages(
        conn: &mut SqliteConnection,
        user_id: UserId,
        page: i64,
    ) -> Result<Vec<Message>, AppError> {
        let Some(offset) = page.max(0).checked_mul(LIKES_PAGE_SIZE) else {
            return Ok(Vec::new());
        };

        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT m.id, m.user_id, u.username, u.image_url, m.text, m.created_at
FROM likes l
JOIN messages m ON m.id = l.message_id
JOIN users u ON u.id = m.user_id
WHERE l.user_id = ?
ORDER BY m.created_at DESC, m.id DESC
LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(LIKES_PAGE_SIZE)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok(messages)
    }

    pub async fn count_by_user(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }

    /// Likes given by `user_id`.
    pub async fn delete_by_user(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Likes received on any message authored by `user_id`.
    pub async fn delete_on_messages_of(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM likes WHERE message_id IN (SELECT id FROM messages WHERE user_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_by_message(
        conn: &mut SqliteConnection,
        message_id: MessageId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE message_id = ?")
            .bind(message_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
