use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::models::{User, UserId};
use crate::error::{map_unique_violation, AppError};

pub struct FollowRepository;

impl FollowRepository {
    /// Insert the edge `actor -> target`.
    ///
    /// Not idempotent: a second insert of the same pair is `AppError::Conflict`.
    #[instrument(skip(conn))]
    pub async fn follow(
        conn: &mut SqliteConnection,
        actor: UserId,
        target: UserId,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO follows (follower_id, followed_id) VALUES (?, ?)")
            .bind(actor)
            .bind(target)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_unique_violation(e, "Already following"))?;

        Ok(())
    }

    /// Remove the edge if present. Returns whether anything was deleted.
    #[instrument(skip(conn))]
    pub async fn unfollow(
        conn: &mut SqliteConnection,
        actor: UserId,
        target: UserId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(actor)
            .bind(target)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Does `follower` follow `followed`?
    pub async fn is_following(
        conn: &mut SqliteConnection,
        follower: UserId,
        followed: UserId,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followed_id = ?)",
        )
        .bind(follower)
        .bind(followed)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists)
    }

    /// Is `user` followed by `other`?
    pub async fn is_followed_by(
        conn: &mut SqliteConnection,
        user: UserId,
        other: UserId,
    ) -> Result<bool, AppError> {
        Self::is_following(conn, other, user).await
    }

    /// Users that `user_id` follows.
    pub async fn following(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
SELECT u.* FROM users u
JOIN follows f ON f.followed_id = u.id
WHERE f.follower_id = ?
ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(users)
    }

    /// Users that follow `user_id`.
    pub async fn followers(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
SELECT u.* FROM users u
JOIN follows f ON f.follower_id = u.id
WHERE f.followed_id = ?
ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(users)
    }

    pub async fn following_ids(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<UserId>, AppError> {
        let ids = sqlx::query_scalar::<_, UserId>(
            "SELECT followed_id FROM follows WHERE follower_id = ?",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ids)
    }

    /// (following, followers) counts.
    pub async fn counts(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<(i64, i64), AppError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
SELECT
    (SELECT COUNT(*) FROM follows WHERE follower_id = ?),
    (SELECT COUNT(*) FROM follows WHERE followed_id = ?)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(counts)
    }

    /// Drop every edge touching `user_id`, in either direction.
    pub async fn delete_all_for(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? OR followed_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
