use super::{DBClient, DatabaseError, Result, constraint_error};
use crate::models::Comment;
use async_trait::async_trait;
use uuid::Uuid;

/// Comment database operations trait
#[async_trait]
pub trait CommentExt: Send + Sync {
    /// Comment `comment_id` if it belongs to `review_id`
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> Result<Option<Comment>>;

    /// Page of a review's comments, newest first
    async fn get_comments(&self, review_id: i64, limit: i64, offset: i64)
    -> Result<Vec<Comment>>;

    async fn get_comment_count(&self, review_id: i64) -> Result<i64>;

    async fn save_comment(&self, review_id: i64, author_id: Uuid, text: &str) -> Result<Comment>;

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment>;

    async fn delete_comment(&self, comment_id: i64) -> Result<()>;
}

#[async_trait]
impl CommentExt for DBClient {
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author_username, c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.id = $1 AND c.review_id = $2
            "#,
        )
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn get_comments(
        &self,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, u.username AS author_username, c.text, c.pub_date
            FROM comments c
            INNER JOIN users u ON c.author_id = u.id
            WHERE c.review_id = $1
            ORDER BY c.pub_date DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(review_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn get_comment_count(&self, review_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM comments WHERE review_id = $1")
            .bind(review_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn save_comment(&self, review_id: i64, author_id: Uuid, text: &str) -> Result<Comment> {
        // Use CTE to insert and return comment with username
        sqlx::query_as::<_, Comment>(
            r#"
            WITH new_comment AS (
                INSERT INTO comments (review_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT nc.id, nc.review_id, nc.author_id, u.username AS author_username,
                   nc.text, nc.pub_date
            FROM new_comment nc
            JOIN users u ON nc.author_id = u.id
            "#,
        )
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "review", &review_id.to_string()))
    }

    async fn update_comment(&self, comment_id: i64, text: &str) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated_comment AS (
                UPDATE comments
                SET text = $1
                WHERE id = $2
                RETURNING *
            )
            SELECT uc.id, uc.review_id, uc.author_id, u.username AS author_username,
                   uc.text, uc.pub_date
            FROM updated_comment uc
            JOIN users u ON uc.author_id = u.id
            "#,
        )
        .bind(text)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        comment.ok_or(DatabaseError::NotFound {
            resource: "comment",
            identifier: "id",
        })
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        // Return NotFound if comment doesn't exist
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "comment",
                identifier: "id",
            });
        }

        Ok(())
    }
}
