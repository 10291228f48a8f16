use super::{DBClient, DatabaseError, Result, constraint_error};
use crate::models::{NewReview, Review, ReviewChanges};
use crate::services::rating::recompute_rating;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

/// Review database operations trait
///
/// Every mutation recomputes the owning title's rating in the same
/// transaction, after the write, with the title row locked. Concurrent review
/// writes for one title therefore serialize and each recompute reads the
/// post-write review set.
#[async_trait]
pub trait ReviewExt: Send + Sync {
    /// Review `review_id` if it belongs to `title_id`
    async fn get_review(&self, title_id: i64, review_id: i64) -> Result<Option<Review>>;

    /// Page of a title's reviews, newest first
    async fn get_reviews(&self, title_id: i64, limit: i64, offset: i64) -> Result<Vec<Review>>;

    async fn get_review_count(&self, title_id: i64) -> Result<i64>;

    /// Insert a review and re-rate its title. A second review by the same
    /// author on the same title is a [`DatabaseError::Conflict`].
    async fn save_review(&self, new_review: NewReview) -> Result<Review>;

    async fn update_review(&self, review_id: i64, changes: ReviewChanges) -> Result<Review>;

    /// Delete a review (comments cascade) and re-rate its title
    async fn delete_review(&self, review_id: i64) -> Result<()>;

    /// Recompute and persist a title's rating from its current reviews
    async fn refresh_rating(&self, title_id: i64) -> Result<Option<i32>>;
}

const REVIEW_COLUMNS: &str =
    "r.id, r.title_id, r.author_id, u.username AS author_username, r.text, r.score, r.pub_date";

/// Take the row lock that serializes rating updates for one title
async fn lock_title(tx: &mut Transaction<'_, Postgres>, title_id: i64) -> Result<()> {
    let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE id = $1 FOR UPDATE")
        .bind(title_id)
        .fetch_optional(&mut **tx)
        .await?;

    locked.map(|_| ()).ok_or(DatabaseError::NotFound {
        resource: "title",
        identifier: "id",
    })
}

/// Title owning `review_id`
async fn review_title(tx: &mut Transaction<'_, Postgres>, review_id: i64) -> Result<i64> {
    let title_id: Option<i64> = sqlx::query_scalar("SELECT title_id FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(&mut **tx)
        .await?;

    title_id.ok_or(DatabaseError::NotFound {
        resource: "review",
        identifier: "id",
    })
}

async fn rate_title(tx: &mut Transaction<'_, Postgres>, title_id: i64) -> Result<Option<i32>> {
    let scores: Vec<i32> = sqlx::query_scalar("SELECT score FROM reviews WHERE title_id = $1")
        .bind(title_id)
        .fetch_all(&mut **tx)
        .await?;

    let rating = recompute_rating(&scores);

    sqlx::query("UPDATE titles SET rating = $1 WHERE id = $2")
        .bind(rating)
        .bind(title_id)
        .execute(&mut **tx)
        .await?;

    tracing::debug!(title_id, ?rating, reviews = scores.len(), "title re-rated");
    Ok(rating)
}

#[async_trait]
impl ReviewExt for DBClient {
    async fn get_review(&self, title_id: i64, review_id: i64) -> Result<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews r
            INNER JOIN users u ON r.author_id = u.id
            WHERE r.id = $1 AND r.title_id = $2
            "#
        ))
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn get_reviews(&self, title_id: i64, limit: i64, offset: i64) -> Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews r
            INNER JOIN users u ON r.author_id = u.id
            WHERE r.title_id = $1
            ORDER BY r.pub_date DESC, r.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(title_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn get_review_count(&self, title_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM reviews WHERE title_id = $1")
            .bind(title_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn save_review(&self, new_review: NewReview) -> Result<Review> {
        let mut tx = self.pool.begin().await?;

        lock_title(&mut tx, new_review.title_id).await?;

        // CTE inserts and returns the review with its author's username
        let review = sqlx::query_as::<_, Review>(
            r#"
            WITH new_review AS (
                INSERT INTO reviews (title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT nr.id, nr.title_id, nr.author_id, u.username AS author_username,
                   nr.text, nr.score, nr.pub_date
            FROM new_review nr
            JOIN users u ON nr.author_id = u.id
            "#,
        )
        .bind(new_review.title_id)
        .bind(new_review.author_id)
        .bind(&new_review.text)
        .bind(new_review.score)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "review", &new_review.author_id.to_string()))?;

        rate_title(&mut tx, new_review.title_id).await?;

        tx.commit().await?;
        Ok(review)
    }

    async fn update_review(&self, review_id: i64, changes: ReviewChanges) -> Result<Review> {
        let mut tx = self.pool.begin().await?;

        let title_id = review_title(&mut tx, review_id).await?;
        lock_title(&mut tx, title_id).await?;

        let review = sqlx::query_as::<_, Review>(
            r#"
            WITH updated_review AS (
                UPDATE reviews
                SET text = COALESCE($1, text),
                    score = COALESCE($2, score)
                WHERE id = $3
                RETURNING *
            )
            SELECT ur.id, ur.title_id, ur.author_id, u.username AS author_username,
                   ur.text, ur.score, ur.pub_date
            FROM updated_review ur
            JOIN users u ON ur.author_id = u.id
            "#,
        )
        .bind(changes.text.as_deref())
        .bind(changes.score)
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DatabaseError::NotFound {
            resource: "review",
            identifier: "id",
        })?;

        rate_title(&mut tx, title_id).await?;

        tx.commit().await?;
        Ok(review)
    }

    async fn delete_review(&self, review_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let title_id = review_title(&mut tx, review_id).await?;
        lock_title(&mut tx, title_id).await?;

        // comments.review_id is ON DELETE CASCADE
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;

        rate_title(&mut tx, title_id).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn refresh_rating(&self, title_id: i64) -> Result<Option<i32>> {
        let mut tx = self.pool.begin().await?;

        lock_title(&mut tx, title_id).await?;
        let rating = rate_title(&mut tx, title_id).await?;

        tx.commit().await?;
        Ok(rating)
    }
}
