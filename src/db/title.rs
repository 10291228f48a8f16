use std::collections::HashMap;

use super::{DBClient, DatabaseError, Result, constraint_error, text_contains};
use crate::models::{NewTitle, SlugEntry, Title, TitleChanges, TitleFilter};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

/// Title database operations trait
///
/// None of these methods write `rating`; see [`super::ReviewExt`].
#[async_trait]
pub trait TitleExt: Send + Sync {
    async fn get_title(&self, title_id: i64) -> Result<Option<Title>>;

    /// Page of titles ordered by id
    async fn get_titles(&self, filter: &TitleFilter, limit: i64, offset: i64)
    -> Result<Vec<Title>>;

    async fn get_title_count(&self, filter: &TitleFilter) -> Result<i64>;

    /// Insert a title with its genre links
    async fn save_title(&self, new_title: NewTitle) -> Result<Title>;

    /// Partial update; `genre_ids` replaces the whole genre set when present
    async fn update_title(&self, title_id: i64, changes: TitleChanges) -> Result<Title>;

    /// Delete a title together with its reviews and their comments
    async fn delete_title(&self, title_id: i64) -> Result<()>;
}

#[derive(sqlx::FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i32,
    description: String,
    rating: Option<i32>,
    category_id: Option<i64>,
    category_name: Option<String>,
    category_slug: Option<String>,
}

#[derive(sqlx::FromRow)]
struct GenreLink {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

const TITLE_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description, t.rating,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

/// WHERE clause over category slug ($1), genre slug ($2), name fragment ($3)
/// and year ($4)
fn title_filter() -> String {
    format!(
        r#"
    WHERE ($1::TEXT IS NULL OR c.slug = $1)
      AND ($2::TEXT IS NULL OR EXISTS (
            SELECT 1 FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = t.id AND g.slug = $2))
      AND {}
      AND ($4::INT IS NULL OR t.year = $4)
"#,
        text_contains("t.name", 3)
    )
}

impl DBClient {
    /// Attach categories and genres to raw title rows
    async fn hydrate_titles(&self, rows: Vec<TitleRow>) -> Result<Vec<Title>> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

        let links = sqlx::query_as::<_, GenreLink>(
            r#"
            SELECT gt.title_id, g.id, g.name, g.slug
            FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i64, Vec<SlugEntry>> = HashMap::new();
        for link in links {
            genres.entry(link.title_id).or_default().push(SlugEntry {
                id: link.id,
                name: link.name,
                slug: link.slug,
            });
        }

        let titles = rows
            .into_iter()
            .map(|row| {
                let category = match (row.category_id, row.category_name, row.category_slug) {
                    (Some(id), Some(name), Some(slug)) => Some(SlugEntry { id, name, slug }),
                    _ => None,
                };
                Title {
                    genres: genres.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    name: row.name,
                    year: row.year,
                    description: row.description,
                    rating: row.rating,
                    category,
                }
            })
            .collect();

        Ok(titles)
    }

    async fn load_title(&self, title_id: i64) -> Result<Title> {
        self.get_title(title_id)
            .await?
            .ok_or(DatabaseError::NotFound {
                resource: "title",
                identifier: "id",
            })
    }
}

async fn link_genres(
    tx: &mut Transaction<'_, Postgres>,
    title_id: i64,
    genre_ids: &[i64],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO genre_title (title_id, genre_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(title_id)
    .bind(genre_ids)
    .execute(&mut **tx)
    .await
    .map_err(|e| constraint_error(e, "genre", &title_id.to_string()))?;

    Ok(())
}

#[async_trait]
impl TitleExt for DBClient {
    async fn get_title(&self, title_id: i64) -> Result<Option<Title>> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} WHERE t.id = $1"))
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate_titles(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_titles(
        &self,
        filter: &TitleFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Title>> {
        let rows = sqlx::query_as::<_, TitleRow>(&format!(
            "{TITLE_SELECT} {} ORDER BY t.id LIMIT $5 OFFSET $6",
            title_filter()
        ))
        .bind(filter.category.as_deref())
        .bind(filter.genre.as_deref())
        .bind(filter.name.as_deref())
        .bind(filter.year)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_titles(rows).await
    }

    async fn get_title_count(&self, filter: &TitleFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM titles t LEFT JOIN categories c ON c.id = t.category_id {}",
            title_filter()
        ))
        .bind(filter.category.as_deref())
        .bind(filter.genre.as_deref())
        .bind(filter.name.as_deref())
        .bind(filter.year)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_title(&self, new_title: NewTitle) -> Result<Title> {
        let mut tx = self.pool.begin().await?;

        let title_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO titles (name, year, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&new_title.name)
        .bind(new_title.year)
        .bind(&new_title.description)
        .bind(new_title.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "category", &new_title.name))?;

        link_genres(&mut tx, title_id, &new_title.genre_ids).await?;

        tx.commit().await?;

        self.load_title(title_id).await
    }

    async fn update_title(&self, title_id: i64, changes: TitleChanges) -> Result<Title> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE titles
            SET name = COALESCE($1, name),
                year = COALESCE($2, year),
                description = COALESCE($3, description),
                category_id = COALESCE($4, category_id)
            WHERE id = $5
            "#,
        )
        .bind(changes.name.as_deref())
        .bind(changes.year)
        .bind(changes.description.as_deref())
        .bind(changes.category_id)
        .bind(title_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "category", &title_id.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "title",
                identifier: "id",
            });
        }

        if let Some(genre_ids) = &changes.genre_ids {
            sqlx::query("DELETE FROM genre_title WHERE title_id = $1")
                .bind(title_id)
                .execute(&mut *tx)
                .await?;
            link_genres(&mut tx, title_id, genre_ids).await?;
        }

        tx.commit().await?;

        self.load_title(title_id).await
    }

    async fn delete_title(&self, title_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(title_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "title",
                identifier: "id",
            });
        }

        Ok(())
    }
}
