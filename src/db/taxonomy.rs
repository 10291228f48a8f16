use super::{DBClient, DatabaseError, Result, constraint_error, text_contains};
use crate::models::{SlugEntry, Taxonomy};
use async_trait::async_trait;

/// Category and genre operations
///
/// Both tables have the same layout, so every method takes the [`Taxonomy`]
/// it operates on. Table names come from [`Taxonomy::table`] and are never
/// user input.
#[async_trait]
pub trait TaxonomyExt: Send + Sync {
    /// Page of entries ordered by name, filtered by a case-insensitive name fragment
    async fn get_entries(
        &self,
        taxonomy: Taxonomy,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SlugEntry>>;

    async fn get_entry_count(&self, taxonomy: Taxonomy, search: Option<&str>) -> Result<i64>;

    /// Entries whose slug is in `slugs`; missing slugs are simply absent
    async fn get_entries_by_slugs(
        &self,
        taxonomy: Taxonomy,
        slugs: &[String],
    ) -> Result<Vec<SlugEntry>>;

    /// Insert an entry; duplicate slugs are a [`DatabaseError::Conflict`]
    async fn save_entry(&self, taxonomy: Taxonomy, name: &str, slug: &str) -> Result<SlugEntry>;

    /// Delete by slug. Titles lose their category / genre link.
    async fn delete_entry(&self, taxonomy: Taxonomy, slug: &str) -> Result<()>;
}

#[async_trait]
impl TaxonomyExt for DBClient {
    async fn get_entries(
        &self,
        taxonomy: Taxonomy,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SlugEntry>> {
        let query = format!(
            r#"
            SELECT id, name, slug FROM {}
            WHERE {}
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#,
            taxonomy.table(),
            text_contains("name", 1)
        );

        let entries = sqlx::query_as::<_, SlugEntry>(&query)
            .bind(search)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    async fn get_entry_count(&self, taxonomy: Taxonomy, search: Option<&str>) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            taxonomy.table(),
            text_contains("name", 1)
        );

        let count: i64 = sqlx::query_scalar(&query)
            .bind(search)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_entries_by_slugs(
        &self,
        taxonomy: Taxonomy,
        slugs: &[String],
    ) -> Result<Vec<SlugEntry>> {
        let query = format!(
            "SELECT id, name, slug FROM {} WHERE slug = ANY($1)",
            taxonomy.table()
        );

        let entries = sqlx::query_as::<_, SlugEntry>(&query)
            .bind(slugs)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    async fn save_entry(&self, taxonomy: Taxonomy, name: &str, slug: &str) -> Result<SlugEntry> {
        let query = format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            taxonomy.table()
        );

        sqlx::query_as::<_, SlugEntry>(&query)
            .bind(name)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint_error(e, taxonomy.field(), slug))
    }

    async fn delete_entry(&self, taxonomy: Taxonomy, slug: &str) -> Result<()> {
        // ON DELETE SET NULL (titles.category_id) and ON DELETE CASCADE
        // (genre_title.genre_id) handle the references.
        let query = format!("DELETE FROM {} WHERE slug = $1", taxonomy.table());

        let result = sqlx::query(&query)
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: taxonomy.field(),
                identifier: "slug",
            });
        }

        Ok(())
    }
}
