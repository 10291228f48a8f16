//! Categories, genres and titles.
//!
//! Reads are public; every write needs an admin-capable actor. Titles
//! reference their category and genres by slug on input and get them back as
//! `{name, slug}` objects.

use axum::http::Method;
use chrono::{Datelike, Utc};
use validator::Validate;

use crate::{
    db::Store,
    dtos::{CreateTitleDto, ListQueryDto, SlugEntryInputDto, TitleQueryDto, UpdateTitleDto},
    error::{ErrorMessage, FieldErrors, ServiceError},
    extract::Payload,
    models::{NewTitle, SlugEntry, Taxonomy, Title, TitleChanges, TitleFilter, User},
    permissions::{Resource, authorize},
};

// ============================================================================
// Categories & genres
// ============================================================================

pub async fn list_entries(
    store: &dyn Store,
    taxonomy: Taxonomy,
    query: &ListQueryDto,
) -> Result<(Vec<SlugEntry>, i64), ServiceError> {
    query.validate()?;
    let search = query.search.as_deref();

    let entries = store
        .get_entries(taxonomy, search, query.limit(), query.offset())
        .await?;
    let count = store.get_entry_count(taxonomy, search).await?;
    Ok((entries, count))
}

pub async fn create_entry(
    store: &dyn Store,
    actor: Option<&User>,
    taxonomy: Taxonomy,
    body: impl Into<Payload<SlugEntryInputDto>>,
) -> Result<SlugEntry, ServiceError> {
    authorize(&Method::POST, actor, &Resource::Catalog)?;
    let body: Payload<SlugEntryInputDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;

    let name = body.name.unwrap_or_default();
    let slug = body.slug.unwrap_or_default();
    let entry = store.save_entry(taxonomy, &name, &slug).await?;

    tracing::info!(taxonomy = taxonomy.field(), slug = %entry.slug, "entry created");
    Ok(entry)
}

pub async fn delete_entry(
    store: &dyn Store,
    actor: Option<&User>,
    taxonomy: Taxonomy,
    slug: &str,
) -> Result<(), ServiceError> {
    authorize(&Method::DELETE, actor, &Resource::Catalog)?;

    store.delete_entry(taxonomy, slug).await?;
    tracing::info!(taxonomy = taxonomy.field(), slug, "entry deleted");
    Ok(())
}

// ============================================================================
// Titles
// ============================================================================

fn check_year(year: Option<i32>, errors: &mut FieldErrors) {
    let current = Utc::now().year();
    if year.is_some_and(|year| year > current) {
        errors.add(
            "year",
            format!("Ensure this value is less than or equal to {}.", current),
        );
    }
}

/// Resolve slugs to ids, recording one error per unknown slug
async fn resolve_slugs(
    store: &dyn Store,
    taxonomy: Taxonomy,
    slugs: &[String],
    errors: &mut FieldErrors,
) -> Result<Vec<i64>, ServiceError> {
    let found = store.get_entries_by_slugs(taxonomy, slugs).await?;

    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        match found.iter().find(|entry| &entry.slug == slug) {
            Some(entry) if !ids.contains(&entry.id) => ids.push(entry.id),
            Some(_) => {}
            None => errors.add(
                taxonomy.field(),
                ErrorMessage::MissingSlug(slug.clone()).to_string(),
            ),
        }
    }
    Ok(ids)
}

async fn resolve_category(
    store: &dyn Store,
    slug: Option<&String>,
    errors: &mut FieldErrors,
) -> Result<Option<i64>, ServiceError> {
    match slug {
        Some(slug) => {
            let ids =
                resolve_slugs(store, Taxonomy::Category, std::slice::from_ref(slug), errors)
                    .await?;
            Ok(ids.first().copied())
        }
        None => Ok(None),
    }
}

pub async fn list_titles(
    store: &dyn Store,
    query: &TitleQueryDto,
) -> Result<(Vec<Title>, i64), ServiceError> {
    query.validate()?;

    let filter = TitleFilter {
        category: query.category.clone(),
        genre: query.genre.clone(),
        name: query.name.clone(),
        year: query.year,
    };
    let limit = query.limit.unwrap_or(10);
    let offset = query.offset.unwrap_or(0);

    let titles = store.get_titles(&filter, limit, offset).await?;
    let count = store.get_title_count(&filter).await?;
    Ok((titles, count))
}

pub async fn get_title(store: &dyn Store, title_id: i64) -> Result<Title, ServiceError> {
    store
        .get_title(title_id)
        .await?
        .ok_or(ServiceError::NotFound("title"))
}

pub async fn create_title(
    store: &dyn Store,
    actor: Option<&User>,
    body: impl Into<Payload<CreateTitleDto>>,
) -> Result<Title, ServiceError> {
    authorize(&Method::POST, actor, &Resource::Catalog)?;
    let body: Payload<CreateTitleDto> = body.into();
    let body = body.into_inner()?;

    let mut errors = body.validate().err().map(FieldErrors::from).unwrap_or_default();
    check_year(body.year, &mut errors);
    let genre_ids = match &body.genre {
        Some(slugs) => resolve_slugs(store, Taxonomy::Genre, slugs, &mut errors).await?,
        None => Vec::new(),
    };
    let category_id = resolve_category(store, body.category.as_ref(), &mut errors).await?;
    errors.into_result()?;

    let new_title = NewTitle {
        name: body.name.unwrap_or_default(),
        year: body.year.unwrap_or_default(),
        description: body.description.unwrap_or_default(),
        category_id,
        genre_ids,
    };
    let title = store.save_title(new_title).await?;

    tracing::info!(title_id = title.id, name = %title.name, "title created");
    Ok(title)
}

pub async fn update_title(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    body: impl Into<Payload<UpdateTitleDto>>,
) -> Result<Title, ServiceError> {
    authorize(&Method::PATCH, actor, &Resource::Catalog)?;
    get_title(store, title_id).await?;
    let body: Payload<UpdateTitleDto> = body.into();
    let body = body.into_inner()?;

    let mut errors = body.validate().err().map(FieldErrors::from).unwrap_or_default();
    check_year(body.year, &mut errors);
    let genre_ids = match &body.genre {
        Some(slugs) => Some(resolve_slugs(store, Taxonomy::Genre, slugs, &mut errors).await?),
        None => None,
    };
    let category_id = resolve_category(store, body.category.as_ref(), &mut errors).await?;
    errors.into_result()?;

    let changes = TitleChanges {
        name: body.name,
        year: body.year,
        description: body.description,
        category_id,
        genre_ids,
    };
    Ok(store.update_title(title_id, changes).await?)
}

/// Delete a title together with its reviews and their comments
pub async fn delete_title(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
) -> Result<(), ServiceError> {
    authorize(&Method::DELETE, actor, &Resource::Catalog)?;

    store.delete_title(title_id).await?;
    tracing::info!(title_id, "title deleted");
    Ok(())
}
