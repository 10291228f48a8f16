use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use tracing::instrument;

use crate::{
    AppState,
    dtos::{
        CreateTitleDto, ListQueryDto, ListResponseDto, SlugEntryDto, SlugEntryInputDto, TitleDto,
        TitleQueryDto, UpdateTitleDto,
    },
    error::HttpError,
    extract::Payload,
    middleware::Actor,
    models::Taxonomy,
    services::catalog,
};

/// Router for categories, genres and titles
///
/// Reads are public, writes need an admin-capable actor (checked in the
/// catalog service).
pub fn catalog_handler() -> Router<AppState> {
    Router::new()
        // GET|POST /categories, DELETE /categories/{slug}
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{slug}", delete(delete_category))
        // GET|POST /genres, DELETE /genres/{slug}
        .route("/genres", get(list_genres).post(create_genre))
        .route("/genres/{slug}", delete(delete_genre))
        // GET|POST /titles, GET|PATCH|DELETE /titles/{title_id}
        .route("/titles", get(list_titles).post(create_title))
        .route(
            "/titles/{title_id}",
            get(get_title).patch(update_title).delete(delete_title),
        )
}

// ============================================================================
// Categories & genres
// ============================================================================

async fn list_entries(
    app_state: &AppState,
    taxonomy: Taxonomy,
    query: &ListQueryDto,
) -> Result<Json<ListResponseDto<SlugEntryDto>>, HttpError> {
    let (entries, count) =
        catalog::list_entries(app_state.db_client.as_ref(), taxonomy, query).await?;

    Ok(Json(ListResponseDto {
        count,
        results: entries.iter().map(SlugEntryDto::from).collect(),
    }))
}

async fn create_entry(
    app_state: &AppState,
    actor: &Actor,
    taxonomy: Taxonomy,
    body: Payload<SlugEntryInputDto>,
) -> Result<(StatusCode, Json<SlugEntryDto>), HttpError> {
    let entry =
        catalog::create_entry(app_state.db_client.as_ref(), actor.user(), taxonomy, body).await?;

    Ok((StatusCode::CREATED, Json(SlugEntryDto::from(&entry))))
}

async fn delete_entry(
    app_state: &AppState,
    actor: &Actor,
    taxonomy: Taxonomy,
    slug: &str,
) -> Result<StatusCode, HttpError> {
    catalog::delete_entry(app_state.db_client.as_ref(), actor.user(), taxonomy, slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(app_state))]
pub async fn list_categories(
    Query(query): Query<ListQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    list_entries(&app_state, Taxonomy::Category, &query).await
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn create_category(
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<SlugEntryInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    create_entry(&app_state, &actor, Taxonomy::Category, body).await
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn delete_category(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    delete_entry(&app_state, &actor, Taxonomy::Category, &slug).await
}

#[instrument(skip(app_state))]
pub async fn list_genres(
    Query(query): Query<ListQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    list_entries(&app_state, Taxonomy::Genre, &query).await
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn create_genre(
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<SlugEntryInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    create_entry(&app_state, &actor, Taxonomy::Genre, body).await
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn delete_genre(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    delete_entry(&app_state, &actor, Taxonomy::Genre, &slug).await
}

// ============================================================================
// Titles
// ============================================================================

/// List titles, filtered by `category`, `genre` (slugs), `name` (substring)
/// and `year`
#[instrument(skip(app_state))]
pub async fn list_titles(
    Query(query): Query<TitleQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let (titles, count) = catalog::list_titles(app_state.db_client.as_ref(), &query).await?;

    Ok(Json(ListResponseDto {
        count,
        results: titles.iter().map(TitleDto::from).collect(),
    }))
}

#[instrument(skip(app_state))]
pub async fn get_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let title = catalog::get_title(app_state.db_client.as_ref(), title_id).await?;
    Ok(Json(TitleDto::from(&title)))
}

/// Create a title
///
/// Request body: { name, year, description?, genre: [slug], category: slug }
#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn create_title(
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<CreateTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let title = catalog::create_title(app_state.db_client.as_ref(), actor.user(), body).await?;

    tracing::info!(title_id = title.id, "create_title successful");
    Ok((StatusCode::CREATED, Json(TitleDto::from(&title))))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn update_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<UpdateTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let title =
        catalog::update_title(app_state.db_client.as_ref(), actor.user(), title_id, body).await?;
    Ok(Json(TitleDto::from(&title)))
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn delete_title(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    catalog::delete_title(app_state.db_client.as_ref(), actor.user(), title_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
