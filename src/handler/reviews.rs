use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;

use crate::{
    AppState,
    dtos::{CreateReviewDto, ListQueryDto, ListResponseDto, ReviewDto, UpdateReviewDto},
    error::HttpError,
    extract::Payload,
    middleware::Actor,
    services::reviews,
};

/// Router for reviews nested under a title
pub fn review_handler() -> Router<AppState> {
    Router::new()
        // GET|POST /titles/{title_id}/reviews
        .route(
            "/titles/{title_id}/reviews",
            get(get_reviews).post(create_review),
        )
        // GET|PATCH|DELETE /titles/{title_id}/reviews/{review_id}
        // PATCH/DELETE: author, moderator or admin
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(get_review).patch(edit_review).delete(delete_review),
        )
}

/// Paginated reviews of a title, newest first
#[instrument(skip(app_state))]
pub async fn get_reviews(
    Query(query): Query<ListQueryDto>,
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let (reviews, count) =
        reviews::list_reviews(app_state.db_client.as_ref(), title_id, &query).await?;

    Ok(Json(ListResponseDto {
        count,
        results: reviews.iter().map(ReviewDto::from).collect(),
    }))
}

#[instrument(skip(app_state))]
pub async fn get_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review = reviews::get_review(app_state.db_client.as_ref(), title_id, review_id).await?;
    Ok(Json(ReviewDto::from(&review)))
}

/// Review a title
///
/// Request body: { text, score }
/// One review per user and title; the title's rating is updated.
#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn create_review(
    Path(title_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<CreateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review =
        reviews::create_review(app_state.db_client.as_ref(), actor.user(), title_id, body).await?;

    Ok((StatusCode::CREATED, Json(ReviewDto::from(&review))))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn edit_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<UpdateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review = reviews::update_review(
        app_state.db_client.as_ref(),
        actor.user(),
        title_id,
        review_id,
        body,
    )
    .await?;

    tracing::info!("edit_review successful");
    Ok(Json(ReviewDto::from(&review)))
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn delete_review(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    reviews::delete_review(app_state.db_client.as_ref(), actor.user(), title_id, review_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
