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
    dtos::{CommentDto, CommentInputDto, ListQueryDto, ListResponseDto},
    error::HttpError,
    extract::Payload,
    middleware::Actor,
    services::reviews,
};

/// Router for comments nested under /titles/{title_id}/reviews/{review_id}
pub fn comment_handler() -> Router<AppState> {
    Router::new()
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(get_comments).post(create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(get_comment).patch(edit_comment).delete(delete_comment),
        )
}

#[instrument(skip(app_state))]
pub async fn get_comments(
    Query(query): Query<ListQueryDto>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let (comments, count) =
        reviews::list_comments(app_state.db_client.as_ref(), title_id, review_id, &query).await?;

    Ok(Json(ListResponseDto {
        count,
        results: comments.iter().map(CommentDto::from).collect(),
    }))
}

#[instrument(skip(app_state))]
pub async fn get_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let comment =
        reviews::get_comment(app_state.db_client.as_ref(), title_id, review_id, comment_id)
            .await?;
    Ok(Json(CommentDto::from(&comment)))
}

/// Comment on a review
///
/// Request body: { text }
#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn create_comment(
    Path((title_id, review_id)): Path<(i64, i64)>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<CommentInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = reviews::create_comment(
        app_state.db_client.as_ref(),
        actor.user(),
        title_id,
        review_id,
        body,
    )
    .await?;

    tracing::info!("create_comment successful");
    Ok((StatusCode::CREATED, Json(CommentDto::from(&comment))))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn edit_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<CommentInputDto>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = reviews::update_comment(
        app_state.db_client.as_ref(),
        actor.user(),
        title_id,
        review_id,
        comment_id,
        body,
    )
    .await?;

    Ok(Json(CommentDto::from(&comment)))
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn delete_comment(
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    reviews::delete_comment(
        app_state.db_client.as_ref(),
        actor.user(),
        title_id,
        review_id,
        comment_id,
    )
    .await?;

    tracing::info!("delete_comment successful");
    Ok(StatusCode::NO_CONTENT)
}
