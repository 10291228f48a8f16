//! Reviews and their comments.
//!
//! Every operation first resolves the parent chain (title, then review) so a
//! review addressed under the wrong title is a 404, never a cross-title edit.
//! Rating maintenance happens inside the store's review mutations.

use axum::http::Method;
use validator::Validate;

use crate::{
    db::Store,
    dtos::{CommentInputDto, CreateReviewDto, ListQueryDto, UpdateReviewDto},
    error::{ErrorMessage, FieldErrors, NON_FIELD_ERRORS, ServiceError},
    extract::Payload,
    models::{Comment, NewReview, Review, ReviewChanges, User},
    permissions::{Resource, authorize},
};

async fn ensure_title(store: &dyn Store, title_id: i64) -> Result<(), ServiceError> {
    store
        .get_title(title_id)
        .await?
        .map(|_| ())
        .ok_or(ServiceError::NotFound("title"))
}

async fn find_review(
    store: &dyn Store,
    title_id: i64,
    review_id: i64,
) -> Result<Review, ServiceError> {
    ensure_title(store, title_id).await?;
    store
        .get_review(title_id, review_id)
        .await?
        .ok_or(ServiceError::NotFound("review"))
}

async fn find_comment(
    store: &dyn Store,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, ServiceError> {
    find_review(store, title_id, review_id).await?;
    store
        .get_comment(review_id, comment_id)
        .await?
        .ok_or(ServiceError::NotFound("comment"))
}

fn duplicate_review(error: ServiceError) -> ServiceError {
    match error {
        ServiceError::Conflict { .. } => ServiceError::Validation(FieldErrors::single(
            NON_FIELD_ERRORS,
            ErrorMessage::DuplicateReview.to_string(),
        )),
        e => e,
    }
}

// ============================================================================
// Reviews
// ============================================================================

pub async fn list_reviews(
    store: &dyn Store,
    title_id: i64,
    query: &ListQueryDto,
) -> Result<(Vec<Review>, i64), ServiceError> {
    query.validate()?;
    ensure_title(store, title_id).await?;

    let reviews = store
        .get_reviews(title_id, query.limit(), query.offset())
        .await?;
    let count = store.get_review_count(title_id).await?;
    Ok((reviews, count))
}

pub async fn get_review(
    store: &dyn Store,
    title_id: i64,
    review_id: i64,
) -> Result<Review, ServiceError> {
    find_review(store, title_id, review_id).await
}

/// Create the actor's review of a title. The title's rating is recomputed
/// by the store in the same transaction.
pub async fn create_review(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    body: impl Into<Payload<CreateReviewDto>>,
) -> Result<Review, ServiceError> {
    authorize(&Method::POST, actor, &Resource::Authored { author_id: None })?;
    let author = actor.ok_or(ServiceError::PermissionDenied)?;

    let body: Payload<CreateReviewDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;
    ensure_title(store, title_id).await?;

    let new_review = NewReview {
        title_id,
        author_id: author.id,
        text: body.text.unwrap_or_default(),
        score: body.score.unwrap_or_default(),
    };

    // (title, author) uniqueness is the store's constraint
    let review = store
        .save_review(new_review)
        .await
        .map_err(|e| duplicate_review(e.into()))?;

    tracing::info!(title_id, review_id = review.id, author = %author.username, "review created");
    Ok(review)
}

pub async fn update_review(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    review_id: i64,
    body: impl Into<Payload<UpdateReviewDto>>,
) -> Result<Review, ServiceError> {
    let review = find_review(store, title_id, review_id).await?;
    authorize(
        &Method::PATCH,
        actor,
        &Resource::Authored {
            author_id: Some(review.author_id),
        },
    )?;
    let body: Payload<UpdateReviewDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;

    let changes = ReviewChanges {
        text: body.text,
        score: body.score,
    };
    Ok(store.update_review(review.id, changes).await?)
}

/// Delete a review with its comments and re-rate the title
pub async fn delete_review(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    review_id: i64,
) -> Result<(), ServiceError> {
    let review = find_review(store, title_id, review_id).await?;
    authorize(
        &Method::DELETE,
        actor,
        &Resource::Authored {
            author_id: Some(review.author_id),
        },
    )?;

    store.delete_review(review.id).await?;
    tracing::info!(title_id, review_id, "review deleted");
    Ok(())
}

// ============================================================================
// Comments
// ============================================================================

pub async fn list_comments(
    store: &dyn Store,
    title_id: i64,
    review_id: i64,
    query: &ListQueryDto,
) -> Result<(Vec<Comment>, i64), ServiceError> {
    query.validate()?;
    find_review(store, title_id, review_id).await?;

    let comments = store
        .get_comments(review_id, query.limit(), query.offset())
        .await?;
    let count = store.get_comment_count(review_id).await?;
    Ok((comments, count))
}

pub async fn get_comment(
    store: &dyn Store,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, ServiceError> {
    find_comment(store, title_id, review_id, comment_id).await
}

pub async fn create_comment(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    review_id: i64,
    body: impl Into<Payload<CommentInputDto>>,
) -> Result<Comment, ServiceError> {
    authorize(&Method::POST, actor, &Resource::Authored { author_id: None })?;
    let author = actor.ok_or(ServiceError::PermissionDenied)?;

    let body: Payload<CommentInputDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;
    find_review(store, title_id, review_id).await?;

    let text = body.text.unwrap_or_default();
    Ok(store.save_comment(review_id, author.id, &text).await?)
}

pub async fn update_comment(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
    body: impl Into<Payload<CommentInputDto>>,
) -> Result<Comment, ServiceError> {
    let comment = find_comment(store, title_id, review_id, comment_id).await?;
    authorize(
        &Method::PATCH,
        actor,
        &Resource::Authored {
            author_id: Some(comment.author_id),
        },
    )?;
    let body: Payload<CommentInputDto> = body.into();
    let body = body.into_inner()?;
    body.validate()?;

    let text = body.text.unwrap_or_default();
    Ok(store.update_comment(comment.id, &text).await?)
}

pub async fn delete_comment(
    store: &dyn Store,
    actor: Option<&User>,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<(), ServiceError> {
    let comment = find_comment(store, title_id, review_id, comment_id).await?;
    authorize(
        &Method::DELETE,
        actor,
        &Resource::Authored {
            author_id: Some(comment.author_id),
        },
    )?;

    Ok(store.delete_comment(comment.id).await?)
}
