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
    dtos::{CreateUserDto, ListQueryDto, ListResponseDto, UpdateUserDto, UserDto},
    error::HttpError,
    extract::Payload,
    middleware::Actor,
    services::users,
};

/// Router for user management
///
/// `/users` and `/users/{username}` are admin only; `/users/me` is open to
/// any authenticated user. The static `/users/me` route wins over the
/// `{username}` capture.
pub fn users_handler() -> Router<AppState> {
    Router::new()
        .route("/users", get(get_users).post(create_user))
        .route("/users/me", get(get_me).patch(update_me))
        .route("/users/{username}", get(get_user).patch(update_user))
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn get_users(
    Query(query): Query<ListQueryDto>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    let (users, count) =
        users::list_users(app_state.db_client.as_ref(), actor.user(), &query).await?;

    Ok(Json(ListResponseDto {
        count,
        results: UserDto::filter_users(&users),
    }))
}

/// Create a user without the signup flow
///
/// Request body: { username, email, first_name?, last_name?, bio?, role? }
#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn create_user(
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = users::create_user(app_state.db_client.as_ref(), actor.user(), body).await?;

    tracing::info!("create_user successful");
    Ok((StatusCode::CREATED, Json(UserDto::filter_user(&user))))
}

#[instrument(skip(app_state, actor), fields(actor = %actor))]
pub async fn get_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, HttpError> {
    let user = users::get_user(app_state.db_client.as_ref(), actor.user(), &username).await?;
    Ok(Json(UserDto::filter_user(&user)))
}

#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn update_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user =
        users::update_user(app_state.db_client.as_ref(), actor.user(), &username, body).await?;
    Ok(Json(UserDto::filter_user(&user)))
}

/// Current user's profile
#[instrument(skip(actor), fields(actor = %actor))]
pub async fn get_me(Extension(actor): Extension<Actor>) -> Result<impl IntoResponse, HttpError> {
    let me = users::get_me(actor.user())?;
    Ok(Json(UserDto::filter_user(&me)))
}

/// Update the current user's profile; `role` is ignored
#[instrument(skip(app_state, actor, body), fields(actor = %actor))]
pub async fn update_me(
    State(app_state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Payload<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let me = users::update_me(app_state.db_client.as_ref(), actor.user(), body).await?;

    tracing::info!("update_me successful");
    Ok(Json(UserDto::filter_user(&me)))
}
