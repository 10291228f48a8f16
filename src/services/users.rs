//! Admin user directory and the self profile.

use axum::http::Method;
use validator::Validate;

use crate::{
    db::Store,
    dtos::{CreateUserDto, ListQueryDto, UpdateUserDto},
    error::{FieldErrors, ServiceError},
    extract::Payload,
    models::{NewUser, User, UserChanges},
    permissions::{Resource, authorize},
    services::signup::{check_identity_available, identity_conflict},
};

async fn find_user(store: &dyn Store, username: &str) -> Result<User, ServiceError> {
    store
        .get_user(None, Some(username), None)
        .await?
        .ok_or(ServiceError::NotFound("user"))
}

/// Validate an update and check its username/email against other users
async fn checked_changes(
    store: &dyn Store,
    user: &User,
    body: UpdateUserDto,
    keep_role: bool,
) -> Result<UserChanges, ServiceError> {
    let mut errors = body.validate().err().map(FieldErrors::from).unwrap_or_default();
    if errors.is_empty() {
        errors.extend(
            check_identity_available(
                store,
                Some(user.id),
                body.username.as_deref(),
                body.email.as_deref(),
            )
            .await?,
        );
    }
    errors.into_result()?;

    Ok(UserChanges {
        username: body.username,
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        bio: body.bio,
        role: if keep_role { None } else { body.role },
    })
}

pub async fn list_users(
    store: &dyn Store,
    actor: Option<&User>,
    query: &ListQueryDto,
) -> Result<(Vec<User>, i64), ServiceError> {
    authorize(&Method::GET, actor, &Resource::UserDirectory)?;
    query.validate()?;
    let search = query.search.as_deref();

    let users = store
        .get_users(search, query.limit(), query.offset())
        .await?;
    let count = store.get_user_count(search).await?;
    Ok((users, count))
}

/// Create a user directly, without the signup mail
pub async fn create_user(
    store: &dyn Store,
    actor: Option<&User>,
    body: impl Into<Payload<CreateUserDto>>,
) -> Result<User, ServiceError> {
    authorize(&Method::POST, actor, &Resource::UserDirectory)?;
    let body: Payload<CreateUserDto> = body.into();
    let body = body.into_inner()?;

    let mut errors = body.validate().err().map(FieldErrors::from).unwrap_or_default();
    if errors.is_empty() {
        errors.extend(
            check_identity_available(
                store,
                None,
                body.username.as_deref(),
                body.email.as_deref(),
            )
            .await?,
        );
    }
    errors.into_result()?;

    let new_user = NewUser {
        username: body.username.unwrap_or_default(),
        email: body.email.unwrap_or_default(),
        first_name: body.first_name.unwrap_or_default(),
        last_name: body.last_name.unwrap_or_default(),
        bio: body.bio.unwrap_or_default(),
        role: body.role.unwrap_or_default(),
    };
    let user = store
        .save_user(new_user)
        .await
        .map_err(|e| identity_conflict(e.into()))?;

    tracing::info!(username = %user.username, role = user.role.to_str(), "user created by admin");
    Ok(user)
}

pub async fn get_user(
    store: &dyn Store,
    actor: Option<&User>,
    username: &str,
) -> Result<User, ServiceError> {
    authorize(&Method::GET, actor, &Resource::UserDirectory)?;
    find_user(store, username).await
}

/// Partial update of any user, role included
pub async fn update_user(
    store: &dyn Store,
    actor: Option<&User>,
    username: &str,
    body: impl Into<Payload<UpdateUserDto>>,
) -> Result<User, ServiceError> {
    authorize(&Method::PATCH, actor, &Resource::UserDirectory)?;
    let user = find_user(store, username).await?;
    let body: Payload<UpdateUserDto> = body.into();
    let body = body.into_inner()?;

    let changes = checked_changes(store, &user, body, false).await?;
    let updated = store
        .update_user(user.id, changes)
        .await
        .map_err(|e| identity_conflict(e.into()))?;

    if updated.role != user.role {
        tracing::info!(
            username = %updated.username,
            from = user.role.to_str(),
            to = updated.role.to_str(),
            "role changed"
        );
    }
    Ok(updated)
}

pub fn get_me(actor: Option<&User>) -> Result<User, ServiceError> {
    authorize(&Method::GET, actor, &Resource::OwnProfile)?;
    actor.cloned().ok_or(ServiceError::PermissionDenied)
}

/// Update the actor's own profile. A `role` in the body is dropped.
pub async fn update_me(
    store: &dyn Store,
    actor: Option<&User>,
    body: impl Into<Payload<UpdateUserDto>>,
) -> Result<User, ServiceError> {
    authorize(&Method::PATCH, actor, &Resource::OwnProfile)?;
    let me = actor.ok_or(ServiceError::PermissionDenied)?;
    let body: Payload<UpdateUserDto> = body.into();
    let body = body.into_inner()?;

    let changes = checked_changes(store, me, body, true).await?;
    Ok(store
        .update_user(me.id, changes)
        .await
        .map_err(|e| identity_conflict(e.into()))?)
}
